//! Generation requests and the generator seam.

use std::sync::Arc;

use crate::buffer::StreamBuffer;

/// A same-folder neighbor of the target path, with a short content preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    /// Absolute path of the neighbor file.
    pub path: String,
    /// Leading excerpt of its content.
    pub preview: String,
}

/// A recently read file, with an excerpt taken from its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentFile {
    /// Absolute path of the file.
    pub path: String,
    /// Trailing excerpt of its content.
    pub tail: String,
}

/// Everything needed to synthesize one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Absolute path of the file to generate.
    pub path: String,
    /// Sibling files with previews.
    pub folder_context: Vec<FileContext>,
    /// Recently read files with tail excerpts.
    pub recent_files: Vec<RecentFile>,
    /// Model to ask for.
    pub model: String,
}

/// Source of generated file bytes.
///
/// The filesystem front-end depends only on this trait; the reqwest-backed
/// [`crate::LlmClient`] and the network-free [`crate::MockGenerator`] both
/// implement it.
pub trait Generator: Send + Sync {
    /// Start a streaming generation and return its buffer immediately.
    ///
    /// The exchange runs on a detached worker owning the only writer
    /// handle; the buffer reaches a terminal state when the stream ends.
    fn generate_stream(&self, request: GenerationRequest) -> Arc<StreamBuffer>;
}

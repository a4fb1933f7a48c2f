//! Prompt assembly for file generation.

use std::fmt::Write;

use crate::request::GenerationRequest;

/// Instruction that keeps the model from wrapping the body in commentary.
pub const SYSTEM_PROMPT: &str = "You are a file content generator. Generate ONLY \
the raw file content without any explanation, commentary, or markdown formatting. \
Do not include phrases like 'Here is the content' or 'Based on the context'. \
Start directly with the actual file content.";

/// Longest folder-context preview rendered into the prompt, in characters.
pub const PREVIEW_CHARS: usize = 200;

/// Render the user message: target path, folder context, recent files, and
/// the final instruction to emit only the body.
pub fn user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Generate content for the file: {}\n", request.path);

    if !request.folder_context.is_empty() {
        prompt.push_str("Files in the same folder:\n");
        for context in &request.folder_context {
            let preview: String = context.preview.chars().take(PREVIEW_CHARS).collect();
            let _ = writeln!(prompt, "- {} (preview):\n{}...\n", context.path, preview);
        }
    }

    if !request.recent_files.is_empty() {
        prompt.push_str("\nRecently accessed files:\n");
        for recent in &request.recent_files {
            let _ = writeln!(prompt, "- {} (tail):\n{}", recent.path, recent.tail);
        }
    }

    let _ = write!(
        prompt,
        "\nGenerate only the raw file content for {}. No explanations or markdown.",
        request.path
    );
    prompt
}

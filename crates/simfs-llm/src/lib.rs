#![warn(missing_docs)]

//! SimFS generation subsystem.
//!
//! Turns a structured generation request into file bytes, either as a
//! blocking call or as a [`StreamBuffer`] fed by a detached worker speaking
//! OpenAI-compatible chat completions. The [`Generator`] trait is the seam
//! the filesystem front-end depends on; [`MockGenerator`] implements it
//! without a network for tests.

/// Shared producer/consumer buffer with blocking positional reads.
pub mod buffer;
/// OpenAI-compatible chat-completions client.
pub mod client;
/// Scripted generator for exercising the filesystem without a network.
pub mod mock;
/// System and user message construction.
pub mod prompt;
/// Generation request types and the generator seam.
pub mod request;
/// Incremental server-sent-events decoding.
pub mod sse;

pub use buffer::StreamBuffer;
pub use client::{LlmClient, LlmError, API_KEY_ENV, DEFAULT_ENDPOINT};
pub use mock::{MockGenerator, MockResponse};
pub use request::{FileContext, GenerationRequest, Generator, RecentFile};

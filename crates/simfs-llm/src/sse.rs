//! Incremental decoding of server-sent events.
//!
//! Chat-completion streams arrive as records separated by blank lines; each
//! record of interest starts with `data: ` and carries either the literal
//! `[DONE]` or a JSON event. The scanner owns the cross-chunk reassembly so
//! the transport loop stays a straight pipe.

use serde_json::Value;

/// Sentinel payload ending a stream.
pub const DONE_PAYLOAD: &str = "[DONE]";

/// Accumulates transport chunks and yields complete `data:` payloads.
#[derive(Debug, Default)]
pub struct SseScanner {
    pending: String,
}

impl SseScanner {
    /// Create an empty scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns the payloads of every record
    /// completed by it. Records without a `data: ` prefix are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(end) = self.pending.find("\n\n") {
            let record: String = self.pending.drain(..end + 2).collect();
            let record = record.trim_end_matches('\n');
            if let Some(payload) = record.strip_prefix("data: ") {
                payloads.push(payload.to_string());
            }
        }
        payloads
    }
}

/// Extract `choices[0].delta.content` from a JSON event payload.
///
/// Malformed payloads and events without a content delta yield `None`; the
/// stream continues either way.
pub fn delta_content(payload: &str) -> Option<String> {
    let event: Value = serde_json::from_str(payload).ok()?;
    event
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

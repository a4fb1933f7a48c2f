//! Append-only byte buffer shared between one producer and many readers.
//!
//! The generation worker appends chunks as they arrive and eventually marks
//! the buffer complete (or errored); kernel read handlers block on
//! [`StreamBuffer::read`] until bytes show up at their offset. Once a
//! terminal flag is set the bytes stop growing. Readers time out of each
//! wait round and re-check state, so a producer that dies without a
//! terminal transition cannot park them forever between state changes.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One wait round on the reader side. Short enough to stay responsive to
/// terminal transitions, long enough not to spin.
const WAIT_ROUND: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct BufferState {
    data: Vec<u8>,
    complete: bool,
    errored: bool,
    error: Option<String>,
}

/// Streaming byte buffer with terminal states {open, complete, errored}.
///
/// Shared as `Arc<StreamBuffer>` between the producer task and any number
/// of concurrent readers. All readers observe the same byte prefix in the
/// order the producer appended it.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    state: Mutex<BufferState>,
    cond: Condvar,
}

impl StreamBuffer {
    /// Create an empty, open buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Extend the buffer. Ignored after a terminal flag is set.
    pub fn append(&self, bytes: &[u8]) {
        let mut state = self.lock();
        if state.complete {
            return;
        }
        state.data.extend_from_slice(bytes);
        self.cond.notify_all();
    }

    /// Transition to the complete state.
    pub fn mark_complete(&self) {
        let mut state = self.lock();
        state.complete = true;
        self.cond.notify_all();
    }

    /// Transition to the errored state (which is also complete).
    pub fn mark_error(&self, message: impl Into<String>) {
        let mut state = self.lock();
        state.errored = true;
        state.error = Some(message.into());
        state.complete = true;
        self.cond.notify_all();
    }

    /// Read up to `max` bytes starting at `offset`.
    ///
    /// Blocks while `offset` sits exactly at the live end of an incomplete
    /// stream. Returns an empty vector at or past the end of a completed
    /// stream (EOF). The copy happens under the buffer lock; no reference
    /// to the interior bytes escapes it.
    pub fn read(&self, offset: u64, max: usize) -> Vec<u8> {
        let mut state = self.lock();
        while offset == state.data.len() as u64 && !state.complete {
            let (guard, _timed_out) = self
                .cond
                .wait_timeout(state, WAIT_ROUND)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }

        if offset >= state.data.len() as u64 {
            return Vec::new();
        }

        let start = offset as usize;
        let end = state.data.len().min(start + max);
        state.data[start..end].to_vec()
    }

    /// Whether a terminal flag has been set.
    pub fn is_complete(&self) -> bool {
        self.lock().complete
    }

    /// Whether the stream ended in error.
    pub fn has_error(&self) -> bool {
        self.lock().errored
    }

    /// The error message, if the stream ended in error.
    pub fn error_message(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Current number of buffered bytes.
    pub fn total_size(&self) -> u64 {
        self.lock().data.len() as u64
    }
}

//! Recent-access tracking and generation context assembly.
//!
//! Every successful read pushes its path onto a process-wide bounded FIFO.
//! When a generation starts, the most recent entries are folded into the
//! request as tail excerpts so the model sees what the user has been
//! working with, newest first, under strict size caps.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use simfs_llm::RecentFile;
use simfs_store::{keys, Store, StoreResult};

use crate::special;

/// Most paths the tracker remembers.
pub const MAX_TRACKED: usize = 10;

/// Most recent-file pairs included in one generation request.
pub const MAX_CONTEXT_FILES: usize = 6;

/// Longest tail excerpt per file, in bytes, taken from the end.
pub const TAIL_LIMIT: usize = 1200 * 3;

/// Aggregate cap across all tail excerpts, in bytes.
pub const TOTAL_LIMIT: usize = 8000 * 3;

/// Bounded FIFO of recently read paths. Duplicates are allowed; overflow
/// drops from the front.
#[derive(Debug, Default)]
pub struct RecentTracker {
    queue: Mutex<VecDeque<String>>,
}

impl RecentTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read of `path`.
    pub fn push(&self, path: &str) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(path.to_string());
        while queue.len() > MAX_TRACKED {
            queue.pop_front();
        }
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.iter().cloned().collect()
    }
}

/// Turn the tracker snapshot into `(path, tail)` pairs for a generation
/// request.
///
/// Scans newest first, skipping special filenames, excluded paths, repeats,
/// and paths with no stored content. Each tail keeps at most [`TAIL_LIMIT`]
/// bytes from the end of the file; once the aggregate reaches
/// [`TOTAL_LIMIT`] the current tail is cut to the remaining budget and the
/// scan stops.
pub fn build_context(
    store: &Store,
    tracker: &RecentTracker,
    exclude: &HashSet<String>,
) -> StoreResult<Vec<RecentFile>> {
    let mut pairs = Vec::new();
    let mut seen = HashSet::new();
    let mut budget = TOTAL_LIMIT;

    for path in tracker.snapshot().iter().rev() {
        if pairs.len() >= MAX_CONTEXT_FILES || budget == 0 {
            break;
        }
        if special::is_special(path) || exclude.contains(path) || !seen.insert(path.clone()) {
            continue;
        }

        let Some(content) = store.get(&keys::content_key(path))? else {
            continue;
        };

        let take = content.len().min(TAIL_LIMIT).min(budget);
        let tail = &content[content.len() - take..];
        budget -= take;

        pairs.push(RecentFile {
            path: path.clone(),
            tail: String::from_utf8_lossy(tail).into_owned(),
        });

        if budget == 0 {
            break;
        }
    }

    Ok(pairs)
}

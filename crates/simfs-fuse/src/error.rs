use simfs_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the filesystem front-end.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path does not exist and is not eligible for lazy generation.
    #[error("no such path: {path}")]
    NotFound {
        /// The path that was requested.
        path: String,
    },

    /// The store failed; the operation is not retried.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for front-end operations.
pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// Map to the errno reported to the kernel.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound { .. } => libc::ENOENT,
            FsError::Store(_) => libc::EIO,
        }
    }

    /// Shorthand for the not-found case.
    pub fn not_found(path: &str) -> Self {
        FsError::NotFound {
            path: path.to_string(),
        }
    }
}

//! Mountpoint validation and mount options.

use std::path::Path;

use thiserror::Error;

/// Errors that keep the filesystem from mounting.
#[derive(Debug, Error)]
pub enum MountError {
    /// The mountpoint does not exist.
    #[error("mountpoint not found: {0}")]
    PathNotFound(String),

    /// The mountpoint is not a directory.
    #[error("mountpoint is not a directory: {0}")]
    NotADirectory(String),
}

/// Check that `path` exists and is a directory.
pub fn validate_mountpoint(path: &Path) -> Result<(), MountError> {
    if !path.exists() {
        return Err(MountError::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(MountError::NotADirectory(path.display().to_string()));
    }
    Ok(())
}

/// The option set passed to the kernel driver.
pub fn mount_options() -> Vec<fuser::MountOption> {
    vec![
        fuser::MountOption::FSName("simfs".to_string()),
        fuser::MountOption::AutoUnmount,
    ]
}

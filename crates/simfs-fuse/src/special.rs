//! Never-generate basenames.
//!
//! Desktop environments and operating systems probe freshly mounted
//! filesystems for these names. Reporting them as lazily-existing files
//! would turn every probe into an LLM call, so both `getattr` (refusing
//! ephemeral existence) and `read` (refusing generation) consult this list.

use crate::config::CONFIG_FILENAME;
use crate::paths;

/// Basenames excluded from lazy generation.
pub const SPECIAL_BASENAMES: [&str; 11] = [
    CONFIG_FILENAME,
    ".xdg-volume-info",
    "autorun.inf",
    ".DS_Store",
    "desktop.ini",
    "Thumbs.db",
    ".directory",
    "NTUSER.DAT",
    "pagefile.sys",
    "hiberfil.sys",
    "swapfile.sys",
];

/// Whether the path's basename is on the never-generate list.
pub fn is_special(path: &str) -> bool {
    SPECIAL_BASENAMES.contains(&paths::basename(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_probes_are_special() {
        assert!(is_special("/.DS_Store"));
        assert!(is_special("/docs/Thumbs.db"));
        assert!(is_special("/autorun.inf"));
        assert!(is_special("/.simfs_config.toml"));
    }

    #[test]
    fn test_special_is_basename_scoped() {
        assert!(is_special("/deep/nested/.directory"));
        assert!(!is_special("/deep/.directory/file.txt"));
    }

    #[test]
    fn test_ordinary_dotted_names_are_not_special() {
        assert!(!is_special("/notes.txt"));
        assert!(!is_special("/.hidden"));
    }
}

//! Node attributes reported to the kernel.

use std::time::SystemTime;

use fuser::{FileAttr, FileType};

/// What a path is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// The attributes the front-end decides; ownership and timestamps are
/// filled in by the adapter from the calling request and the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    /// File or directory.
    pub kind: NodeKind,
    /// Content length in bytes; 0 for directories and ephemeral files.
    pub size: u64,
    /// Permission bits.
    pub perm: u16,
    /// Link count.
    pub nlink: u32,
}

impl NodeAttr {
    /// A directory: mode 0755, link count 2.
    pub fn dir() -> Self {
        NodeAttr {
            kind: NodeKind::Directory,
            size: 0,
            perm: 0o755,
            nlink: 2,
        }
    }

    /// A regular file: mode 0644, link count 1.
    pub fn file(size: u64) -> Self {
        NodeAttr {
            kind: NodeKind::File,
            size,
            perm: 0o644,
            nlink: 1,
        }
    }
}

/// The kernel file type for a node kind.
pub fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::File => FileType::RegularFile,
        NodeKind::Directory => FileType::Directory,
    }
}

/// Build the full kernel attribute record. All three timestamps are the
/// wall-clock time; owner and group come from the calling process.
pub fn to_fuse_attr(ino: u64, attr: &NodeAttr, uid: u32, gid: u32) -> FileAttr {
    let now = SystemTime::now();
    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime: now,
        mtime: now,
        ctime: now,
        crtime: now,
        kind: file_type(attr.kind),
        perm: attr.perm,
        nlink: attr.nlink,
        uid,
        gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

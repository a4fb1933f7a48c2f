//! fuser adapter.
//!
//! Translates the kernel's inode-based protocol onto the path-keyed core.
//! Every open handle gets direct I/O and non-seekable semantics so the
//! kernel forwards each read instead of serving a zero-filled page cache,
//! which is what makes in-flight streams visible to the reading process.

use std::ffi::OsStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use fuser::{
    Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyWrite, Request,
};
use tracing::debug;

use crate::attr::{self, NodeAttr};
use crate::filesystem::SimFs;
use crate::inode::InodeTable;
use crate::paths;

/// Flags set on every opened handle.
const OPEN_FLAGS: u32 = fuser::consts::FOPEN_DIRECT_IO | fuser::consts::FOPEN_NONSEEKABLE;

/// How long the kernel may cache attributes and entries.
const TTL: Duration = Duration::from_secs(1);

/// The mounted filesystem.
pub struct SimFsFuse {
    fs: Arc<SimFs>,
    inodes: Mutex<InodeTable>,
}

impl SimFsFuse {
    /// Wrap a front-end for mounting.
    pub fn new(fs: Arc<SimFs>) -> Self {
        SimFsFuse {
            fs,
            inodes: Mutex::new(InodeTable::new()),
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        let inodes = self.inodes.lock().unwrap_or_else(PoisonError::into_inner);
        inodes.get_path(ino).map(str::to_string)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent_path = self.path_of(parent)?;
        Some(paths::join(&parent_path, &name.to_string_lossy()))
    }

    fn register(&self, path: &str) -> u64 {
        let mut inodes = self.inodes.lock().unwrap_or_else(PoisonError::into_inner);
        inodes.get_or_create(path)
    }
}

impl Filesystem for SimFsFuse {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!("lookup {}", path);

        match self.fs.getattr(&path) {
            Ok(node) => {
                let ino = self.register(&path);
                reply.entry(&TTL, &attr::to_fuse_attr(ino, &node, req.uid(), req.gid()), 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!("getattr {}", path);

        match self.fs.getattr(&path) {
            Ok(node) => reply.attr(&TTL, &attr::to_fuse_attr(ino, &node, req.uid(), req.gid())),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!("readdir {} offset={}", path, offset);

        let children = match self.fs.readdir(&path) {
            Ok(children) => children,
            Err(e) => {
                reply.error(e.to_errno());
                return;
            }
        };

        let parent_ino = self.register(&paths::parent(&path));
        let mut listing = vec![
            (ino, fuser::FileType::Directory, ".".to_string()),
            (parent_ino, fuser::FileType::Directory, "..".to_string()),
        ];
        for child in children {
            let child_ino = self.register(&child.path);
            listing.push((child_ino, attr::file_type(child.kind), child.name));
        }

        for (i, (entry_ino, kind, name)) in
            listing.into_iter().enumerate().skip(offset as usize)
        {
            if reply.add(entry_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("open ino={}", ino);
        // Opens always succeed; a miss becomes a generation on first read.
        reply.opened(0, OPEN_FLAGS);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        match self.fs.read(&path, offset.max(0) as u64, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        match self.fs.write(&path, data, offset.max(0) as u64) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!("create {}", path);

        match self.fs.create(&path) {
            Ok(()) => {
                let ino = self.register(&path);
                let node = NodeAttr::file(0);
                reply.created(
                    &TTL,
                    &attr::to_fuse_attr(ino, &node, req.uid(), req.gid()),
                    0,
                    0,
                    OPEN_FLAGS,
                );
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!("mkdir {}", path);

        match self.fs.mkdir(&path) {
            Ok(()) => {
                let ino = self.register(&path);
                let node = NodeAttr::dir();
                reply.entry(&TTL, &attr::to_fuse_attr(ino, &node, req.uid(), req.gid()), 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!("unlink {}", path);

        match self.fs.unlink(&path) {
            Ok(()) => {
                let mut inodes = self.inodes.lock().unwrap_or_else(PoisonError::into_inner);
                inodes.remove_by_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!("rmdir {}", path);

        match self.fs.rmdir(&path) {
            Ok(()) => {
                let mut inodes = self.inodes.lock().unwrap_or_else(PoisonError::into_inner);
                inodes.remove_by_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_flags_disable_caching_and_seeking() {
        assert_ne!(OPEN_FLAGS & fuser::consts::FOPEN_DIRECT_IO, 0);
        assert_ne!(OPEN_FLAGS & fuser::consts::FOPEN_NONSEEKABLE, 0);
    }
}

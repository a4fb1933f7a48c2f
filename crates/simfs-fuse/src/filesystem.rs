//! Path-keyed operation handlers.
//!
//! `SimFs` owns the store, the generation client, the in-flight generation
//! table, the recent-access tracker, and the config resolver, and exposes
//! the filesystem operations as path-based methods. The fuser adapter is a
//! thin inode-to-path translation on top.
//!
//! Lock nesting, outermost first: in-flight table, main filesystem lock,
//! per-buffer lock, recent queue, config cache. Reads served from an
//! in-flight buffer hold no front-end lock at all, so a stalled generation
//! never blocks unrelated operations.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use simfs_llm::{FileContext, GenerationRequest, Generator, StreamBuffer};
use simfs_store::{keys, Store};

use crate::attr::{NodeAttr, NodeKind};
use crate::config::{ConfigResolver, CONFIG_FILENAME};
use crate::error::{FsError, Result};
use crate::paths;
use crate::recent::{self, RecentTracker};
use crate::special;

/// One entry reported by `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name within the directory.
    pub name: String,
    /// Full absolute path.
    pub path: String,
    /// File or directory.
    pub kind: NodeKind,
}

/// The filesystem front-end.
pub struct SimFs {
    store: Store,
    generator: Arc<dyn Generator>,
    in_flight: Mutex<HashMap<String, Arc<StreamBuffer>>>,
    fs_lock: Mutex<()>,
    recent: RecentTracker,
    config: ConfigResolver,
}

impl SimFs {
    /// Build a front-end over `store`, generating through `generator`.
    pub fn new(store: Store, generator: Arc<dyn Generator>) -> Self {
        SimFs {
            store,
            generator,
            in_flight: Mutex::new(HashMap::new()),
            fs_lock: Mutex::new(()),
            recent: RecentTracker::new(),
            config: ConfigResolver::new(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Attributes for `path`.
    ///
    /// Materialized paths report their stored type and size. A non-special
    /// path whose basename carries a dot reports as an empty regular file
    /// so that opening and reading it triggers generation; everything else
    /// is not found.
    pub fn getattr(&self, path: &str) -> Result<NodeAttr> {
        if path == "/" {
            return Ok(NodeAttr::dir());
        }

        let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(tag) = self.store.get(&keys::meta_key(path))? {
            if keys::is_dir_tag(&tag) {
                return Ok(NodeAttr::dir());
            }
            let size = self
                .store
                .get(&keys::content_key(path))?
                .map(|c| c.len() as u64)
                .unwrap_or(0);
            return Ok(NodeAttr::file(size));
        }

        if special::is_special(path) {
            return Err(FsError::not_found(path));
        }

        if paths::dotted_basename(path) {
            // Ephemeral: size unknown until the stream runs.
            return Ok(NodeAttr::file(0));
        }

        Err(FsError::not_found(path))
    }

    /// Direct children of `path`.
    pub fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.entries_under(path)
    }

    /// Scan `meta:<dir>/` and keep entries whose tail has no internal
    /// slash (children at this level only; a trailing slash is tolerated).
    /// Caller holds the filesystem lock.
    fn entries_under(&self, dir: &str) -> Result<Vec<DirEntry>> {
        let mut dir = dir.to_string();
        if !dir.ends_with('/') {
            dir.push('/');
        }
        let prefix = keys::meta_key(&dir);

        let mut entries = Vec::new();
        for key in self.store.scan_prefix(&prefix)? {
            let tail = &key[prefix.len()..];
            let name = tail.strip_suffix('/').unwrap_or(tail);
            if name.is_empty() || name.contains('/') {
                continue;
            }

            let Some(tag) = self.store.get(&key)? else {
                continue;
            };
            let kind = if keys::is_dir_tag(&tag) {
                NodeKind::Directory
            } else {
                NodeKind::File
            };

            entries.push(DirEntry {
                name: name.to_string(),
                path: format!("{}{}", dir, name),
                kind,
            });
        }
        Ok(entries)
    }

    /// Read up to `size` bytes at `offset`.
    ///
    /// Serves, in order of preference: an in-flight generation buffer,
    /// stored content, EOF for special filenames, and finally a freshly
    /// started generation stream.
    pub fn read(&self, path: &str, offset: u64, size: usize) -> Result<Vec<u8>> {
        // An in-flight stream for this path wins; no front-end lock is
        // held while the read blocks on it.
        let existing = {
            let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            in_flight.get(path).cloned()
        };
        if let Some(buffer) = existing {
            debug!("read {} offset={} from in-flight stream", path, offset);
            return self.read_from_stream(path, &buffer, offset, size);
        }

        {
            let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(content) = self.store.get(&keys::content_key(path))? {
                self.recent.push(path);
                return Ok(window(&content, offset, size));
            }
        }

        if special::is_special(path) {
            debug!("read of special name {} with no record, EOF", path);
            return Ok(Vec::new());
        }

        // Generation path. Check-and-insert happens under the in-flight
        // lock so concurrent readers of the same path share one stream.
        let buffer = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(path) {
                Some(buffer) => Arc::clone(buffer),
                None => {
                    let request = self.build_request(path)?;
                    debug!("starting generation for {} with model {}", path, request.model);
                    let buffer = self.generator.generate_stream(request);
                    in_flight.insert(path.to_string(), Arc::clone(&buffer));
                    self.recent.push(path);
                    buffer
                }
            }
        };

        self.read_from_stream(path, &buffer, offset, size)
    }

    /// Serve one read from a stream buffer, then persist and retire the
    /// buffer if this read observed a finished stream past its end.
    fn read_from_stream(
        &self,
        path: &str,
        buffer: &Arc<StreamBuffer>,
        offset: u64,
        size: usize,
    ) -> Result<Vec<u8>> {
        let data = buffer.read(offset, size);

        if buffer.is_complete() && offset >= buffer.total_size() {
            self.finish_stream(path, buffer)?;
        }

        Ok(data)
    }

    /// Persist a completed stream exactly once and drop it from the
    /// in-flight table. Errored streams persist nothing.
    fn finish_stream(&self, path: &str, buffer: &Arc<StreamBuffer>) -> Result<()> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        // Another reader may have finished it first, or a newer stream may
        // already be running for this path.
        match in_flight.get(path) {
            Some(current) if Arc::ptr_eq(current, buffer) => {}
            _ => return Ok(()),
        }

        if buffer.has_error() {
            warn!(
                "generation for {} failed: {}",
                path,
                buffer.error_message().unwrap_or_else(|| "unknown error".to_string())
            );
        } else {
            let body = buffer.read(0, buffer.total_size() as usize);
            self.store.put(&keys::content_key(path), &body)?;
            self.store
                .put(&keys::meta_key(path), keys::TYPE_FILE.as_bytes())?;
            debug!("persisted {} generated bytes for {}", body.len(), path);
        }

        in_flight.remove(path);
        Ok(())
    }

    /// Assemble the generation request for `path`: sibling previews, the
    /// recent-access tails, and the effective model.
    fn build_request(&self, path: &str) -> Result<GenerationRequest> {
        let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut folder_context = Vec::new();
        for entry in self.entries_under(&paths::parent(path))? {
            if entry.kind != NodeKind::File || entry.path == path {
                continue;
            }
            let Some(content) = self.store.get(&keys::content_key(&entry.path))? else {
                continue;
            };
            let preview: String = String::from_utf8_lossy(&content)
                .chars()
                .take(simfs_llm::prompt::PREVIEW_CHARS)
                .collect();
            folder_context.push(FileContext {
                path: entry.path,
                preview,
            });
        }

        let mut exclude: HashSet<String> =
            folder_context.iter().map(|c| c.path.clone()).collect();
        exclude.insert(path.to_string());
        let recent_files = recent::build_context(&self.store, &self.recent, &exclude)?;

        let config = self.config.resolve(&self.store, path)?;

        Ok(GenerationRequest {
            path: path.to_string(),
            folder_context,
            recent_files,
            model: config.model,
        })
    }

    /// Read-modify-write of the stored content, zero-filling any gap.
    pub fn write(&self, path: &str, data: &[u8], offset: u64) -> Result<usize> {
        {
            let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);

            let mut content = self
                .store
                .get(&keys::content_key(path))?
                .unwrap_or_default();

            let start = offset as usize;
            let end = start + data.len();
            if end > content.len() {
                content.resize(end, 0);
            }
            content[start..end].copy_from_slice(data);

            self.store.put(&keys::content_key(path), &content)?;
            if !self.store.exists(&keys::meta_key(path))? {
                self.store
                    .put(&keys::meta_key(path), keys::TYPE_FILE.as_bytes())?;
            }
        }

        if paths::basename(path) == CONFIG_FILENAME {
            self.config.invalidate();
        }

        Ok(data.len())
    }

    /// Materialize an empty regular file.
    pub fn create(&self, path: &str) -> Result<()> {
        {
            let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.store
                .put(&keys::meta_key(path), keys::TYPE_FILE.as_bytes())?;
            self.store.put(&keys::content_key(path), b"")?;
        }

        if paths::basename(path) == CONFIG_FILENAME {
            self.config.invalidate();
        }

        Ok(())
    }

    /// Remove both records for `path`.
    pub fn unlink(&self, path: &str) -> Result<()> {
        {
            let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.store.delete(&keys::meta_key(path))?;
            self.store.delete(&keys::content_key(path))?;
        }

        if paths::basename(path) == CONFIG_FILENAME {
            self.config.invalidate();
        }

        Ok(())
    }

    /// Materialize a directory.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store
            .put(&keys::meta_key(path), keys::TYPE_DIR.as_bytes())?;
        Ok(())
    }

    /// Remove a directory record. Emptiness is the kernel's business.
    pub fn rmdir(&self, path: &str) -> Result<()> {
        let _guard = self.fs_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.delete(&keys::meta_key(path))?;
        Ok(())
    }
}

/// The `min(size, len - offset)` window of `content`, empty at or past EOF.
fn window(content: &[u8], offset: u64, size: usize) -> Vec<u8> {
    if offset >= content.len() as u64 {
        return Vec::new();
    }
    let start = offset as usize;
    let end = content.len().min(start + size);
    content[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simfs_llm::MockGenerator;

    fn fs_with(generator: MockGenerator) -> (SimFs, Arc<MockGenerator>) {
        let generator = Arc::new(generator);
        let fs = SimFs::new(
            Store::temporary().unwrap(),
            Arc::clone(&generator) as Arc<dyn Generator>,
        );
        (fs, generator)
    }

    #[test]
    fn test_window_bounds() {
        assert_eq!(window(b"hello", 0, 3), b"hel");
        assert_eq!(window(b"hello", 3, 10), b"lo");
        assert!(window(b"hello", 5, 1).is_empty());
        assert!(window(b"hello", 9, 1).is_empty());
    }

    #[test]
    fn test_getattr_root() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        let attr = fs.getattr("/").unwrap();
        assert_eq!(attr.kind, NodeKind::Directory);
        assert_eq!(attr.perm, 0o755);
    }

    #[test]
    fn test_getattr_undotted_missing_is_not_found() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        assert!(matches!(
            fs.getattr("/nodots"),
            Err(FsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_getattr_dotted_missing_is_ephemeral_file() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        let attr = fs.getattr("/has.ext").unwrap();
        assert_eq!(attr.kind, NodeKind::File);
        assert_eq!(attr.size, 0);
        assert_eq!(attr.perm, 0o644);
    }

    #[test]
    fn test_getattr_special_missing_is_not_found() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        assert!(fs.getattr("/.DS_Store").is_err());
    }

    #[test]
    fn test_getattr_materialized_file_reports_size() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        fs.create("/a.txt").unwrap();
        fs.write("/a.txt", b"hello", 0).unwrap();
        let attr = fs.getattr("/a.txt").unwrap();
        assert_eq!(attr.size, 5);
        assert_eq!(attr.kind, NodeKind::File);
    }

    #[test]
    fn test_getattr_materialized_dir() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        fs.mkdir("/sub").unwrap();
        let attr = fs.getattr("/sub").unwrap();
        assert_eq!(attr.kind, NodeKind::Directory);
    }

    #[test]
    fn test_readdir_lists_direct_children_only() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        fs.mkdir("/d").unwrap();
        fs.create("/d/one.txt").unwrap();
        fs.create("/d/two.txt").unwrap();
        fs.create("/d/nested/three.txt").unwrap();
        fs.mkdir("/d/nested").unwrap();

        let names: Vec<_> = fs
            .readdir("/d")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["nested", "one.txt", "two.txt"]);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (fs, generator) = fs_with(MockGenerator::fixed("should not run"));
        fs.create("/a.txt").unwrap();
        assert_eq!(fs.write("/a.txt", b"hello", 0).unwrap(), 5);
        assert_eq!(fs.read("/a.txt", 0, 10).unwrap(), b"hello");
        assert_eq!(generator.request_count(), 0);
    }

    #[test]
    fn test_write_with_gap_zero_fills() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        fs.create("/gap.bin").unwrap();
        fs.write("/gap.bin", b"xy", 4).unwrap();
        assert_eq!(fs.read("/gap.bin", 0, 10).unwrap(), b"\0\0\0\0xy");
    }

    #[test]
    fn test_write_without_create_sets_file_meta() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        fs.write("/bare.txt", b"data", 0).unwrap();
        let store = fs.store();
        assert_eq!(
            store.get(&keys::meta_key("/bare.txt")).unwrap(),
            Some(keys::TYPE_FILE.as_bytes().to_vec())
        );
    }

    #[test]
    fn test_create_then_read_is_empty_without_generation() {
        let (fs, generator) = fs_with(MockGenerator::fixed("nope"));
        fs.create("/empty.md").unwrap();
        assert!(fs.read("/empty.md", 0, 100).unwrap().is_empty());
        assert_eq!(generator.request_count(), 0);
    }

    #[test]
    fn test_unlink_removes_both_records() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        fs.create("/gone.txt").unwrap();
        fs.write("/gone.txt", b"bye", 0).unwrap();
        fs.unlink("/gone.txt").unwrap();

        let store = fs.store();
        assert!(!store.exists(&keys::meta_key("/gone.txt")).unwrap());
        assert!(!store.exists(&keys::content_key("/gone.txt")).unwrap());
    }

    #[test]
    fn test_rmdir_removes_meta() {
        let (fs, _) = fs_with(MockGenerator::fixed(""));
        fs.mkdir("/d").unwrap();
        fs.rmdir("/d").unwrap();
        assert!(fs.getattr("/d").is_err());
    }

    #[test]
    fn test_read_generates_and_persists_once_past_eof() {
        let (fs, generator) = fs_with(MockGenerator::fixed("# body\n"));

        let body = fs.read("/new.md", 0, 1024).unwrap();
        assert_eq!(body, b"# body\n");

        // Reading past the end retires the stream and persists.
        assert!(fs.read("/new.md", body.len() as u64, 1024).unwrap().is_empty());

        let store = fs.store();
        assert_eq!(
            store.get(&keys::content_key("/new.md")).unwrap(),
            Some(b"# body\n".to_vec())
        );
        assert_eq!(
            store.get(&keys::meta_key("/new.md")).unwrap(),
            Some(keys::TYPE_FILE.as_bytes().to_vec())
        );
        assert_eq!(generator.request_count(), 1);

        // Subsequent reads come from the store, not a second generation.
        assert_eq!(fs.read("/new.md", 0, 1024).unwrap(), b"# body\n");
        assert_eq!(generator.request_count(), 1);
    }

    #[test]
    fn test_empty_successful_stream_still_materializes() {
        let (fs, generator) = fs_with(MockGenerator::fixed(""));

        // The stream completes with zero bytes; the read observes EOF and
        // retires the buffer, which must persist both records.
        assert!(fs.read("/blank.md", 0, 1024).unwrap().is_empty());

        let store = fs.store();
        assert_eq!(
            store.get(&keys::content_key("/blank.md")).unwrap(),
            Some(Vec::new())
        );
        assert_eq!(
            store.get(&keys::meta_key("/blank.md")).unwrap(),
            Some(keys::TYPE_FILE.as_bytes().to_vec())
        );
        assert_eq!(generator.request_count(), 1);

        // Materialized as an empty file: no second generation.
        assert!(fs.read("/blank.md", 0, 1024).unwrap().is_empty());
        assert_eq!(generator.request_count(), 1);
    }

    #[test]
    fn test_read_special_missing_is_eof_without_generation() {
        let (fs, generator) = fs_with(MockGenerator::fixed("never"));
        assert!(fs.read("/.DS_Store", 0, 512).unwrap().is_empty());
        assert_eq!(generator.request_count(), 0);
    }

    #[test]
    fn test_errored_stream_persists_nothing() {
        let (fs, generator) = fs_with(MockGenerator::failing("endpoint down"));

        assert!(fs.read("/fail.md", 0, 512).unwrap().is_empty());

        let store = fs.store();
        assert!(!store.exists(&keys::content_key("/fail.md")).unwrap());
        assert!(!store.exists(&keys::meta_key("/fail.md")).unwrap());
        assert_eq!(generator.request_count(), 1);

        // The buffer was retired, so another read starts a fresh attempt.
        fs.read("/fail.md", 0, 512).unwrap();
        assert_eq!(generator.request_count(), 2);
    }

    #[test]
    fn test_generation_request_carries_folder_context() {
        let (fs, generator) = fs_with(MockGenerator::fixed("gen"));
        fs.mkdir("/proj").unwrap();
        fs.create("/proj/readme.md").unwrap();
        fs.write("/proj/readme.md", b"project notes", 0).unwrap();

        fs.read("/proj/new.py", 0, 64).unwrap();

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/proj/new.py");
        let context_paths: Vec<_> = requests[0]
            .folder_context
            .iter()
            .map(|c| c.path.as_str())
            .collect();
        assert_eq!(context_paths, vec!["/proj/readme.md"]);
        assert_eq!(requests[0].folder_context[0].preview, "project notes");
    }

    #[test]
    fn test_generation_request_excludes_folder_context_from_recent() {
        let (fs, generator) = fs_with(MockGenerator::fixed("gen"));
        fs.create("/sibling.txt").unwrap();
        fs.write("/sibling.txt", b"sib", 0).unwrap();
        fs.create("/other/far.txt").unwrap();
        fs.write("/other/far.txt", b"far away", 0).unwrap();

        // Populate the recent queue with both.
        fs.read("/sibling.txt", 0, 16).unwrap();
        fs.read("/other/far.txt", 0, 16).unwrap();

        fs.read("/target.py", 0, 64).unwrap();

        let request = generator.requests().pop().unwrap();
        let recent_paths: Vec<_> =
            request.recent_files.iter().map(|r| r.path.as_str()).collect();
        assert!(recent_paths.contains(&"/other/far.txt"));
        assert!(!recent_paths.contains(&"/sibling.txt"));
    }

    #[test]
    fn test_config_model_reaches_generator() {
        let (fs, generator) = fs_with(MockGenerator::fixed("gen"));
        fs.write("/.simfs_config.toml", b"model = \"X\"\n", 0).unwrap();

        fs.read("/file.py", 0, 64).unwrap();
        assert_eq!(generator.requests().pop().unwrap().model, "X");

        fs.unlink("/.simfs_config.toml").unwrap();
        fs.read("/other.py", 0, 64).unwrap();
        assert_eq!(
            generator.requests().pop().unwrap().model,
            crate::config::DEFAULT_MODEL
        );
    }
}

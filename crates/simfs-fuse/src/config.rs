//! Per-directory configuration, resolved from inside the filesystem.
//!
//! Each directory may hold a `.simfs_config.toml` stored like any other
//! file. Resolving a path walks the directory chain from the root down,
//! merging documents key-by-key so deeper levels override shallower ones.
//! Results are cached per directory; the cache is flushed wholesale
//! whenever a config file is written or removed anywhere in the tree.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use tracing::{debug, warn};

use simfs_store::{keys, Store, StoreResult};

/// Name of the per-directory configuration file.
pub const CONFIG_FILENAME: &str = ".simfs_config.toml";

/// Model used when no config file says otherwise.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Effective configuration for one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirConfig {
    /// Model name passed to the generation client.
    pub model: String,
}

impl Default for DirConfig {
    fn default() -> Self {
        DirConfig {
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// On-disk document shape. Every key is optional; unknown keys are ignored
/// for forward compatibility.
#[derive(Debug, Deserialize)]
struct ConfigDoc {
    model: Option<String>,
}

/// Caching hierarchical resolver.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    cache: Mutex<HashMap<String, DirConfig>>,
}

impl ConfigResolver {
    /// Create a resolver with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective configuration for the directory containing `path`.
    pub fn resolve(&self, store: &Store, path: &str) -> StoreResult<DirConfig> {
        let dir = directory_of(path).to_string();

        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(&dir) {
                return Ok(hit.clone());
            }
        }

        let mut effective = DirConfig::default();
        for level in levels(&dir) {
            let config_path = format!("{}/{}", level, CONFIG_FILENAME);
            let Some(bytes) = store.get(&keys::content_key(&config_path))? else {
                continue;
            };

            match toml::from_str::<ConfigDoc>(&String::from_utf8_lossy(&bytes)) {
                Ok(doc) => {
                    if let Some(model) = doc.model {
                        effective.model = model;
                    }
                }
                Err(e) => {
                    warn!("ignoring malformed config at {}: {}", config_path, e);
                }
            }
        }

        debug!("resolved config for {}: model={}", dir, effective.model);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(dir, effective.clone());
        Ok(effective)
    }

    /// Drop every cached entry. Called on any write, create, or unlink of a
    /// file named [`CONFIG_FILENAME`].
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
    }
}

/// Directory of a path: the part before the final slash, empty for
/// top-level entries.
fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Directory chain from the root down to `dir` inclusive. The root is the
/// empty string so `<level>/<name>` yields an absolute path at every level.
fn levels(dir: &str) -> Vec<String> {
    let mut chain = vec![String::new()];
    let mut current = String::new();
    for component in dir.split('/').filter(|c| !c.is_empty()) {
        current.push('/');
        current.push_str(component);
        chain.push(current.clone());
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_config(store: &Store, dir: &str, body: &str) {
        let path = format!("{}/{}", dir, CONFIG_FILENAME);
        store
            .put(&keys::meta_key(&path), keys::TYPE_FILE.as_bytes())
            .unwrap();
        store.put(&keys::content_key(&path), body.as_bytes()).unwrap();
    }

    #[test]
    fn test_default_when_no_config() {
        let store = Store::temporary().unwrap();
        let resolver = ConfigResolver::new();
        let config = resolver.resolve(&store, "/a/b/file.py").unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_root_config_applies_everywhere() {
        let store = Store::temporary().unwrap();
        put_config(&store, "", "model = \"root-model\"\n");

        let resolver = ConfigResolver::new();
        assert_eq!(resolver.resolve(&store, "/f.py").unwrap().model, "root-model");
        assert_eq!(
            resolver.resolve(&store, "/deep/dir/f.py").unwrap().model,
            "root-model"
        );
    }

    #[test]
    fn test_deeper_overrides_shallower() {
        let store = Store::temporary().unwrap();
        put_config(&store, "", "model = \"root-model\"\n");
        put_config(&store, "/proj", "model = \"proj-model\"\n");

        let resolver = ConfigResolver::new();
        assert_eq!(
            resolver.resolve(&store, "/proj/f.py").unwrap().model,
            "proj-model"
        );
        assert_eq!(resolver.resolve(&store, "/other/f.py").unwrap().model, "root-model");
    }

    #[test]
    fn test_level_without_config_keeps_effective() {
        let store = Store::temporary().unwrap();
        put_config(&store, "/proj", "model = \"proj-model\"\n");

        let resolver = ConfigResolver::new();
        assert_eq!(
            resolver.resolve(&store, "/proj/sub/deep/f.py").unwrap().model,
            "proj-model"
        );
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let store = Store::temporary().unwrap();
        put_config(&store, "", "model = \"m\"\nfuture_knob = 3\n");

        let resolver = ConfigResolver::new();
        assert_eq!(resolver.resolve(&store, "/f.py").unwrap().model, "m");
    }

    #[test]
    fn test_malformed_config_contributes_nothing() {
        let store = Store::temporary().unwrap();
        put_config(&store, "", "model = \"good\"\n");
        put_config(&store, "/bad", "model = not quoted");

        let resolver = ConfigResolver::new();
        assert_eq!(resolver.resolve(&store, "/bad/f.py").unwrap().model, "good");
    }

    #[test]
    fn test_cache_hit_survives_store_change_until_invalidate() {
        let store = Store::temporary().unwrap();
        let resolver = ConfigResolver::new();
        assert_eq!(resolver.resolve(&store, "/f.py").unwrap().model, DEFAULT_MODEL);

        put_config(&store, "", "model = \"late\"\n");
        // Still cached.
        assert_eq!(resolver.resolve(&store, "/f.py").unwrap().model, DEFAULT_MODEL);

        resolver.invalidate();
        assert_eq!(resolver.resolve(&store, "/f.py").unwrap().model, "late");
    }

    #[test]
    fn test_levels_chain() {
        assert_eq!(levels(""), vec![""]);
        assert_eq!(levels("/a"), vec!["", "/a"]);
        assert_eq!(levels("/a/b"), vec!["", "/a", "/a/b"]);
    }
}

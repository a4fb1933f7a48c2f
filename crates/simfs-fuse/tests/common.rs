//! Shared fixtures for end-to-end filesystem scenarios.

use std::sync::Arc;

use simfs_fuse::SimFs;
use simfs_llm::{Generator, MockGenerator};
use simfs_store::Store;

/// A front-end over a throwaway store and a scripted generator.
pub struct TestFs {
    pub fs: Arc<SimFs>,
    pub generator: Arc<MockGenerator>,
}

impl TestFs {
    pub fn new(generator: MockGenerator) -> Self {
        let generator = Arc::new(generator);
        let fs = Arc::new(SimFs::new(
            Store::temporary().expect("temporary store"),
            Arc::clone(&generator) as Arc<dyn Generator>,
        ));
        TestFs { fs, generator }
    }

    /// Read `path` from offset 0 until EOF, the way a sequential reader
    /// drains a non-seekable handle.
    pub fn read_to_end(&self, path: &str) -> Vec<u8> {
        read_to_end_from(&self.fs, path)
    }
}

/// Free-function variant for readers running on their own threads.
pub fn read_to_end_from(fs: &SimFs, path: &str) -> Vec<u8> {
    let mut collected = Vec::new();
    loop {
        let chunk = fs
            .read(path, collected.len() as u64, 1024)
            .expect("read failed");
        if chunk.is_empty() {
            break;
        }
        collected.extend_from_slice(&chunk);
    }
    collected
}

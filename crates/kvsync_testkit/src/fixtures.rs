//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up stores and driving
//! spawned relays to completion in tests.

use kvsync_store::{FileKv, StorageItems};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

/// A file-backed store in a temporary directory, removed on drop.
pub struct TestFileStore {
    /// The store instance.
    pub kv: FileKv,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestFileStore {
    /// Creates an empty store file in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let kv = FileKv::open(&temp_dir.path().join("storage.json"))
            .expect("Failed to open file store");
        Self {
            kv,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> PathBuf {
        self.kv.path().to_path_buf()
    }
}

impl Default for TestFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestFileStore {
    type Target = FileKv;

    fn deref(&self) -> &Self::Target {
        &self.kv
    }
}

/// Builds a [`StorageItems`] map from key/value pairs.
pub fn items(pairs: &[(&str, Value)]) -> StorageItems {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Yields to the runtime enough times for spawned relays to run.
///
/// Only meaningful on a current-thread runtime, where spawned tasks make
/// progress exactly when the test task yields.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Installs a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

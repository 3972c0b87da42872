//! Set command implementation.

use kvsync_store::{FileKv, RemoteKv, StorageItems};
use serde_json::Value;
use std::path::Path;

/// Runs the set command.
///
/// Creates the store file (and its parent directories) if needed.
pub async fn run(path: &Path, key: &str, raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    if key.is_empty() {
        return Err("Key must not be empty".into());
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("Value is not valid JSON: {e}"))?;

    let kv = FileKv::open_with_create_dirs(path)?;
    kv.set(StorageItems::from([(key.to_string(), value)])).await?;

    tracing::info!(key, path = %path.display(), "value stored");
    Ok(())
}

//! Remove command implementation.

use kvsync_store::RemoteKv;
use std::path::Path;

/// Runs the remove command.
///
/// Keys that are not present are reported and skipped.
pub async fn run(path: &Path, keys: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let kv = super::open_existing(path)?;

    let existing = kv.get_all().await?;
    for key in keys.iter().filter(|k| !existing.contains_key(k.as_str())) {
        tracing::warn!(key = %key, "key not present");
    }

    kv.remove(keys).await?;
    Ok(())
}

//! Get command implementation.

use kvsync_store::RemoteKv;
use serde_json::Value;
use std::path::Path;

/// Runs the get command.
pub async fn run(path: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let kv = super::open_existing(path)?;
    let value = lookup(&kv, key).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Reads `key`, failing when it is absent.
async fn lookup(kv: &dyn RemoteKv, key: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let mut items = kv.get(key).await?;
    items
        .remove(key)
        .ok_or_else(|| format!("Key not found: {key}").into())
}

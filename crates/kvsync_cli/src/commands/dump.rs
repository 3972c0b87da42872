//! Dump command implementation.

use kvsync_core::{dump_storage, StorageDump};
use std::path::Path;

/// Runs the dump command.
pub async fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let kv = super::open_existing(path)?;
    let dump = dump_storage(&kv).await?;
    tracing::debug!(path = %path.display(), entries = dump.len(), "store read");

    print!("{}", render(&dump, format)?);
    Ok(())
}

/// Formats a dump for output.
fn render(dump: &StorageDump, format: &str) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        "json" => Ok(format!("{}\n", serde_json::to_string_pretty(dump)?)),
        "text" => Ok(dump.to_string()),
        other => Err(format!("Unknown format: {other} (expected text or json)").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvsync_store::{RemoteKv, StorageArea, StorageItems};
    use kvsync_testkit::{items, TestFileStore};
    use serde_json::json;

    fn sample() -> StorageDump {
        StorageDump {
            area: StorageArea::Local,
            items: items(&[("theme", json!("dark"))]),
        }
    }

    #[test]
    fn renders_text() {
        let text = render(&sample(), "text").unwrap();
        assert_eq!(text, "Storage local contents:\n\ttheme: \"dark\"\n");
    }

    #[test]
    fn renders_json() {
        let text = render(&sample(), "json").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["area"], json!("local"));
        assert_eq!(parsed["items"]["theme"], json!("dark"));
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(render(&sample(), "yaml").is_err());
    }

    #[tokio::test]
    async fn dumps_file_store() {
        let store = TestFileStore::new();
        store
            .set(StorageItems::from([("volume".to_string(), json!(7))]))
            .await
            .unwrap();

        assert!(run(&store.path(), "text").await.is_ok());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let store = TestFileStore::new();
        assert!(run(&store.path(), "text").await.is_err());
    }
}

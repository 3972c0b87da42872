//! Read-only inspection of a store's contents.

use kvsync_store::{KvResult, RemoteKv, StorageArea, StorageItems};
use serde::Serialize;
use std::fmt;

/// A snapshot of every entry in a store.
///
/// Displays as a header line followed by one tab-indented
/// `key: json` line per entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageDump {
    /// Area the entries were read from.
    pub area: StorageArea,
    /// All entries, ordered by key.
    pub items: StorageItems,
}

impl StorageDump {
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the store was empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for StorageDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Storage {} contents:", self.area)?;
        if self.items.is_empty() {
            return writeln!(f, "No items found in storage.");
        }
        for (key, value) in &self.items {
            writeln!(f, "\t{}: {}", key, value)?;
        }
        Ok(())
    }
}

/// Reads every entry of `kv`.
///
/// # Errors
///
/// Returns the store's error if the read fails.
pub async fn dump_storage(kv: &dyn RemoteKv) -> KvResult<StorageDump> {
    let items = kv.get_all().await?;
    Ok(StorageDump {
        area: kv.area(),
        items,
    })
}

/// Prints every entry of `kv` to stdout.
///
/// Failures are logged, not returned.
pub async fn print_storage(kv: &dyn RemoteKv) {
    match dump_storage(kv).await {
        Ok(dump) => print!("{}", dump),
        Err(e) => tracing::error!(area = %kv.area(), error = %e, "failed to read storage contents"),
    }
}

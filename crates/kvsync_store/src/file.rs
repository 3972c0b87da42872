//! JSON-file store for local persistence.

use crate::backend::RemoteKv;
use crate::error::{KvError, KvResult};
use crate::listeners::{ChangeListener, ListenerId, ListenerSet};
use crate::types::{StorageArea, StorageChange, StorageChanges, StorageItems};
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A store persisted as one JSON object in a file.
///
/// Entries are cached in memory; every write rewrites the whole file
/// through a temporary file and a rename, so a crash never leaves a
/// half-written object behind. Writes are serialized.
///
/// Listeners fire for writes made through this handle (or its clones)
/// and for differences picked up by [`FileKv::reload`].
///
/// # Example
///
/// ```no_run
/// use kvsync_store::FileKv;
/// use std::path::Path;
///
/// let kv = FileKv::open(Path::new("settings.json")).unwrap();
/// println!("{} entries", kv.len());
/// ```
#[derive(Debug, Clone)]
pub struct FileKv {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    area: StorageArea,
    cache: RwLock<StorageItems>,
    write_lock: Mutex<()>,
    listeners: ListenerSet,
}

impl FileKv {
    /// Opens the store at `path` in the `local` area.
    ///
    /// A missing file yields an empty store; the file is created on the
    /// first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a
    /// JSON object.
    pub fn open(path: &Path) -> KvResult<Self> {
        Self::open_in_area(path, StorageArea::Local)
    }

    /// Opens the store at `path`, reporting changes under `area`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a
    /// JSON object.
    pub fn open_in_area(path: &Path, area: StorageArea) -> KvResult<Self> {
        let items = read_items(path)?;
        Ok(Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                area,
                cache: RwLock::new(items),
                write_lock: Mutex::new(()),
                listeners: ListenerSet::new(),
            }),
        })
    }

    /// Opens the store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be read.
    pub fn open_with_create_dirs(path: &Path) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.cache.read().len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.cache.read().is_empty()
    }

    /// Re-reads the file and reports every difference to listeners.
    ///
    /// Picks up writes made by other processes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is corrupted.
    pub async fn reload(&self) -> KvResult<()> {
        let _guard = self.inner.write_lock.lock().await;
        let fresh = read_items(&self.inner.path)?;

        let changes = {
            let mut cache = self.inner.cache.write();
            let mut changes = StorageChanges::new();
            for (key, old) in cache.iter() {
                if !fresh.contains_key(key) {
                    changes.insert(key.clone(), StorageChange::removed(old.clone()));
                }
            }
            for (key, value) in &fresh {
                let old = cache.get(key);
                if old != Some(value) {
                    changes.insert(key.clone(), StorageChange::written(old.cloned(), value.clone()));
                }
            }
            *cache = fresh;
            changes
        };

        self.inner.listeners.emit(&changes, self.inner.area);
        Ok(())
    }

    async fn write_with(
        inner: Arc<Inner>,
        mutate: impl FnOnce(&mut StorageItems) -> StorageChanges,
    ) -> KvResult<()> {
        let _guard = inner.write_lock.lock().await;

        let mut next = inner.cache.read().clone();
        let changes = mutate(&mut next);
        if changes.is_empty() {
            return Ok(());
        }

        persist(&inner.path, &next).await?;
        *inner.cache.write() = next;

        tracing::trace!(path = %inner.path.display(), keys = changes.len(), "store file written");
        inner.listeners.emit(&changes, inner.area);
        Ok(())
    }
}

impl RemoteKv for FileKv {
    fn area(&self) -> StorageArea {
        self.inner.area
    }

    fn get(&self, key: &str) -> BoxFuture<'static, KvResult<StorageItems>> {
        let items = self
            .inner
            .cache
            .read()
            .get_key_value(key)
            .map(|(k, v)| StorageItems::from([(k.clone(), v.clone())]))
            .unwrap_or_default();
        future::ready(Ok(items)).boxed()
    }

    fn get_all(&self) -> BoxFuture<'static, KvResult<StorageItems>> {
        future::ready(Ok(self.inner.cache.read().clone())).boxed()
    }

    fn set(&self, items: StorageItems) -> BoxFuture<'static, KvResult<()>> {
        let inner = Arc::clone(&self.inner);
        Self::write_with(inner, move |data| {
            let mut changes = StorageChanges::new();
            for (key, value) in items {
                let old = data.insert(key.clone(), value.clone());
                if old.as_ref() != Some(&value) {
                    changes.insert(key, StorageChange::written(old, value));
                }
            }
            changes
        })
        .boxed()
    }

    fn remove(&self, keys: Vec<String>) -> BoxFuture<'static, KvResult<()>> {
        let inner = Arc::clone(&self.inner);
        Self::write_with(inner, move |data| {
            keys.into_iter()
                .filter_map(|key| {
                    data.remove(&key)
                        .map(|old| (key, StorageChange::removed(old)))
                })
                .collect()
        })
        .boxed()
    }

    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }
}

fn read_items(path: &Path) -> KvResult<StorageItems> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StorageItems::new()),
        Err(e) => return Err(e.into()),
    };

    if text.trim().is_empty() {
        return Ok(StorageItems::new());
    }

    let value: Value = serde_json::from_str(&text)
        .map_err(|e| KvError::Corrupted(format!("{}: {}", path.display(), e)))?;

    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(KvError::Corrupted(format!(
            "{}: expected a JSON object, found {}",
            path.display(),
            json_kind(&other)
        ))),
    }
}

async fn persist(path: &Path, items: &StorageItems) -> KvResult<()> {
    let bytes = serde_json::to_vec_pretty(items)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

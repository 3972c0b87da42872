//! # kvsync Store
//!
//! Remote key/value store abstraction and backends for kvsync.
//!
//! This crate models the external storage side of a synchronized cell:
//! a JSON-valued key/value store with asynchronous reads and writes and
//! change listeners that fire for every write, whatever its origin.
//!
//! ## Design Principles
//!
//! - Values are `serde_json::Value`; the store never interprets them
//! - Reads and writes return `'static` boxed futures
//! - Listeners are invoked synchronously inside the write path,
//!   before the write's future resolves
//! - Backends must be `Send + Sync` so they can be shared across tasks
//!
//! ## Available Backends
//!
//! - [`MemoryKv`] - In-memory store; clones share state
//! - [`FileKv`] - JSON object persisted to a single file
//!
//! ## Example
//!
//! ```rust
//! use kvsync_store::{MemoryKv, RemoteKv, StorageItems};
//! use serde_json::json;
//!
//! futures::executor::block_on(async {
//!     let kv = MemoryKv::new();
//!     let mut items = StorageItems::new();
//!     items.insert("theme".into(), json!("dark"));
//!     kv.set(items).await.unwrap();
//!
//!     let read = kv.get("theme").await.unwrap();
//!     assert_eq!(read.get("theme"), Some(&json!("dark")));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod listeners;
mod memory;
mod types;

pub use backend::RemoteKv;
pub use error::{KvError, KvResult};
pub use file::FileKv;
pub use listeners::{ChangeListener, ListenerId, ListenerSet};
pub use memory::MemoryKv;
pub use types::{StorageArea, StorageChange, StorageChanges, StorageItems};

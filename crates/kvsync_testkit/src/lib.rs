//! # kvsync Testkit
//!
//! Test utilities for kvsync.
//!
//! This crate provides:
//! - [`ScriptedKv`], a store with fault injection, held writes and a write log
//! - Fixtures for file-backed stores and for driving spawned relays
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kvsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn write_is_relayed() {
//!     let kv = ScriptedKv::new();
//!     let cell = create_synced(kv.shared(), "theme", "light".to_string(), true).unwrap();
//!     settle().await;
//!     assert_eq!(kv.value("theme"), Some(json!("light")));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scripted;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scripted::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scripted::*;

//! # kvsync Core
//!
//! Keeps a reactive in-memory value and one key of a remote key/value
//! store in step, in both directions, without feedback loops.
//!
//! This crate provides:
//! - [`ReactiveCell`], a writable value with synchronous subscribers
//! - [`SyncedCell`], the guard binding a cell to a [`kvsync_store::RemoteKv`] key
//! - [`SyncConfig`] for per-cell settings
//! - [`dump_storage`] / [`print_storage`] for inspecting a store
//!
//! ## Model
//!
//! Local changes are written to the store; remote changes (from this or
//! any other writer) are applied to the cell. Each direction suppresses
//! the echo it would otherwise cause in the other:
//!
//! 1. An inbound relay marks the guard `ApplyingRemote` before setting the
//!    cell, so the synchronous cell notification is not written back
//! 2. An outbound relay marks the guard `ApplyingLocal` until the store
//!    acknowledges the write, so the store's notification of that write is
//!    not applied back
//!
//! ## Key Invariants
//!
//! - At most one relay direction is active at a time
//! - An inbound relay never produces an outbound write
//! - The outbound state is cleared on success, failure and timeout
//! - Relay failures are logged, never returned

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cell;
mod config;
mod diagnostics;
mod error;
mod guard;

pub use cell::{ReactiveCell, Subscription};
pub use config::{RemoteSubscription, SyncConfig};
pub use diagnostics::{dump_storage, print_storage, StorageDump};
pub use error::{SyncError, SyncResult};
pub use guard::{create_synced, GuardStatus, RelayState, SyncValue, SyncedCell};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

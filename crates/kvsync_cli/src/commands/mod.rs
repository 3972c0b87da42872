//! CLI command implementations.

pub mod dump;
pub mod get;
pub mod remove;
pub mod set;

use kvsync_store::FileKv;
use std::path::Path;

/// Opens an existing store file.
fn open_existing(path: &Path) -> Result<FileKv, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {:?}", path).into());
    }
    Ok(FileKv::open(path)?)
}

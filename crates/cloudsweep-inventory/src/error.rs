//! Inventory error types

use crate::resource::ResourceKey;
use thiserror::Error;

/// Inventory store errors
#[derive(Error, Debug)]
pub enum InventoryError {
    /// A provider client handed back data for the wrong partition. This is a
    /// client bug and must never be silently dropped or retried.
    #[error("Reconciliation contract violation: {0}")]
    Contract(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceKey),

    #[error("Snapshot version {found} is newer than supported version {supported}")]
    SnapshotVersion { found: u32, supported: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InventoryError>;

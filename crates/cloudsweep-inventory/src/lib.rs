//! Persisted resource inventory for cloudsweep
//!
//! Tracks every resource the providers have reported, carries each one
//! through its lifecycle, and merges fresh listings in via the
//! reconciliation pass.

pub mod error;
pub mod resource;
pub mod store;

// Re-exports
pub use error::{InventoryError, Result};
pub use resource::{LifecycleState, Resource, ResourceKey};
pub use store::{InventorySnapshot, InventoryStore, ReconcileSummary};

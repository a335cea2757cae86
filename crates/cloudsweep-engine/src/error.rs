//! Error types for the run engine

use cloudsweep_cloud::{CloudError, ProviderKind};
use cloudsweep_inventory::InventoryError;
use cloudsweep_retention::RetentionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A configured or stored resource names a provider with no registered
    /// client. This is a wiring bug, not an operational failure.
    #[error("No {kind} client registered for namespace '{namespace}'")]
    UnregisteredProvider {
        namespace: String,
        kind: ProviderKind,
    },

    /// A refresh run was triggered while one is still in progress
    #[error("A refresh run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Retention(#[from] RetentionError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

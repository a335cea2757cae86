//! Run engine for cloudsweep
//!
//! Ties the other crates together: provider clients come out of the
//! [`ProviderRegistry`], listings are reconciled into the inventory,
//! expired resources and stale build artifacts are swept, and operators
//! hear about leftovers, clusters and failures through the [`Notifier`].
//! The [`Engine`] exposes one entry point per pass; the daemon schedules
//! them.

pub mod engine;
pub mod error;
pub mod notify;
pub mod registry;
pub mod status;

#[cfg(test)]
mod test_support;

// Re-exports
pub use engine::{CleanupReport, ClusterReport, CredentialCheck, Engine, RunReport};
pub use error::{EngineError, Result};
pub use notify::{
    Notifier, NotifyError, NotifyTransport, render_cluster_report, render_resource_table,
};
pub use registry::ProviderRegistry;
pub use status::{RunStatus, RunToken};

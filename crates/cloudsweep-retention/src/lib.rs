//! Build artifact retention for cloudsweep
//!
//! Test runs leave images, disks and diagnostic containers behind in every
//! provider account. This crate decides which of them to keep: artifact
//! names are parsed into flavor and build identity, builds are ranked per
//! flavor, and the newest few survive. Deletion happens through the
//! provider client, one cleanup pass per provider.

pub mod cleanup;
pub mod error;
pub mod parser;
pub mod planner;

// Re-exports
pub use cleanup::{CleanupOutcome, CleanupPass};
pub use error::{RetentionError, Result};
pub use parser::{BuildId, NameParser, ParsedName};
pub use planner::{RetentionPlan, RetentionPolicy, container_expired, plan};

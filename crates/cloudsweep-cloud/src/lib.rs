//! Provider capability layer for cloudsweep
//!
//! Everything that talks to a cloud provider goes through the
//! [`CloudProvider`] trait defined here: listing resources and build
//! artifacts, requesting deletions, attachment and credential checks. The
//! crate also carries the transient data those calls exchange (observed
//! resources, artifacts, tag overrides) plus the bounded retry policy and the
//! deduplicated failure digest the engine wraps provider calls with.

pub mod artifact;
pub mod digest;
pub mod error;
#[cfg(feature = "test-utils")]
pub mod fake;
pub mod provider;
pub mod resource;
pub mod retry;

// Re-exports
pub use artifact::{ArtifactKind, BuildArtifact};
pub use digest::FailureDigest;
pub use error::{CloudError, Result};
#[cfg(feature = "test-utils")]
pub use fake::FakeClient;
pub use provider::{CloudProvider, ProviderKind};
pub use resource::{CREATED_BY_TAG, IGNORE_TAG, ObservedResource, TTL_TAG, TagMap};
pub use retry::{RetryError, RetryPolicy};

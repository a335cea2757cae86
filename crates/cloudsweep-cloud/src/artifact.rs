//! Build artifacts left behind by image builds and test runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of build artifacts a provider may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Bootable machine image (storage blob or registered image)
    Image,
    /// Standalone disk created from an image
    Disk,
    /// Diagnostic container holding boot logs for one resource
    DiagnosticContainer,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Image => write!(f, "image"),
            ArtifactKind::Disk => write!(f, "disk"),
            ArtifactKind::DiagnosticContainer => write!(f, "diagnostic_container"),
        }
    }
}

/// A build artifact as reported by a provider listing.
///
/// Never persisted: recomputed fresh for every retention pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// Provider-specific artifact name
    pub name: String,

    /// Last modification time, when the provider reports one
    pub last_modified: Option<DateTime<Utc>>,
}

impl BuildArtifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

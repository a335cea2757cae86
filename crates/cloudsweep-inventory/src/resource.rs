//! Persisted resource records and their lifecycle

use chrono::{DateTime, Utc};
use cloudsweep_cloud::{CREATED_BY_TAG, ObservedResource, ProviderKind, TagMap};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local lifecycle of a tracked resource.
///
/// `Active → Deleting → Deleted`, with one backwards edge: a `Deleted`
/// resource the provider reports again is resurrected to `Active`. `Deleting`
/// is sticky across refresh passes because a delete request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Deleting,
    Deleted,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Deleting => write!(f, "deleting"),
            LifecycleState::Deleted => write!(f, "deleted"),
        }
    }
}

/// Identity of a tracked resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub provider: ProviderKind,
    pub namespace: String,
    pub instance_id: String,
}

impl ResourceKey {
    pub fn new(
        provider: ProviderKind,
        namespace: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            namespace: namespace.into(),
            instance_id: instance_id.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.namespace, self.instance_id)
    }
}

/// A tracked cloud resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Provider the resource lives on
    pub provider: ProviderKind,

    /// Namespace whose credentials see the resource
    pub namespace: String,

    /// Provider-specific resource ID
    pub instance_id: String,

    /// Region (or zone/location)
    pub region: String,

    /// Local lifecycle state
    pub state: LifecycleState,

    /// Seen in the most recent refresh pass of its partition
    pub active: bool,

    /// When the resource was created, per the provider (or first observed)
    pub first_seen: DateTime<Utc>,

    /// When the resource was last observed
    pub last_seen: DateTime<Utc>,

    /// TTL before automatic deletion; zero means no TTL policy
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Exempt from automatic deletion, driven by the ignore tag
    pub ignore: bool,

    /// Already part of a leftover digest
    pub notified: bool,

    /// Provider tags as of the last sighting
    pub tags: TagMap,

    /// Opaque snapshot of the provider's last-seen representation
    pub csp_info: serde_json::Value,
}

impl Resource {
    /// Build a fresh record for a resource observed for the first time.
    pub fn from_observed(
        observed: &ObservedResource,
        default_ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            provider: observed.provider,
            namespace: observed.namespace.clone(),
            instance_id: observed.instance_id.clone(),
            region: observed.region.clone(),
            state: LifecycleState::Active,
            active: true,
            first_seen: observed.created_at.unwrap_or(now),
            last_seen: now,
            ttl: observed.ttl(default_ttl),
            ignore: observed.ignored(),
            notified: false,
            tags: observed.tags.clone(),
            csp_info: observed.csp_info.clone(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.provider, &self.namespace, &self.instance_id)
    }

    /// Time between first and last sighting.
    pub fn age(&self) -> chrono::Duration {
        self.last_seen - self.first_seen
    }

    /// Who created the resource, when tagged.
    pub fn created_by(&self) -> Option<&str> {
        self.tags.get(CREATED_BY_TAG)
    }

    /// TTL expiry predicate: active state, a TTL policy set, age at or over
    /// it, and not opted out. A zero TTL means "no policy", never "expire
    /// immediately".
    pub fn expired(&self) -> bool {
        if self.state != LifecycleState::Active || self.ignore || self.ttl.is_zero() {
            return false;
        }
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => self.age() >= ttl,
            // a TTL beyond representable time never expires
            Err(_) => false,
        }
    }

    /// Leftover predicate: still present on the provider, not opted out, and
    /// older than the notification threshold.
    pub fn leftover(&self, threshold: chrono::Duration) -> bool {
        self.active && !self.ignore && self.age() > threshold
    }

    /// Age in whole hours and minutes, for operator-facing tables.
    pub fn age_formatted(&self) -> String {
        let total_minutes = self.age().num_minutes().max(0);
        format!("{}h{:02}m", total_minutes / 60, total_minutes % 60)
    }
}

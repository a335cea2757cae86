//! Observed resources and provider tag handling

use crate::provider::ProviderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Tag overriding the configured default TTL, value in integer seconds.
pub const TTL_TAG: &str = "cloudsweep_ttl";

/// Tag exempting a resource from automatic deletion.
pub const IGNORE_TAG: &str = "cloudsweep_ignore";

/// Tag naming the job or person that created a resource.
pub const CREATED_BY_TAG: &str = "cloudsweep_created_by";

/// Provider tags with typed override accessors.
///
/// Providers hand back tags as free-form string pairs. The overrides honored
/// by the engine are read through these accessors with explicit fallback
/// semantics instead of ad-hoc map probing at the call sites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMap(BTreeMap<String, String>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Duration override stored as integer seconds. Falls back when the tag
    /// is absent or does not parse.
    pub fn duration_or(&self, key: &str, fallback: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(fallback)
    }

    /// Boolean flag: the tag is present with a non-empty value.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A resource as currently reported by a provider listing.
///
/// Transient: produced fresh on every refresh pass and merged into the
/// persisted inventory by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedResource {
    /// Provider that reported the resource
    pub provider: ProviderKind,

    /// Namespace whose credentials produced the listing
    pub namespace: String,

    /// Provider-specific resource ID
    pub instance_id: String,

    /// Region (or zone/location) the resource lives in
    pub region: String,

    /// Creation time as reported by the provider, when known
    pub created_at: Option<DateTime<Utc>>,

    /// Provider tags
    pub tags: TagMap,

    /// Opaque snapshot of the provider's own representation
    pub csp_info: serde_json::Value,
}

impl ObservedResource {
    pub fn new(
        provider: ProviderKind,
        namespace: impl Into<String>,
        instance_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            namespace: namespace.into(),
            instance_id: instance_id.into(),
            region: region.into(),
            created_at: None,
            tags: TagMap::new(),
            csp_info: serde_json::Value::Null,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_tags(mut self, tags: TagMap) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_csp_info(mut self, csp_info: serde_json::Value) -> Self {
        self.csp_info = csp_info;
        self
    }

    /// TTL for this resource: its own override tag, else the given default.
    pub fn ttl(&self, default_ttl: Duration) -> Duration {
        self.tags.duration_or(TTL_TAG, default_ttl)
    }

    /// Whether the resource opted out of automatic deletion.
    pub fn ignored(&self) -> bool {
        self.tags.flag(IGNORE_TAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_override_tag() {
        let tags: TagMap = [(TTL_TAG, "7200")].into_iter().collect();
        let r = ObservedResource::new(ProviderKind::Ec2, "ns1", "i-1", "eu-west-1")
            .with_tags(tags);

        assert_eq!(r.ttl(Duration::from_secs(60)), Duration::from_secs(7200));
    }

    #[test]
    fn test_ttl_fallback_when_tag_missing_or_garbage() {
        let r = ObservedResource::new(ProviderKind::Ec2, "ns1", "i-1", "eu-west-1");
        assert_eq!(r.ttl(Duration::from_secs(60)), Duration::from_secs(60));

        let tags: TagMap = [(TTL_TAG, "soon")].into_iter().collect();
        let r = r.with_tags(tags);
        assert_eq!(r.ttl(Duration::from_secs(60)), Duration::from_secs(60));
    }

    #[test]
    fn test_ignore_flag_requires_non_empty_value() {
        let tags: TagMap = [(IGNORE_TAG, "1")].into_iter().collect();
        assert!(tags.flag(IGNORE_TAG));

        let tags: TagMap = [(IGNORE_TAG, "")].into_iter().collect();
        assert!(!tags.flag(IGNORE_TAG));

        assert!(!TagMap::new().flag(IGNORE_TAG));
    }
}

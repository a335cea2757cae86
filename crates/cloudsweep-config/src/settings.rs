//! Configuration model
//!
//! One TOML file describes everything: where the inventory snapshot lives,
//! how often the passes run, who gets notified and which namespaces are
//! watched on which providers. Every field has a default so a minimal file
//! only needs its `[namespaces.*]` tables.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cloudsweep_cloud::ProviderKind;
use cloudsweep_retention::RetentionPolicy;

fn default_state_file() -> PathBuf {
    PathBuf::from("/var/lib/cloudsweep/state.json")
}

fn default_refresh() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_cleanup() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_clusters() -> Duration {
    Duration::from_secs(18 * 60 * 60)
}

fn default_age_threshold() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

fn default_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_providers() -> Vec<ProviderKind> {
    vec![ProviderKind::Ec2, ProviderKind::Azure, ProviderKind::Gce]
}

/// The passes a namespace takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    /// Reconciling live listings into the inventory, TTL sweep included
    Refresh,
    /// Build artifact retention
    Cleanup,
    /// Cluster usage reporting
    Clusters,
    /// Operator mail for leftovers and failures
    Notify,
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activity::Refresh => write!(f, "refresh"),
            Activity::Cleanup => write!(f, "cleanup"),
            Activity::Clusters => write!(f, "clusters"),
            Activity::Notify => write!(f, "notify"),
        }
    }
}

/// Pass intervals for the daemon scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    #[serde(with = "humantime_serde")]
    pub refresh: Duration,
    #[serde(with = "humantime_serde")]
    pub cleanup: Duration,
    #[serde(with = "humantime_serde")]
    pub clusters: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            cleanup: default_cleanup(),
            clusters: default_clusters(),
        }
    }
}

/// Leftover report settings. Absent section disables notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Resources older than this show up in the leftover report
    #[serde(with = "humantime_serde", default = "default_age_threshold")]
    pub age_threshold: Duration,
    /// Sender identity stamped onto every report
    pub from: String,
    /// Global recipient list
    #[serde(default)]
    pub to: Vec<String>,
}

/// Fallbacks shared by all namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub providers: Vec<ProviderKind>,
    /// TTL applied to resources whose listing carries no TTL tag
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            ttl: default_ttl(),
        }
    }
}

/// Per-namespace overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Providers watched for this namespace, empty means the default set
    pub providers: Vec<ProviderKind>,
    /// Passes this namespace takes part in, empty means all of them
    pub activities: Vec<Activity>,
    #[serde(with = "humantime_serde")]
    pub default_ttl: Option<Duration>,
    /// Extra recipients on top of the global ones
    pub notify_to: Vec<String>,
    pub retention: RetentionPolicy,
}

impl NamespaceConfig {
    pub fn runs(&self, activity: Activity) -> bool {
        self.activities.is_empty() || self.activities.contains(&activity)
    }
}

/// The whole cloudsweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Inventory snapshot location
    pub state_file: PathBuf,
    pub schedule: ScheduleConfig,
    pub notify: Option<NotifyConfig>,
    pub defaults: DefaultsConfig,
    pub namespaces: BTreeMap<String, NamespaceConfig>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            schedule: ScheduleConfig::default(),
            notify: None,
            defaults: DefaultsConfig::default(),
            namespaces: BTreeMap::new(),
        }
    }
}

impl SweepConfig {
    /// Namespaces taking part in `activity`, in stable order.
    pub fn namespaces_for(&self, activity: Activity) -> Vec<&str> {
        self.namespaces
            .iter()
            .filter(|(_, ns)| ns.runs(activity))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The providers watched for `namespace`.
    pub fn providers_for(&self, namespace: &str) -> &[ProviderKind] {
        match self.namespaces.get(namespace) {
            Some(ns) if !ns.providers.is_empty() => &ns.providers,
            _ => &self.defaults.providers,
        }
    }

    pub fn ttl_for(&self, namespace: &str) -> Duration {
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.default_ttl)
            .unwrap_or(self.defaults.ttl)
    }

    pub fn retention_for(&self, namespace: &str) -> RetentionPolicy {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.retention)
            .unwrap_or_default()
    }

    /// Global recipients plus the namespace's own, deduplicated in order.
    /// Empty when the namespace does not take part in the notify activity.
    pub fn recipients(&self, namespace: &str) -> Vec<String> {
        let Some(ns) = self.namespaces.get(namespace) else {
            return Vec::new();
        };
        if !ns.runs(Activity::Notify) {
            return Vec::new();
        }
        let mut seen = Vec::new();
        let global = self.notify.iter().flat_map(|n| n.to.iter());
        for recipient in global.chain(ns.notify_to.iter()) {
            if !seen.contains(recipient) {
                seen.push(recipient.clone());
            }
        }
        seen
    }

    /// Consistency checks that serde cannot express.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::ConfigError;

        for (name, ns) in &self.namespaces {
            if ns.providers.is_empty() && self.defaults.providers.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "namespace '{name}' has no providers and no defaults to fall back on"
                )));
            }
            if ns.retention.max_per_flavor == 0 {
                return Err(ConfigError::Invalid(format!(
                    "namespace '{name}': retention.max_per_flavor must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

//! Inventory store and the reconciliation pass
//!
//! The store owns every tracked resource record, keyed by
//! `(provider, namespace, instance_id)`, and persists them as a versioned
//! JSON snapshot with a `.backup` of the previous version. A reconciliation
//! pass merges one provider listing into one (provider, namespace) partition
//! as a single all-or-nothing commit: the pass is staged on a scratch copy,
//! written to disk, and only then swapped into the shared view.

use crate::error::{InventoryError, Result};
use crate::resource::{LifecycleState, Resource, ResourceKey};
use chrono::{DateTime, Utc};
use cloudsweep_cloud::{ObservedResource, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;

const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the whole inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// Snapshot format version
    pub version: u32,

    /// When the snapshot was written
    pub updated_at: DateTime<Utc>,

    /// All tracked resources
    pub resources: Vec<Resource>,
}

/// Counts of what one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Resources observed for the first time
    pub created: usize,

    /// Known resources refreshed in place
    pub updated: usize,

    /// Deleted resources the provider reported again
    pub resurrected: usize,

    /// Resources gone from the provider, transitioned to deleted
    pub removed: usize,
}

/// The inventory of tracked resources.
pub struct InventoryStore {
    resources: RwLock<BTreeMap<ResourceKey, Resource>>,
    path: Option<PathBuf>,
}

impl InventoryStore {
    /// In-memory store without persistence.
    pub fn in_memory() -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Store backed by a JSON snapshot at `path`, loaded when present.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut resources = BTreeMap::new();

        if path.exists() {
            let content = fs::read_to_string(&path).await?;
            let snapshot: InventorySnapshot = serde_json::from_str(&content)?;
            if snapshot.version > SNAPSHOT_VERSION {
                return Err(InventoryError::SnapshotVersion {
                    found: snapshot.version,
                    supported: SNAPSHOT_VERSION,
                });
            }
            for resource in snapshot.resources {
                resources.insert(resource.key(), resource);
            }
            tracing::debug!(
                resources = resources.len(),
                path = %path.display(),
                "Loaded inventory snapshot"
            );
        } else {
            tracing::debug!(path = %path.display(), "No inventory snapshot, starting empty");
        }

        Ok(Self {
            resources: RwLock::new(resources),
            path: Some(path),
        })
    }

    /// Merge one provider listing into its (provider, namespace) partition.
    ///
    /// Every stored resource of the partition starts the pass marked stale;
    /// observed resources are refreshed or created and reactivated; whatever
    /// stays stale no longer exists on the provider and becomes deleted. An
    /// observed resource belonging to a different partition than the call
    /// names is a provider-client bug and fails the whole pass.
    pub async fn reconcile(
        &self,
        provider: ProviderKind,
        namespace: &str,
        observed: &[ObservedResource],
        default_ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ReconcileSummary> {
        for o in observed {
            if o.provider != provider || o.namespace != namespace {
                return Err(InventoryError::Contract(format!(
                    "observed resource {} belongs to {}:{}, not {}:{}",
                    o.instance_id, o.provider, o.namespace, provider, namespace
                )));
            }
        }

        let mut resources = self.resources.write().await;
        let mut staged = resources.clone();
        let mut summary = ReconcileSummary::default();

        for entry in staged.values_mut() {
            if entry.provider == provider && entry.namespace == namespace {
                entry.active = false;
            }
        }

        for o in observed {
            let key = ResourceKey::new(provider, namespace, &o.instance_id);
            match staged.get_mut(&key) {
                Some(entry) => {
                    if entry.region != o.region {
                        tracing::info!(
                            namespace,
                            provider = %provider,
                            instance_id = %o.instance_id,
                            from = %entry.region,
                            to = %o.region,
                            "Resource changed region"
                        );
                        entry.region = o.region.clone();
                    }
                    match entry.state {
                        LifecycleState::Deleted => {
                            // same identity, new lifetime
                            tracing::info!(
                                namespace,
                                provider = %provider,
                                instance_id = %o.instance_id,
                                "Deleted resource reported again, resurrecting"
                            );
                            entry.first_seen = o.created_at.unwrap_or(now);
                            entry.state = LifecycleState::Active;
                            summary.resurrected += 1;
                        }
                        // a delete is in flight, the state must not move back
                        LifecycleState::Deleting => summary.updated += 1,
                        LifecycleState::Active => summary.updated += 1,
                    }
                    entry.tags = o.tags.clone();
                    entry.ignore = o.ignored();
                    entry.csp_info = o.csp_info.clone();
                    entry.last_seen = now;
                    entry.active = true;
                }
                None => {
                    tracing::debug!(
                        namespace,
                        provider = %provider,
                        instance_id = %o.instance_id,
                        "Tracking new resource"
                    );
                    staged.insert(key, Resource::from_observed(o, default_ttl, now));
                    summary.created += 1;
                }
            }
        }

        for entry in staged.values_mut() {
            if entry.provider == provider
                && entry.namespace == namespace
                && !entry.active
                && entry.state != LifecycleState::Deleted
            {
                tracing::info!(
                    namespace,
                    provider = %provider,
                    instance_id = %entry.instance_id,
                    "Resource gone from provider"
                );
                entry.state = LifecycleState::Deleted;
                summary.removed += 1;
            }
        }

        self.persist(&staged).await?;
        *resources = staged;
        Ok(summary)
    }

    pub async fn get(&self, key: &ResourceKey) -> Option<Resource> {
        self.resources.read().await.get(key).cloned()
    }

    pub async fn all(&self) -> Vec<Resource> {
        self.resources.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }

    /// Resources eligible for TTL expiry in one namespace.
    pub async fn expired(&self, namespace: &str) -> Vec<Resource> {
        self.resources
            .read()
            .await
            .values()
            .filter(|r| r.namespace == namespace && r.expired())
            .cloned()
            .collect()
    }

    /// Active, non-ignored resources older than `threshold`, across all
    /// namespaces.
    pub async fn leftovers(&self, threshold: chrono::Duration) -> Vec<Resource> {
        self.resources
            .read()
            .await
            .values()
            .filter(|r| r.leftover(threshold))
            .cloned()
            .collect()
    }

    /// Record that a delete request for this resource was accepted.
    pub async fn mark_deleting(&self, key: &ResourceKey) -> Result<()> {
        let mut resources = self.resources.write().await;
        let mut staged = resources.clone();
        match staged.get_mut(key) {
            Some(entry) => entry.state = LifecycleState::Deleting,
            None => return Err(InventoryError::UnknownResource(key.clone())),
        }
        self.persist(&staged).await?;
        *resources = staged;
        Ok(())
    }

    /// Flag resources as covered by a leftover digest. Keys no longer in the
    /// store are skipped.
    pub async fn mark_notified(&self, keys: &[ResourceKey]) -> Result<()> {
        let mut resources = self.resources.write().await;
        let mut staged = resources.clone();
        for key in keys {
            if let Some(entry) = staged.get_mut(key) {
                entry.notified = true;
            }
        }
        self.persist(&staged).await?;
        *resources = staged;
        Ok(())
    }

    async fn persist(&self, resources: &BTreeMap<ResourceKey, Resource>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            fs::create_dir_all(dir).await?;
        }

        let snapshot = InventorySnapshot {
            version: SNAPSHOT_VERSION,
            updated_at: Utc::now(),
            resources: resources.values().cloned().collect(),
        };

        // Keep the previous snapshot as .backup before writing the new one.
        let backup = backup_path(path);
        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, content).await?;

        tracing::debug!(
            resources = snapshot.resources.len(),
            "Saved inventory snapshot"
        );
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

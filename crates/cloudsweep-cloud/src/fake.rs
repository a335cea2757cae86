//! Scriptable in-memory provider client for tests

use crate::artifact::{ArtifactKind, BuildArtifact};
use crate::error::{CloudError, Result};
use crate::provider::{CloudProvider, ProviderKind};
use crate::resource::ObservedResource;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// In-memory [`CloudProvider`] with scriptable listings and failures.
///
/// Listings are served from whatever the test loaded; deletions are recorded
/// instead of performed. Failure counters make the next N calls of an
/// operation fail, which is how the retry paths are exercised.
pub struct FakeClient {
    kind: ProviderKind,
    resources: Mutex<Vec<ObservedResource>>,
    artifacts: Mutex<BTreeMap<ArtifactKind, Vec<BuildArtifact>>>,
    container_items: Mutex<BTreeMap<String, Vec<BuildArtifact>>>,
    attached: Mutex<BTreeSet<String>>,
    clusters: Mutex<BTreeMap<String, Vec<String>>>,
    failing_deletes: Mutex<BTreeSet<String>>,
    list_failures: AtomicU32,
    credential_failures: AtomicU32,
    list_calls: AtomicU32,
    credential_calls: AtomicU32,
    deleted_resources: Mutex<Vec<(String, String)>>,
    deleted_artifacts: Mutex<Vec<(ArtifactKind, String)>>,
}

impl FakeClient {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            resources: Mutex::new(Vec::new()),
            artifacts: Mutex::new(BTreeMap::new()),
            container_items: Mutex::new(BTreeMap::new()),
            attached: Mutex::new(BTreeSet::new()),
            clusters: Mutex::new(BTreeMap::new()),
            failing_deletes: Mutex::new(BTreeSet::new()),
            list_failures: AtomicU32::new(0),
            credential_failures: AtomicU32::new(0),
            list_calls: AtomicU32::new(0),
            credential_calls: AtomicU32::new(0),
            deleted_resources: Mutex::new(Vec::new()),
            deleted_artifacts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_resource(&self, resource: ObservedResource) {
        self.resources.lock().unwrap().push(resource);
    }

    /// Replace the listing wholesale, e.g. to make resources disappear
    /// between refresh passes.
    pub fn set_resources(&self, resources: Vec<ObservedResource>) {
        *self.resources.lock().unwrap() = resources;
    }

    pub fn set_artifacts(&self, kind: ArtifactKind, artifacts: Vec<BuildArtifact>) {
        self.artifacts.lock().unwrap().insert(kind, artifacts);
    }

    pub fn set_container_items(&self, container: impl Into<String>, items: Vec<BuildArtifact>) {
        self.container_items
            .lock()
            .unwrap()
            .insert(container.into(), items);
    }

    pub fn set_attached(&self, name: impl Into<String>) {
        self.attached.lock().unwrap().insert(name.into());
    }

    pub fn set_clusters(&self, clusters: BTreeMap<String, Vec<String>>) {
        *self.clusters.lock().unwrap() = clusters;
    }

    /// Make the next `n` `list_resources` calls fail.
    pub fn fail_next_lists(&self, n: u32) {
        self.list_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` `check_credentials` calls fail.
    pub fn fail_next_credential_checks(&self, n: u32) {
        self.credential_failures.store(n, Ordering::SeqCst);
    }

    /// Make every delete of this resource id or artifact name fail.
    pub fn fail_delete_of(&self, name: impl Into<String>) {
        self.failing_deletes.lock().unwrap().insert(name.into());
    }

    pub fn list_call_count(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn credential_check_count(&self) -> u32 {
        self.credential_calls.load(Ordering::SeqCst)
    }

    /// Recorded `delete_resource` calls as `(region, instance_id)` pairs.
    pub fn deleted_resources(&self) -> Vec<(String, String)> {
        self.deleted_resources.lock().unwrap().clone()
    }

    /// Recorded `delete_artifact` calls as `(kind, name)` pairs.
    pub fn deleted_artifacts(&self) -> Vec<(ArtifactKind, String)> {
        self.deleted_artifacts.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CloudProvider for FakeClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn list_resources(&self, namespace: &str) -> Result<Vec<ObservedResource>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.list_failures) {
            return Err(CloudError::ApiError("listing unavailable".into()));
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn delete_resource(&self, region: &str, instance_id: &str) -> Result<()> {
        if self.failing_deletes.lock().unwrap().contains(instance_id) {
            return Err(CloudError::ApiError(format!(
                "delete of {} rejected",
                instance_id
            )));
        }
        self.deleted_resources
            .lock()
            .unwrap()
            .push((region.to_string(), instance_id.to_string()));
        Ok(())
    }

    async fn list_artifacts(&self, kind: ArtifactKind) -> Result<Vec<BuildArtifact>> {
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_artifact_items(&self, container: &str) -> Result<Vec<BuildArtifact>> {
        Ok(self
            .container_items
            .lock()
            .unwrap()
            .get(container)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_artifact(&self, kind: ArtifactKind, name: &str) -> Result<()> {
        if self.failing_deletes.lock().unwrap().contains(name) {
            return Err(CloudError::ApiError(format!("delete of {} rejected", name)));
        }
        self.deleted_artifacts
            .lock()
            .unwrap()
            .push((kind, name.to_string()));
        Ok(())
    }

    async fn artifact_attached(&self, _kind: ArtifactKind, name: &str) -> Result<bool> {
        Ok(self.attached.lock().unwrap().contains(name))
    }

    async fn check_credentials(&self) -> Result<bool> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.credential_failures) {
            return Err(CloudError::AuthenticationFailed(
                "credential probe refused".into(),
            ));
        }
        Ok(true)
    }

    async fn list_clusters(&self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.clusters.lock().unwrap().clone())
    }
}

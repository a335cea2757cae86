//! Pass orchestration
//!
//! The [`Engine`] drives the recurring passes: refreshing provider listings
//! into the inventory, sweeping resources past their TTL, retiring build
//! artifacts and reporting leftovers and container clusters. Failures inside
//! a pass are partition-scoped: one (namespace, provider) pair failing is
//! digested and reported without stopping the rest of the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use cloudsweep_cloud::{CloudError, FailureDigest, ProviderKind, RetryError, RetryPolicy};
use cloudsweep_config::{Activity, SweepConfig};
use cloudsweep_inventory::{
    InventoryError, InventoryStore, ReconcileSummary, Resource, ResourceKey,
};
use cloudsweep_retention::{CleanupOutcome, CleanupPass};

use crate::error::{EngineError, Result};
use crate::notify::{Notifier, render_cluster_report, render_resource_table};
use crate::registry::ProviderRegistry;
use crate::status::RunStatus;

/// What one refresh run did and where it struggled.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Reconciliation counts summed over all partitions
    pub summary: ReconcileSummary,

    /// Partitions whose refresh exhausted its retries, keyed
    /// `namespace/provider`
    pub refresh_failures: BTreeMap<String, FailureDigest>,

    /// Namespaces where deleting expired resources failed
    pub sweep_failures: BTreeMap<String, FailureDigest>,

    /// Expired resources whose deletion was accepted
    pub swept: usize,

    /// Resources covered by a leftover report sent this run
    pub notified: usize,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.refresh_failures.is_empty() && self.sweep_failures.is_empty()
    }
}

/// Outcomes of one cleanup pass, keyed by `namespace/provider`.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub outcomes: BTreeMap<String, CleanupOutcome>,
}

impl CleanupReport {
    pub fn deletions(&self) -> usize {
        self.outcomes.values().map(CleanupOutcome::deletions).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.outcomes.values().all(|o| o.failures.is_empty())
    }
}

/// Cluster listings per namespace, merged over the namespace's providers.
#[derive(Debug, Default)]
pub struct ClusterReport {
    /// namespace -> region -> cluster names
    pub clusters: BTreeMap<String, BTreeMap<String, Vec<String>>>,

    /// Namespaces whose cluster listing failed on some provider
    pub failures: BTreeMap<String, FailureDigest>,
}

impl ClusterReport {
    pub fn total(&self) -> usize {
        self.clusters
            .values()
            .flat_map(|regions| regions.values())
            .map(Vec::len)
            .sum()
    }
}

/// Result of probing one registered client's credentials.
#[derive(Debug)]
pub struct CredentialCheck {
    pub namespace: String,
    pub kind: ProviderKind,
    pub result: std::result::Result<(), CloudError>,
}

/// Orchestrates all passes over the registered provider clients.
pub struct Engine {
    config: SweepConfig,
    registry: ProviderRegistry,
    store: InventoryStore,
    status: RunStatus,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl Engine {
    pub fn new(
        config: SweepConfig,
        registry: ProviderRegistry,
        store: InventoryStore,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            status: RunStatus::new(),
            notifier,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One full refresh run.
    ///
    /// Refreshes every (namespace, provider) partition, sweeps resources
    /// past their TTL, then sends the leftover report. An exhausted
    /// partition is digested and reported without stopping the others, and
    /// the sweep runs even when partitions failed. The success timestamp
    /// moves only when every partition refreshed clean; sweep failures
    /// alone do not hold it back.
    ///
    /// At most one refresh run at a time; a second trigger fails fast with
    /// [`EngineError::AlreadyRunning`].
    pub async fn refresh_run(&self) -> Result<RunReport> {
        let Some(token) = self.status.try_begin() else {
            tracing::info!("Refresh already in progress, not starting another");
            return Err(EngineError::AlreadyRunning);
        };

        let mut report = RunReport::default();

        for namespace in self.config.namespaces_for(Activity::Refresh) {
            for kind in self.config.providers_for(namespace) {
                self.refresh_partition(namespace, *kind, &mut report).await?;
            }
        }

        for namespace in self.config.namespaces_for(Activity::Refresh) {
            self.sweep_namespace(namespace, &mut report).await?;
        }

        self.notify_leftovers(&mut report).await?;

        if report.refresh_failures.is_empty() {
            token.succeed(Utc::now());
        }
        Ok(report)
    }

    /// Refresh one (namespace, provider) partition, with retries.
    ///
    /// A contract violation in the listing is a provider-client bug and
    /// fails the whole run; transient errors burn through the retry budget
    /// and end up in the report's failure digest.
    async fn refresh_partition(
        &self,
        namespace: &str,
        kind: ProviderKind,
        report: &mut RunReport,
    ) -> Result<()> {
        let client = self.registry.client(namespace, kind)?;
        let ttl = self.config.ttl_for(namespace);

        let outcome = self
            .retry
            .run_where(
                || {
                    let client = Arc::clone(&client);
                    async move {
                        let observed = client.list_resources(namespace).await?;
                        let summary = self
                            .store
                            .reconcile(kind, namespace, &observed, ttl, Utc::now())
                            .await?;
                        Ok::<_, EngineError>(summary)
                    }
                },
                |err: &EngineError| {
                    !matches!(err, EngineError::Inventory(InventoryError::Contract(_)))
                },
            )
            .await;

        match outcome {
            Ok(summary) => {
                tracing::info!(
                    namespace,
                    provider = %kind,
                    created = summary.created,
                    updated = summary.updated,
                    resurrected = summary.resurrected,
                    removed = summary.removed,
                    "Partition refreshed"
                );
                report.summary.created += summary.created;
                report.summary.updated += summary.updated;
                report.summary.resurrected += summary.resurrected;
                report.summary.removed += summary.removed;
            }
            Err(RetryError::Fatal(err)) => return Err(err),
            Err(RetryError::Exhausted { attempts, failures }) => {
                tracing::error!(
                    namespace,
                    provider = %kind,
                    attempts,
                    "Refresh exhausted its retry budget"
                );
                let subject = format!("Error on refresh of {kind} in namespace {namespace}");
                self.notifier
                    .notify(&subject, &failures.render(), &self.config.recipients(namespace))
                    .await;
                report
                    .refresh_failures
                    .insert(format!("{namespace}/{kind}"), failures);
            }
        }
        Ok(())
    }

    /// Delete every expired resource of one namespace.
    ///
    /// Items are handled in isolation: a rejected delete request lands in
    /// the namespace digest and the sweep moves on. Only accepting clients
    /// get the resource marked as deleting.
    async fn sweep_namespace(&self, namespace: &str, report: &mut RunReport) -> Result<()> {
        let expired = self.store.expired(namespace).await;
        if expired.is_empty() {
            return Ok(());
        }

        let mut failures = FailureDigest::new();
        for resource in expired {
            let client = self.registry.client(namespace, resource.provider)?;
            tracing::info!(
                namespace,
                provider = %resource.provider,
                instance_id = %resource.instance_id,
                age = %resource.age_formatted(),
                "TTL expired, deleting resource"
            );
            match client
                .delete_resource(&resource.region, &resource.instance_id)
                .await
            {
                Ok(()) => {
                    self.store.mark_deleting(&resource.key()).await?;
                    report.swept += 1;
                }
                Err(err) => {
                    tracing::error!(
                        namespace,
                        instance_id = %resource.instance_id,
                        error = %err,
                        "Delete request rejected"
                    );
                    failures.record(format!(
                        "{} ({}): {}",
                        resource.instance_id, resource.region, err
                    ));
                }
            }
        }

        if !failures.is_empty() {
            let subject = format!("[{namespace}] Errors deleting expired resources");
            self.notifier
                .notify(&subject, &failures.render(), &self.config.recipients(namespace))
                .await;
            report.sweep_failures.insert(namespace.to_string(), failures);
        }
        Ok(())
    }

    /// Report resources that outlived the notification threshold.
    ///
    /// One report per namespace, and only when the selection contains
    /// something not reported before. Afterwards the whole selection is
    /// flagged as notified, recipients or not, so only a state change
    /// triggers another report.
    async fn notify_leftovers(&self, report: &mut RunReport) -> Result<()> {
        let Some(notify) = &self.config.notify else {
            return Ok(());
        };
        let threshold =
            chrono::Duration::from_std(notify.age_threshold).unwrap_or(chrono::Duration::MAX);

        let selected = self.store.leftovers(threshold).await;
        if selected.is_empty() {
            return Ok(());
        }

        let mut by_namespace: BTreeMap<String, Vec<Resource>> = BTreeMap::new();
        for resource in selected {
            by_namespace
                .entry(resource.namespace.clone())
                .or_default()
                .push(resource);
        }

        for (namespace, resources) in &by_namespace {
            if resources.iter().all(|r| r.notified) {
                continue;
            }
            let recipients = self.config.recipients(namespace);
            if recipients.is_empty() {
                tracing::debug!(namespace = %namespace, "Leftovers present but nobody to notify");
                continue;
            }

            let subject = format!("[{namespace}] Leftover resources");
            let body = format!(
                "These resources outlived the age threshold and are still running:\n\n{}",
                render_resource_table(resources)
            );
            self.notifier.notify(&subject, &body, &recipients).await;
            report.notified += resources.len();
        }

        let keys: Vec<ResourceKey> = by_namespace
            .values()
            .flatten()
            .map(Resource::key)
            .collect();
        self.store.mark_notified(&keys).await?;
        Ok(())
    }

    /// One artifact cleanup pass over every cleanup namespace.
    ///
    /// Failures inside a pass are digested per namespace and reported;
    /// they never abort the other namespaces.
    pub async fn cleanup_run(&self) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        for namespace in self.config.namespaces_for(Activity::Cleanup) {
            let policy = self.config.retention_for(namespace);
            let mut namespace_failures = FailureDigest::new();

            for kind in self.config.providers_for(namespace) {
                let client = self.registry.client(namespace, *kind)?;
                let pass = CleanupPass::new(client.as_ref(), policy)?;
                let outcome = pass.run(Utc::now()).await;

                if !outcome.failures.is_empty() {
                    namespace_failures.merge(outcome.failures.clone());
                }
                report
                    .outcomes
                    .insert(format!("{namespace}/{kind}"), outcome);
            }

            if !namespace_failures.is_empty() {
                let subject = format!("[{namespace}] Errors during artifact cleanup");
                self.notifier
                    .notify(
                        &subject,
                        &namespace_failures.render(),
                        &self.config.recipients(namespace),
                    )
                    .await;
            }
        }

        Ok(report)
    }

    /// Survey container clusters and report namespaces that have any.
    ///
    /// Clusters are never created by test runs on purpose, so finding one
    /// is worth a report on its own; an empty survey stays silent.
    pub async fn cluster_report(&self) -> Result<ClusterReport> {
        let mut report = ClusterReport::default();

        for namespace in self.config.namespaces_for(Activity::Clusters) {
            let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
            let mut failures = FailureDigest::new();

            for kind in self.config.providers_for(namespace) {
                let client = self.registry.client(namespace, *kind)?;
                match client.list_clusters().await {
                    Ok(clusters) => {
                        for (region, names) in clusters {
                            merged.entry(region).or_default().extend(names);
                        }
                    }
                    Err(err) => {
                        tracing::error!(
                            namespace,
                            provider = %kind,
                            error = %err,
                            "Cluster listing failed"
                        );
                        failures.record(format!("{kind}: {err}"));
                    }
                }
            }

            let found: usize = merged.values().map(Vec::len).sum();
            if found > 0 {
                tracing::info!(namespace, clusters = found, "Container clusters in use");
                let subject = format!("Container clusters found in namespace {namespace}");
                self.notifier
                    .notify(
                        &subject,
                        &render_cluster_report(&merged),
                        &self.config.recipients(namespace),
                    )
                    .await;
            }

            if !failures.is_empty() {
                report.failures.insert(namespace.to_string(), failures);
            }
            report.clusters.insert(namespace.to_string(), merged);
        }

        Ok(report)
    }

    /// Probe the credentials of every registered client.
    pub async fn check_credentials(&self) -> Vec<CredentialCheck> {
        let mut checks = Vec::new();
        for (namespace, kind, client) in self.registry.iter() {
            let result = client.verify_credentials().await;
            match &result {
                Ok(()) => tracing::info!(namespace, provider = %kind, "Credentials verified"),
                Err(err) => tracing::error!(
                    namespace,
                    provider = %kind,
                    error = %err,
                    "Credential check failed"
                ),
            }
            checks.push(CredentialCheck {
                namespace: namespace.to_string(),
                kind,
                result,
            });
        }
        checks
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// When the last fully clean refresh run finished.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.status.last_success()
    }

    pub fn store(&self) -> &InventoryStore {
        &self.store
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTransport;
    use cloudsweep_cloud::fake::FakeClient;
    use cloudsweep_cloud::{ArtifactKind, BuildArtifact, ObservedResource, TTL_TAG, TagMap};
    use cloudsweep_config::{NamespaceConfig, NotifyConfig};
    use cloudsweep_inventory::LifecycleState;
    use std::time::Duration;

    fn test_config(namespaces: &[(&str, &[ProviderKind])]) -> SweepConfig {
        let mut config = SweepConfig::default();
        config.notify = Some(NotifyConfig {
            age_threshold: Duration::from_secs(12 * 3600),
            from: "cloudsweep@example.com".into(),
            to: vec!["ops@example.com".into()],
        });
        for (name, providers) in namespaces {
            config.namespaces.insert(
                (*name).to_string(),
                NamespaceConfig {
                    providers: providers.to_vec(),
                    ..Default::default()
                },
            );
        }
        config
    }

    fn harness(
        config: SweepConfig,
        registry: ProviderRegistry,
    ) -> (Engine, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(transport.clone());
        let engine = Engine::new(config, registry, InventoryStore::in_memory(), notifier);
        (engine, transport)
    }

    fn observed_with_ttl(namespace: &str, id: &str, age_hours: i64, ttl_secs: u64) -> ObservedResource {
        let tags: TagMap = [(TTL_TAG, ttl_secs.to_string())].into_iter().collect();
        ObservedResource::new(ProviderKind::Ec2, namespace, id, "eu-west-1")
            .with_created_at(Utc::now() - chrono::Duration::hours(age_hours))
            .with_tags(tags)
    }

    #[tokio::test]
    async fn test_refresh_tracks_new_resources() {
        let client = Arc::new(FakeClient::new(ProviderKind::Ec2));
        client.push_resource(observed_with_ttl("ns1", "i-1", 1, 7 * 24 * 3600));
        client.push_resource(observed_with_ttl("ns1", "i-2", 1, 7 * 24 * 3600));

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", client.clone());
        let (engine, transport) = harness(test_config(&[("ns1", &[ProviderKind::Ec2])]), registry);

        let report = engine.refresh_run().await.unwrap();

        assert_eq!(report.summary.created, 2);
        assert!(report.is_clean());
        assert_eq!(engine.store().len().await, 2);
        assert!(engine.last_success().is_some());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_rejected() {
        let client = Arc::new(FakeClient::new(ProviderKind::Ec2));
        // one failing attempt keeps the first run sleeping in its retry
        // while the second one is polled
        client.fail_next_lists(1);

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", client.clone());
        let (engine, _transport) = harness(test_config(&[("ns1", &[ProviderKind::Ec2])]), registry);

        let (first, second) = tokio::join!(engine.refresh_run(), engine.refresh_run());

        assert!(first.unwrap().is_clean());
        assert!(matches!(second.unwrap_err(), EngineError::AlreadyRunning));
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_listing_failures_recovered() {
        let client = Arc::new(FakeClient::new(ProviderKind::Ec2));
        client.push_resource(observed_with_ttl("ns1", "i-1", 1, 7 * 24 * 3600));
        client.fail_next_lists(2);

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", client.clone());
        let (engine, transport) = harness(test_config(&[("ns1", &[ProviderKind::Ec2])]), registry);

        let report = engine.refresh_run().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.summary.created, 1);
        assert_eq!(client.list_call_count(), 3);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_refresh_digests_and_moves_on() {
        let bad = Arc::new(FakeClient::new(ProviderKind::Ec2));
        bad.fail_next_lists(3);
        let good = Arc::new(FakeClient::new(ProviderKind::Ec2));
        good.push_resource(observed_with_ttl("good", "i-1", 1, 7 * 24 * 3600));

        let mut registry = ProviderRegistry::new();
        registry.register("bad", bad.clone());
        registry.register("good", good.clone());
        let config = test_config(&[
            ("bad", &[ProviderKind::Ec2]),
            ("good", &[ProviderKind::Ec2]),
        ]);
        let (engine, transport) = harness(config, registry);

        let report = engine.refresh_run().await.unwrap();

        assert!(report.refresh_failures.contains_key("bad/ec2"));
        // the healthy partition was still refreshed
        assert_eq!(report.summary.created, 1);
        assert!(engine.last_success().is_none());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Error on refresh of ec2 in namespace bad");
        assert_eq!(sent[0].recipients, ["ops@example.com"]);
        assert!(sent[0].body.contains("listing unavailable"));
    }

    #[tokio::test]
    async fn test_contract_violation_fails_fast() {
        let client = Arc::new(FakeClient::new(ProviderKind::Ec2));
        // a listing claiming the wrong provider is a client bug
        client.push_resource(
            ObservedResource::new(ProviderKind::Azure, "ns1", "vm-1", "westeurope")
                .with_created_at(Utc::now()),
        );

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", client.clone());
        let (engine, _transport) = harness(test_config(&[("ns1", &[ProviderKind::Ec2])]), registry);

        let err = engine.refresh_run().await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::Inventory(InventoryError::Contract(_))
        ));
        assert_eq!(client.list_call_count(), 1);
        assert!(engine.last_success().is_none());

        // the aborted run released the slot
        client.set_resources(Vec::new());
        engine.refresh_run().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_resources_swept_with_item_isolation() {
        let client = Arc::new(FakeClient::new(ProviderKind::Ec2));
        client.push_resource(observed_with_ttl("ns1", "i-old", 2, 3600));
        client.push_resource(observed_with_ttl("ns1", "i-bad", 2, 3600));
        client.push_resource(observed_with_ttl("ns1", "i-young", 0, 3600));
        client.fail_delete_of("i-bad");

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", client.clone());
        let (engine, transport) = harness(test_config(&[("ns1", &[ProviderKind::Ec2])]), registry);

        let report = engine.refresh_run().await.unwrap();

        assert_eq!(report.swept, 1);
        assert_eq!(
            client.deleted_resources(),
            [("eu-west-1".to_string(), "i-old".to_string())]
        );
        assert_eq!(report.sweep_failures["ns1"].len(), 1);
        // a sweep failure does not hold back the success timestamp
        assert!(engine.last_success().is_some());

        let key = |id: &str| ResourceKey::new(ProviderKind::Ec2, "ns1", id);
        let store = engine.store();
        assert_eq!(store.get(&key("i-old")).await.unwrap().state, LifecycleState::Deleting);
        assert_eq!(store.get(&key("i-bad")).await.unwrap().state, LifecycleState::Active);
        assert_eq!(store.get(&key("i-young")).await.unwrap().state, LifecycleState::Active);

        let subjects: Vec<String> = transport.subjects();
        assert!(subjects.contains(&"[ns1] Errors deleting expired resources".to_string()));
    }

    #[tokio::test]
    async fn test_leftover_report_sent_once() {
        let client = Arc::new(FakeClient::new(ProviderKind::Ec2));
        // old enough for the 12h threshold, well under the 24h default TTL
        client.push_resource(
            ObservedResource::new(ProviderKind::Ec2, "ns1", "i-lingering", "eu-west-1")
                .with_created_at(Utc::now() - chrono::Duration::hours(13)),
        );

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", client.clone());
        let (engine, transport) = harness(test_config(&[("ns1", &[ProviderKind::Ec2])]), registry);

        let report = engine.refresh_run().await.unwrap();
        assert_eq!(report.notified, 1);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "[ns1] Leftover resources");
        assert!(sent[0].body.contains("i-lingering"));
        assert!(sent[0].body.contains("13h00m"));

        // the same leftover stays quiet on the next run
        let report = engine.refresh_run().await.unwrap();
        assert_eq!(report.notified, 0);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_unnotifiable_leftovers_still_flagged() {
        let client = Arc::new(FakeClient::new(ProviderKind::Ec2));
        client.push_resource(
            ObservedResource::new(ProviderKind::Ec2, "ns1", "i-quiet", "eu-west-1")
                .with_created_at(Utc::now() - chrono::Duration::hours(13)),
        );

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", client.clone());
        let mut config = test_config(&[("ns1", &[ProviderKind::Ec2])]);
        // notification configured, but nobody to send to
        if let Some(notify) = config.notify.as_mut() {
            notify.to.clear();
        }
        let (engine, transport) = harness(config, registry);

        let report = engine.refresh_run().await.unwrap();

        // no report went out, yet the leftover is flagged so the selection
        // cannot grow unbounded
        assert_eq!(report.notified, 0);
        assert!(transport.sent().is_empty());
        let r = engine
            .store()
            .get(&ResourceKey::new(ProviderKind::Ec2, "ns1", "i-quiet"))
            .await
            .unwrap();
        assert!(r.notified);
    }

    #[tokio::test]
    async fn test_cleanup_sweeps_provider_artifacts() {
        let old = Utc::now() - chrono::Duration::hours(48);
        let client = Arc::new(FakeClient::new(ProviderKind::Azure));
        client.set_artifacts(
            ArtifactKind::Image,
            vec![
                BuildArtifact::new("SLES15-SP2-BYOS.x86_64-0.9.3-Azure-Build1.9.vhd")
                    .with_last_modified(old),
                BuildArtifact::new("SLES15-SP2-BYOS.x86_64-0.9.3-Azure-Build1.10.vhd")
                    .with_last_modified(old),
            ],
        );

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", client.clone());
        let (engine, transport) = harness(test_config(&[("ns1", &[ProviderKind::Azure])]), registry);

        let report = engine.cleanup_run().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.deletions(), 1);
        assert_eq!(report.outcomes["ns1/azure"].deleted_images, 1);
        assert_eq!(
            client.deleted_artifacts(),
            [(
                ArtifactKind::Image,
                "SLES15-SP2-BYOS.x86_64-0.9.3-Azure-Build1.9.vhd".to_string()
            )]
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cluster_report_notifies_only_when_present() {
        let busy = Arc::new(FakeClient::new(ProviderKind::Ec2));
        busy.set_clusters(
            [(
                "eu-central-1".to_string(),
                vec!["kube-a".to_string(), "kube-b".to_string()],
            )]
            .into(),
        );
        let idle = Arc::new(FakeClient::new(ProviderKind::Ec2));

        let mut registry = ProviderRegistry::new();
        registry.register("busy", busy.clone());
        registry.register("idle", idle.clone());
        let config = test_config(&[
            ("busy", &[ProviderKind::Ec2]),
            ("idle", &[ProviderKind::Ec2]),
        ]);
        let (engine, transport) = harness(config, registry);

        let report = engine.cluster_report().await.unwrap();

        assert_eq!(report.total(), 2);
        assert_eq!(report.clusters["busy"]["eu-central-1"], ["kube-a", "kube-b"]);
        assert!(report.clusters["idle"].is_empty());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Container clusters found in namespace busy");
        assert_eq!(sent[0].body, "eu-central-1 : kube-a kube-b\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_checks_cover_every_client() {
        let healthy = Arc::new(FakeClient::new(ProviderKind::Ec2));
        let broken = Arc::new(FakeClient::new(ProviderKind::Azure));
        broken.fail_next_credential_checks(5);

        let mut registry = ProviderRegistry::new();
        registry.register("ns1", healthy.clone());
        registry.register("ns1", broken.clone());
        let config = test_config(&[("ns1", &[ProviderKind::Ec2, ProviderKind::Azure])]);
        let (engine, _transport) = harness(config, registry);

        let checks = engine.check_credentials().await;

        assert_eq!(checks.len(), 2);
        let by_kind = |kind: ProviderKind| {
            checks
                .iter()
                .find(|c| c.kind == kind)
                .unwrap()
        };
        assert!(by_kind(ProviderKind::Ec2).result.is_ok());
        assert!(by_kind(ProviderKind::Azure).result.is_err());
    }
}

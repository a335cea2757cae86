//! Per-provider cleanup pass
//!
//! Runs the retention plan against a live provider: the keep-set is computed
//! from the image listing, images and disks are swept against it, then the
//! age-only diagnostic container sweep runs. Every failure is pinned to its
//! item and collected into one digest so a single refused deletion never
//! stops the rest of the pass.

use chrono::{DateTime, Utc};

use cloudsweep_cloud::{ArtifactKind, BuildArtifact, CloudProvider, FailureDigest};

use crate::error::Result;
use crate::parser::NameParser;
use crate::planner::{self, RetentionPlan, RetentionPolicy};

/// What one cleanup pass did.
#[derive(Debug, Default)]
pub struct CleanupOutcome {
    pub deleted_images: usize,
    pub deleted_disks: usize,
    pub deleted_containers: usize,
    pub skipped_attached: usize,
    pub failures: FailureDigest,
}

impl CleanupOutcome {
    pub fn deletions(&self) -> usize {
        self.deleted_images + self.deleted_disks + self.deleted_containers
    }
}

/// One provider's artifact cleanup.
pub struct CleanupPass<'a> {
    client: &'a dyn CloudProvider,
    parser: NameParser,
    policy: RetentionPolicy,
}

impl<'a> CleanupPass<'a> {
    pub fn new(client: &'a dyn CloudProvider, policy: RetentionPolicy) -> Result<Self> {
        let parser = NameParser::for_provider(client.kind())?;
        Ok(Self {
            client,
            parser,
            policy,
        })
    }

    pub async fn run(&self, now: DateTime<Utc>) -> CleanupOutcome {
        let mut outcome = CleanupOutcome::default();
        let keep = self.sweep_images(now, &mut outcome).await;
        self.sweep_disks(&keep, now, &mut outcome).await;
        self.sweep_containers(now, &mut outcome).await;
        tracing::info!(
            provider = %self.client.kind(),
            deleted = outcome.deletions(),
            skipped_attached = outcome.skipped_attached,
            failures = outcome.failures.len(),
            "Cleanup pass finished"
        );
        outcome
    }

    /// Plan over the image listing and delete the outranked builds. The
    /// keep-set is returned so the disk sweep can honor it too.
    async fn sweep_images(&self, now: DateTime<Utc>, outcome: &mut CleanupOutcome) -> RetentionPlan {
        let listing = match self.client.list_artifacts(ArtifactKind::Image).await {
            Ok(listing) => listing,
            Err(err) => {
                outcome
                    .failures
                    .record(format!("listing images failed: {err}"));
                return RetentionPlan::default();
            }
        };
        let plan = planner::plan(&self.parser, &listing, &self.policy, now);
        for name in &plan.delete {
            if self
                .delete_unattached(ArtifactKind::Image, name, outcome)
                .await
            {
                outcome.deleted_images += 1;
            }
        }
        plan
    }

    /// Disks are named after the image they were cut from, so a disk whose
    /// name sits in the image keep-set stays.
    async fn sweep_disks(
        &self,
        keep: &RetentionPlan,
        now: DateTime<Utc>,
        outcome: &mut CleanupOutcome,
    ) {
        let listing = match self.client.list_artifacts(ArtifactKind::Disk).await {
            Ok(listing) => listing,
            Err(err) => {
                outcome
                    .failures
                    .record(format!("listing disks failed: {err}"));
                return;
            }
        };
        let min_age = chrono::Duration::from_std(self.policy.min_age).unwrap_or(chrono::Duration::MAX);
        for disk in &listing {
            if self.parser.parse(&disk.name).is_none() {
                continue;
            }
            let Some(last_modified) = disk.last_modified else {
                continue;
            };
            if now - last_modified < min_age {
                continue;
            }
            if keep.keep.contains(&disk.name) {
                continue;
            }
            if self
                .delete_unattached(ArtifactKind::Disk, &disk.name, outcome)
                .await
            {
                outcome.deleted_disks += 1;
            }
        }
    }

    async fn sweep_containers(&self, now: DateTime<Utc>, outcome: &mut CleanupOutcome) {
        let listing = match self
            .client
            .list_artifacts(ArtifactKind::DiagnosticContainer)
            .await
        {
            Ok(listing) => listing,
            Err(err) => {
                outcome
                    .failures
                    .record(format!("listing diagnostic containers failed: {err}"));
                return;
            }
        };
        for container in &listing {
            if !self.parser.is_diagnostic_container(&container.name) {
                continue;
            }
            if !self.container_expired(container, now, outcome).await {
                continue;
            }
            tracing::info!(name = %container.name, "Deleting diagnostic container");
            match self
                .client
                .delete_artifact(ArtifactKind::DiagnosticContainer, &container.name)
                .await
            {
                Ok(()) => outcome.deleted_containers += 1,
                Err(err) => outcome.failures.record(format!(
                    "deleting diagnostic container {} failed: {err}",
                    container.name
                )),
            }
        }
    }

    async fn container_expired(
        &self,
        container: &BuildArtifact,
        now: DateTime<Utc>,
        outcome: &mut CleanupOutcome,
    ) -> bool {
        let items = match self.client.list_artifact_items(&container.name).await {
            Ok(items) => items,
            Err(err) => {
                outcome.failures.record(format!(
                    "listing items of {} failed: {err}",
                    container.name
                ));
                return false;
            }
        };
        planner::container_expired(container, &items, self.policy.min_age, now)
    }

    /// Attachment is rechecked right before the delete call. A positive or
    /// unknown answer spares the artifact this pass.
    async fn delete_unattached(
        &self,
        kind: ArtifactKind,
        name: &str,
        outcome: &mut CleanupOutcome,
    ) -> bool {
        match self.client.artifact_attached(kind, name).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!(%kind, %name, "Artifact still attached, spared");
                outcome.skipped_attached += 1;
                return false;
            }
            Err(err) => {
                outcome
                    .failures
                    .record(format!("attachment check of {kind} {name} failed: {err}"));
                return false;
            }
        }
        tracing::info!(%kind, %name, "Deleting artifact");
        match self.client.delete_artifact(kind, name).await {
            Ok(()) => true,
            Err(err) => {
                outcome
                    .failures
                    .record(format!("deleting {kind} {name} failed: {err}"));
                false
            }
        }
    }
}

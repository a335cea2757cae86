//! Cloud provider capability trait

use crate::artifact::{ArtifactKind, BuildArtifact};
use crate::error::{CloudError, Result};
use crate::resource::ObservedResource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Credential probes tolerated before the final one propagates.
const CREDENTIAL_PROBE_ATTEMPTS: u32 = 4;
const CREDENTIAL_PROBE_DELAY: Duration = Duration::from_secs(1);

/// Cloud provider kind, used to select the client responsible for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ec2,
    Azure,
    Gce,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ec2 => "ec2",
            ProviderKind::Azure => "azure",
            ProviderKind::Gce => "gce",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capability set implemented once per cloud provider.
///
/// The engine treats every provider polymorphically through this trait. A
/// client instance holds one namespace's credentials for one provider; which
/// client handles a resource is decided by [`ProviderKind`], never by probing
/// names.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Which provider this client talks to.
    fn kind(&self) -> ProviderKind;

    /// List the currently existing resources for a namespace.
    ///
    /// Implementations that list per region aggregate the regions into one
    /// result.
    async fn list_resources(&self, namespace: &str) -> Result<Vec<ObservedResource>>;

    /// Request deletion of a resource.
    ///
    /// Acceptance by the provider is enough; callers never wait for
    /// provider-side completion.
    async fn delete_resource(&self, region: &str, instance_id: &str) -> Result<()>;

    /// List build artifacts of the given kind.
    ///
    /// Providers without a matching artifact store return an empty list.
    async fn list_artifacts(&self, kind: ArtifactKind) -> Result<Vec<BuildArtifact>>;

    /// List the items inside a diagnostic container.
    async fn list_artifact_items(&self, container: &str) -> Result<Vec<BuildArtifact>>;

    /// Delete a single artifact by name.
    async fn delete_artifact(&self, kind: ArtifactKind, name: &str) -> Result<()>;

    /// Whether an artifact is attached to a live resource, e.g. a disk still
    /// bound to a machine. Attached artifacts must not be deleted.
    async fn artifact_attached(&self, kind: ArtifactKind, name: &str) -> Result<bool>;

    /// Single credential probe. `Ok(true)` means the credentials are usable.
    async fn check_credentials(&self) -> Result<bool>;

    /// Container clusters per region, for providers that host them.
    async fn list_clusters(&self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(BTreeMap::new())
    }

    /// Probe credentials with a forgiving warm-up: early failures are
    /// tolerated and retried, the final attempt propagates.
    async fn verify_credentials(&self) -> Result<()> {
        for attempt in 1..=CREDENTIAL_PROBE_ATTEMPTS {
            match self.check_credentials().await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    tracing::info!(
                        provider = %self.kind(),
                        attempt,
                        "Credential probe rejected, retrying"
                    );
                }
                Err(err) => {
                    tracing::info!(
                        provider = %self.kind(),
                        attempt,
                        error = %err,
                        "Credential probe failed, retrying"
                    );
                }
            }
            tokio::time::sleep(CREDENTIAL_PROBE_DELAY).await;
        }

        if self.check_credentials().await? {
            Ok(())
        } else {
            Err(CloudError::AuthenticationFailed(format!(
                "{} credentials rejected after {} attempts",
                self.kind(),
                CREDENTIAL_PROBE_ATTEMPTS + 1
            )))
        }
    }
}

impl std::fmt::Debug for dyn CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudProvider")
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeClient;

    #[tokio::test(start_paused = true)]
    async fn test_verify_credentials_tolerates_early_failures() {
        let client = FakeClient::new(ProviderKind::Azure);
        client.fail_next_credential_checks(3);

        client.verify_credentials().await.unwrap();
        assert_eq!(client.credential_check_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_credentials_propagates_persistent_failure() {
        let client = FakeClient::new(ProviderKind::Azure);
        client.fail_next_credential_checks(5);

        let err = client.verify_credentials().await.unwrap_err();
        assert!(matches!(err, CloudError::AuthenticationFailed(_)));
        assert_eq!(client.credential_check_count(), 5);
    }
}

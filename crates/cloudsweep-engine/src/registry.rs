//! Provider client registry
//!
//! One client instance per (namespace, provider kind) pair, since every
//! namespace talks to a provider with its own credentials. Which client
//! handles a resource is decided by its stored [`ProviderKind`], never by
//! probing names.

use std::collections::BTreeMap;
use std::sync::Arc;

use cloudsweep_cloud::{CloudProvider, ProviderKind};
use cloudsweep_config::SweepConfig;

use crate::error::{EngineError, Result};

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    clients: BTreeMap<(String, ProviderKind), Arc<dyn CloudProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` for a namespace. The kind comes from the client
    /// itself; a second registration for the same pair replaces the first.
    pub fn register(&mut self, namespace: impl Into<String>, client: Arc<dyn CloudProvider>) {
        self.clients.insert((namespace.into(), client.kind()), client);
    }

    /// The client responsible for (namespace, kind).
    pub fn client(&self, namespace: &str, kind: ProviderKind) -> Result<Arc<dyn CloudProvider>> {
        self.clients
            .get(&(namespace.to_string(), kind))
            .cloned()
            .ok_or_else(|| EngineError::UnregisteredProvider {
                namespace: namespace.to_string(),
                kind,
            })
    }

    /// All registered clients in (namespace, kind) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ProviderKind, &Arc<dyn CloudProvider>)> {
        self.clients
            .iter()
            .map(|((namespace, kind), client)| (namespace.as_str(), *kind, client))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Fail fast when the configuration names a (namespace, provider) pair
    /// without a registered client.
    pub fn ensure_covers(&self, config: &SweepConfig) -> Result<()> {
        for (namespace, _) in &config.namespaces {
            for kind in config.providers_for(namespace) {
                if !self.clients.contains_key(&(namespace.clone(), *kind)) {
                    return Err(EngineError::UnregisteredProvider {
                        namespace: namespace.clone(),
                        kind: *kind,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudsweep_cloud::fake::FakeClient;

    #[test]
    fn test_lookup_by_namespace_and_kind() {
        let mut registry = ProviderRegistry::new();
        registry.register("qac", Arc::new(FakeClient::new(ProviderKind::Azure)));
        registry.register("qac", Arc::new(FakeClient::new(ProviderKind::Ec2)));

        assert_eq!(registry.len(), 2);
        let client = registry.client("qac", ProviderKind::Ec2).unwrap();
        assert_eq!(client.kind(), ProviderKind::Ec2);

        let err = registry.client("qac", ProviderKind::Gce).unwrap_err();
        assert!(matches!(err, EngineError::UnregisteredProvider { .. }));
        let err = registry.client("other", ProviderKind::Ec2).unwrap_err();
        assert!(matches!(err, EngineError::UnregisteredProvider { .. }));
    }

    #[test]
    fn test_ensure_covers_names_the_missing_pair() {
        let mut config = SweepConfig::default();
        config.namespaces.insert(
            "qac".into(),
            cloudsweep_config::NamespaceConfig {
                providers: vec![ProviderKind::Azure, ProviderKind::Gce],
                ..Default::default()
            },
        );

        let mut registry = ProviderRegistry::new();
        registry.register("qac", Arc::new(FakeClient::new(ProviderKind::Azure)));

        let err = registry.ensure_covers(&config).unwrap_err();
        match err {
            EngineError::UnregisteredProvider { namespace, kind } => {
                assert_eq!(namespace, "qac");
                assert_eq!(kind, ProviderKind::Gce);
            }
            other => panic!("unexpected error: {other}"),
        }

        registry.register("qac", Arc::new(FakeClient::new(ProviderKind::Gce)));
        registry.ensure_covers(&config).unwrap();
    }
}

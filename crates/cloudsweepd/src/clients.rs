//! Provider client construction
//!
//! Every (namespace, provider) pair named by the configuration gets its own
//! client instance, since each namespace carries its own credentials. A pair
//! without a client binding stops the daemon at startup; silently skipping
//! it would let resources leak unnoticed.

use std::sync::Arc;

use anyhow::Context;

use cloudsweep_cloud::{CloudProvider, ProviderKind};
use cloudsweep_config::SweepConfig;
use cloudsweep_engine::ProviderRegistry;

// TODO: register the provider SDK binding crates (cloudsweep-cloud-aws,
// cloudsweep-cloud-azure, cloudsweep-cloud-gce) here once they land.
fn build_client(namespace: &str, kind: ProviderKind) -> anyhow::Result<Arc<dyn CloudProvider>> {
    Err(anyhow::anyhow!(
        "no {kind} client binding compiled in for namespace '{namespace}'"
    ))
}

/// Build the registry covering every configured (namespace, provider) pair.
pub fn build_registry(config: &SweepConfig) -> anyhow::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for namespace in config.namespaces.keys() {
        for kind in config.providers_for(namespace) {
            let client = build_client(namespace, *kind)
                .with_context(|| format!("setting up {kind} for namespace '{namespace}'"))?;
            registry.register(namespace, client);
        }
    }
    registry.ensure_covers(config)?;
    Ok(registry)
}

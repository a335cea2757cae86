//! Retention planning over artifact listings
//!
//! Planning is a pure function from a listing to a keep/delete decision, so
//! it stays trivially testable. Anything the planner skips (unmanaged names,
//! missing timestamps, artifacts inside the safety window) lands in neither
//! set and is left untouched this pass.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cloudsweep_cloud::BuildArtifact;

use crate::parser::{BuildId, NameParser};

fn default_max_per_flavor() -> usize {
    1
}

fn default_min_age() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

/// How many builds to keep per flavor and how young an artifact must be to
/// stay untouchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Newest builds kept per flavor group
    #[serde(default = "default_max_per_flavor")]
    pub max_per_flavor: usize,
    /// Artifacts younger than this are skipped entirely, keep accounting
    /// included. Guards builds that are still being uploaded or consumed.
    #[serde(with = "humantime_serde", default = "default_min_age")]
    pub min_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_per_flavor: default_max_per_flavor(),
            min_age: default_min_age(),
        }
    }
}

/// Keep/delete decision over one artifact listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    pub keep: BTreeSet<String>,
    pub delete: BTreeSet<String>,
}

/// Rank parseable, old-enough artifacts per flavor and keep the newest
/// `max_per_flavor` builds of each. Deletion of anything in the delete-set
/// still requires an attachment check by the caller.
pub fn plan(
    parser: &NameParser,
    artifacts: &[BuildArtifact],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> RetentionPlan {
    let min_age = chrono::Duration::from_std(policy.min_age).unwrap_or(chrono::Duration::MAX);
    let mut groups: BTreeMap<String, Vec<(BuildId, String)>> = BTreeMap::new();
    let mut result = RetentionPlan::default();

    for artifact in artifacts {
        let Some(parsed) = parser.parse(&artifact.name) else {
            tracing::debug!(name = %artifact.name, "Unmanaged artifact name, leaving alone");
            continue;
        };
        let Some(last_modified) = artifact.last_modified else {
            tracing::debug!(name = %artifact.name, "Artifact without modification time, leaving alone");
            continue;
        };
        if now - last_modified < min_age {
            tracing::debug!(name = %artifact.name, "Artifact inside the safety window, skipped");
            continue;
        }
        groups
            .entry(parsed.flavor)
            .or_default()
            .push((parsed.build, artifact.name.clone()));
    }

    for (flavor, mut builds) in groups {
        // newest build first
        builds.sort_by(|a, b| b.cmp(a));
        for (rank, (build, name)) in builds.into_iter().enumerate() {
            if rank < policy.max_per_flavor {
                result.keep.insert(name);
            } else {
                tracing::info!(%flavor, %build, %name, "Artifact outranked within its flavor");
                result.delete.insert(name);
            }
        }
    }

    result
}

/// Age-only retention for diagnostic containers: the container goes only
/// when it and every item inside it are older than `min_age`. One recent
/// item protects the whole container.
pub fn container_expired(
    container: &BuildArtifact,
    items: &[BuildArtifact],
    min_age: Duration,
    now: DateTime<Utc>,
) -> bool {
    let Ok(min_age) = chrono::Duration::from_std(min_age) else {
        return false;
    };
    let mut newest = container.last_modified;
    for item in items {
        if let Some(ts) = item.last_modified
            && newest.is_none_or(|cur| ts > cur)
        {
            newest = Some(ts);
        }
    }
    match newest {
        Some(ts) => now - ts > min_age,
        // nothing datable in there, leave it alone
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use cloudsweep_cloud::ProviderKind;

    fn aged(name: &str, now: DateTime<Utc>, hours: i64) -> BuildArtifact {
        BuildArtifact::new(name).with_last_modified(now - TimeDelta::hours(hours))
    }

    fn policy(max_per_flavor: usize, min_age_hours: u64) -> RetentionPolicy {
        RetentionPolicy {
            max_per_flavor,
            min_age: Duration::from_secs(min_age_hours * 3600),
        }
    }

    #[test]
    fn test_keeps_newest_build_per_flavor() {
        let parser = NameParser::for_provider(ProviderKind::Azure).unwrap();
        let now = Utc::now();
        let listing = vec![
            aged("SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.3.vhd", now, 48),
            aged("SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.9.vhd", now, 48),
            aged("SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.10.vhd", now, 48),
        ];

        let plan = plan(&parser, &listing, &policy(1, 24), now);

        // numeric ranking, not lexical: 1.10 outranks 1.9
        assert_eq!(
            plan.keep.iter().collect::<Vec<_>>(),
            ["SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.10.vhd"]
        );
        assert_eq!(plan.delete.len(), 2);
    }

    #[test]
    fn test_tooling_version_dominates_build_number() {
        let parser = NameParser::for_provider(ProviderKind::Azure).unwrap();
        let now = Utc::now();
        let listing = vec![
            aged("SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.3.vhd", now, 48),
            aged("SLES15-SP2-Azure-HPC.x86_64-0.9.0-Build1.43.vhd", now, 48),
        ];

        let plan = plan(&parser, &listing, &policy(1, 24), now);

        assert!(plan.keep.contains("SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.3.vhd"));
        assert!(plan.delete.contains("SLES15-SP2-Azure-HPC.x86_64-0.9.0-Build1.43.vhd"));
    }

    #[test]
    fn test_flavors_ranked_independently() {
        let parser = NameParser::for_provider(ProviderKind::Azure).unwrap();
        let now = Utc::now();
        let listing = vec![
            aged("SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.3.vhd", now, 48),
            aged("SLES15-SP2-Azure-HPC-BYOS.x86_64-0.9.0-Build1.49.vhd", now, 48),
        ];

        let plan = plan(&parser, &listing, &policy(1, 24), now);

        assert_eq!(plan.keep.len(), 2);
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_young_artifacts_left_out_of_both_sets() {
        let parser = NameParser::for_provider(ProviderKind::Azure).unwrap();
        let now = Utc::now();
        let young = "SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.10.vhd";
        let old = "SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.9.vhd";
        let listing = vec![aged(young, now, 2), aged(old, now, 48)];

        let plan = plan(&parser, &listing, &policy(1, 24), now);

        // the young newest build is out of keep accounting, so the older
        // build is the one kept and nothing is deleted
        assert_eq!(plan.keep.iter().collect::<Vec<_>>(), [old]);
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_unmanaged_and_undated_names_never_deleted() {
        let parser = NameParser::for_provider(ProviderKind::Azure).unwrap();
        let now = Utc::now();
        let listing = vec![
            aged("latest-image-export.img", now, 500),
            BuildArtifact::new("SLES15-SP2-Azure-HPC.x86_64-0.9.1-Build1.3.vhd"),
        ];

        let plan = plan(&parser, &listing, &policy(1, 24), now);

        assert!(plan.keep.is_empty());
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_container_expired_only_when_everything_is_old() {
        let now = Utc::now();
        let container = aged("bootdiagnostics-kube-a1", now, 72);

        let all_old = [aged("item-1", now, 48), aged("item-2", now, 30)];
        assert!(container_expired(&container, &all_old, Duration::from_secs(24 * 3600), now));

        let one_recent = [aged("item-1", now, 48), aged("item-2", now, 1)];
        assert!(!container_expired(&container, &one_recent, Duration::from_secs(24 * 3600), now));
    }

    #[test]
    fn test_recent_container_survives_even_when_empty() {
        let now = Utc::now();
        let container = aged("bootdiagnostics-kube-a1", now, 2);
        assert!(!container_expired(&container, &[], Duration::from_secs(24 * 3600), now));

        let undated = BuildArtifact::new("bootdiagnostics-kube-a1");
        assert!(!container_expired(&undated, &[], Duration::from_secs(24 * 3600), now));
    }

    #[test]
    fn test_empty_old_container_expires() {
        let now = Utc::now();
        let container = aged("bootdiagnostics-kube-a1", now, 72);
        assert!(container_expired(&container, &[], Duration::from_secs(24 * 3600), now));
    }
}

//! Build artifact name parsing
//!
//! Artifact names carry the product version, flavor, architecture and two
//! build counters (image tooling version plus build number). Each provider
//! publishes under its own naming scheme, so the parser carries one pattern
//! set per provider. Names that match no pattern are not managed by
//! cloudsweep and must never be deleted.

use std::fmt;

use regex::Regex;

use cloudsweep_cloud::ProviderKind;

use crate::error::Result;

/// Ordered numeric components of a build identity.
///
/// Comparison runs slot by slot numerically, so build 1.10 outranks 1.9 and
/// a newer tooling version outranks any build counter behind it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildId(Vec<u64>);

impl BuildId {
    pub fn components(&self) -> &[u64] {
        &self.0
    }
}

impl From<Vec<u64>> for BuildId {
    fn from(components: Vec<u64>) -> Self {
        Self(components)
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        Ok(())
    }
}

/// A successfully parsed artifact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Flavor grouping key, e.g. `15-SP2-Azure-HPC-x86_64`
    pub flavor: String,
    /// Build identity used to rank artifacts within a flavor
    pub build: BuildId,
}

/// Capture groups whose numeric runs make up the build identity, in rank
/// order. The tooling version comes first so it dominates the build number.
const BUILD_GROUPS: &[&str] = &["kiwi", "build"];

/// One entry is the pattern source plus the capture groups that form the
/// flavor key, joined in order with `-`. Optional groups that did not
/// participate in a match are simply left out of the key.
type PatternSpec = (&'static str, &'static [&'static str]);

const EC2_PATTERNS: &[PatternSpec] = &[
    (
        r"^SLES(?P<version>\d+(?:-SP\d+)?)-(?P<flavor>EC2[-\w]*?)\.(?P<arch>[^-]+)-(?P<kiwi>\d+(?:\.\d+)+)(?:-(?P<type>[-\w]+?))?-Build(?P<build>\d+(?:\.\d+)+)\.raw\.xz",
        &["version", "flavor", "type", "arch"],
    ),
    (
        r"^SLES(?P<version>\d+(?:-SP\d+)?)(?:-(?P<type>[^.]+))?\.(?P<arch>[^-]+)-(?P<kiwi>\d+(?:\.\d+)+)-(?P<flavor>EC2[-\w]*?)-Build(?P<build>\d+(?:\.\d+)+)\.raw\.xz",
        &["version", "flavor", "type", "arch"],
    ),
];

const AZURE_PATTERNS: &[PatternSpec] = &[
    (
        r"^SLES(?P<version>\d+(?:-SP\d+)?)-Azure\.(?P<arch>[^-]+)-(?P<kiwi>\d+(?:\.\d+)+)-(?P<flavor>[-\w]+)-Build(?P<build>\d+(?:\.\d+)+)\.vhd",
        &["version", "flavor", "arch"],
    ),
    (
        r"^SLES(?P<version>\d+(?:-SP\d+)?)(?:-(?P<flavor1>[^.]+))?\.(?P<arch>[^-]+)-(?P<kiwi>\d+(?:\.\d+)+)(?:-(?P<flavor2>Azure[-\w]*?))?-Build(?P<build>\d+(?:\.\d+)+)\.vhd",
        &["version", "flavor2", "flavor1", "arch"],
    ),
];

const GCE_PATTERNS: &[PatternSpec] = &[
    (
        r"^sles(?P<version>\d+(?:-sp\d+)?)-(?P<flavor>gce[-\w]*?)-(?P<arch>[^-]+)-(?P<kiwi>\d+(?:-\d+)+)(?:-(?P<type>[a-z][-a-z\d]*?))?-build(?P<build>\d+(?:-\d+)+)\.tar\.gz",
        &["version", "flavor", "type", "arch"],
    ),
    (
        r"^sles(?P<version>\d+(?:-sp\d+)?)(?:-(?P<type>[a-z][-a-z\d]*?))?-(?P<arch>[^-]+)-(?P<kiwi>\d+(?:-\d+)+)-(?P<flavor>gce[-\w]*?)-build(?P<build>\d+(?:-\d+)+)\.tar\.gz",
        &["version", "flavor", "type", "arch"],
    ),
];

/// Diagnostic container names that cloudsweep is allowed to touch
const DIAGNOSTIC_CONTAINER_PATTERN: &str = r"^bootdiagnostics-";

/// Parses artifact names for one provider.
pub struct NameParser {
    kind: ProviderKind,
    patterns: Vec<(Regex, &'static [&'static str])>,
    diagnostic: Regex,
}

impl NameParser {
    /// Compile the pattern set for `kind`.
    pub fn for_provider(kind: ProviderKind) -> Result<Self> {
        let specs = match kind {
            ProviderKind::Ec2 => EC2_PATTERNS,
            ProviderKind::Azure => AZURE_PATTERNS,
            ProviderKind::Gce => GCE_PATTERNS,
        };
        let mut patterns = Vec::with_capacity(specs.len());
        for (source, key_groups) in specs {
            patterns.push((Regex::new(source)?, *key_groups));
        }
        Ok(Self {
            kind,
            patterns,
            diagnostic: Regex::new(DIAGNOSTIC_CONTAINER_PATTERN)?,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Parse `name`, trying each pattern in order. Returns `None` for names
    /// outside the managed naming scheme.
    pub fn parse(&self, name: &str) -> Option<ParsedName> {
        let name = name.trim();
        for (regex, key_groups) in &self.patterns {
            let Some(caps) = regex.captures(name) else {
                continue;
            };
            let flavor = key_groups
                .iter()
                .filter_map(|group| caps.name(group).map(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("-");
            let mut components = Vec::new();
            for group in BUILD_GROUPS {
                if let Some(m) = caps.name(group) {
                    components.extend(numeric_runs(m.as_str()));
                }
            }
            return Some(ParsedName {
                flavor,
                build: BuildId(components),
            });
        }
        None
    }

    /// Whether `name` is a diagnostic container cloudsweep manages.
    pub fn is_diagnostic_container(&self, name: &str) -> bool {
        self.diagnostic.is_match(name)
    }
}

fn numeric_runs(text: &str) -> impl Iterator<Item = u64> + '_ {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
}

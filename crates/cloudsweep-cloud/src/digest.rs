//! Deduplicated failure digests

use std::collections::BTreeSet;

/// Width of the rule drawn between rendered digest entries.
const RULE_WIDTH: usize = 79;

/// An ordered set of distinct failure messages.
///
/// Repeated identical failures collapse into one entry, so a digest sent to
/// operators never multiplies the same text. Dedup by message content is part
/// of the contract, not an optimization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureDigest {
    messages: BTreeSet<String>,
}

impl FailureDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure message; duplicates are ignored.
    pub fn record(&mut self, message: impl Into<String>) {
        self.messages.insert(message.into());
    }

    /// Fold another digest into this one.
    pub fn merge(&mut self, other: FailureDigest) {
        self.messages.extend(other.messages);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    /// Render all messages separated by a full-width `#` rule.
    pub fn render(&self) -> String {
        let separator = format!("\n{}\n", "#".repeat(RULE_WIDTH));
        self.messages
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(&separator)
    }
}

impl std::fmt::Display for FailureDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

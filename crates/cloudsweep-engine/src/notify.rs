//! Operator notifications
//!
//! Digest content is built here; delivery goes through the pluggable
//! [`NotifyTransport`]. A failed delivery is logged and dropped, never
//! retried, so a broken mail relay cannot stall a run.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use cloudsweep_inventory::Resource;

/// Delivery failure reported by a transport.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct NotifyError(pub String);

/// Outbound notification channel.
#[async_trait]
pub trait NotifyTransport: Send + Sync {
    async fn send(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> std::result::Result<(), NotifyError>;
}

/// Sends operator digests through a transport.
pub struct Notifier {
    transport: Arc<dyn NotifyTransport>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn NotifyTransport>) -> Self {
        Self { transport }
    }

    /// Send one digest. Without recipients this is a no-op; delivery
    /// problems are logged, not propagated.
    pub async fn notify(&self, subject: &str, body: &str, recipients: &[String]) {
        if recipients.is_empty() {
            tracing::debug!(subject, "No recipients configured, digest not sent");
            return;
        }
        match self.transport.send(subject, body, recipients).await {
            Ok(()) => {
                tracing::info!(subject, recipients = recipients.len(), "Notification sent");
            }
            Err(err) => {
                tracing::warn!(subject, error = %err, "Notification delivery failed");
            }
        }
    }
}

/// Fixed-width text table of resources for digest bodies.
pub fn render_resource_table(resources: &[Resource]) -> String {
    const HEADERS: [&str; 5] = ["Provider", "Id", "Created-By", "Namespace", "Age"];

    let rows: Vec<[String; 5]> = resources
        .iter()
        .map(|r| {
            [
                r.provider.to_string(),
                r.instance_id.clone(),
                r.created_by().unwrap_or("-").to_string(),
                r.namespace.clone(),
                r.age_formatted(),
            ]
        })
        .collect();

    let mut widths: [usize; 5] = [0; 5];
    for (width, header) in widths.iter_mut().zip(HEADERS) {
        *width = header.len();
    }
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    let rule_width = widths.iter().sum::<usize>() + 2 * (HEADERS.len() - 1);
    out.push_str(&"-".repeat(rule_width));
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let mut line = String::new();
    for (i, (cell, &width)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let _ = write!(line, "{cell:<width$}");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Cluster digest body: one `region : names` line per region.
pub fn render_cluster_report(clusters: &BTreeMap<String, Vec<String>>) -> String {
    let mut out = String::new();
    for (region, names) in clusters {
        if names.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{region} : {}", names.join(" "));
    }
    out
}

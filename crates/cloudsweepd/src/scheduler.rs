//! Interval scheduling for the daemon loop

use std::sync::Arc;

use anyhow::Context;
use tokio::time::{Instant, interval, interval_at};

use cloudsweep_engine::{Engine, EngineError};

/// Drive the engine's passes on their configured intervals until ctrl-c.
///
/// The refresh ticker fires immediately so a freshly started daemon gets a
/// current inventory; cleanup and cluster reporting wait out one interval
/// first. The engine's own single-flight guard covers the case of a refresh
/// outlasting its interval.
pub async fn run(engine: Arc<Engine>) -> anyhow::Result<()> {
    let schedule = engine.config().schedule;

    let refresh = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = interval(schedule.refresh);
            loop {
                ticker.tick().await;
                match engine.refresh_run().await {
                    Ok(report) => tracing::info!(
                        created = report.summary.created,
                        removed = report.summary.removed,
                        swept = report.swept,
                        clean = report.is_clean(),
                        "Refresh run finished"
                    ),
                    Err(EngineError::AlreadyRunning) => {
                        tracing::info!("Previous refresh still running, skipping this tick");
                    }
                    Err(err) => tracing::error!(error = %err, "Refresh run failed"),
                }
            }
        })
    };

    let cleanup = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + schedule.cleanup, schedule.cleanup);
            loop {
                ticker.tick().await;
                match engine.cleanup_run().await {
                    Ok(report) => tracing::info!(
                        deleted = report.deletions(),
                        clean = report.is_clean(),
                        "Cleanup pass finished"
                    ),
                    Err(err) => tracing::error!(error = %err, "Cleanup pass failed"),
                }
            }
        })
    };

    let clusters = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + schedule.clusters, schedule.clusters);
            loop {
                ticker.tick().await;
                match engine.cluster_report().await {
                    Ok(report) => {
                        tracing::info!(clusters = report.total(), "Cluster survey finished");
                    }
                    Err(err) => tracing::error!(error = %err, "Cluster survey failed"),
                }
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c signal")?;
    tracing::info!("Shutting down");

    refresh.abort();
    cleanup.abort();
    clusters.abort();
    Ok(())
}

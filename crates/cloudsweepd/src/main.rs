mod clients;
mod scheduler;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use cloudsweep_engine::{Engine, Notifier, render_cluster_report};
use cloudsweep_inventory::{InventorySnapshot, InventoryStore, LifecycleState};

use crate::transport::LogTransport;

#[derive(Parser)]
#[command(name = "cloudsweepd")]
#[command(about = "Tracks ephemeral cloud test resources and sweeps what expired", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        env = "CLOUDSWEEP_CONFIG",
        default_value = "/etc/cloudsweep.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all passes on their configured intervals
    Run,
    /// One refresh run: reconcile listings, sweep expired resources
    Refresh,
    /// One artifact cleanup pass
    Cleanup,
    /// One cluster usage survey
    Report,
    /// Verify the credentials of every configured client
    Check,
    /// Show the tracked inventory and state file
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = cloudsweep_config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let registry = clients::build_registry(&config)?;
    let store = InventoryStore::open(&config.state_file)
        .await
        .with_context(|| format!("opening state file {}", config.state_file.display()))?;
    let notifier = Notifier::new(Arc::new(LogTransport));
    let engine = Arc::new(Engine::new(config, registry, store, notifier));

    match cli.command {
        Commands::Run => {
            tracing::info!(config = %cli.config.display(), "Starting cloudsweepd");
            scheduler::run(engine).await?;
        }
        Commands::Refresh => {
            let report = engine.refresh_run().await?;
            println!(
                "refresh: {} created, {} updated, {} resurrected, {} removed; {} swept; {} notified",
                report.summary.created,
                report.summary.updated,
                report.summary.resurrected,
                report.summary.removed,
                report.swept,
                report.notified
            );
            if !report.is_clean() {
                eprintln!(
                    "failures: {} refresh partition(s), {} sweep namespace(s)",
                    report.refresh_failures.len(),
                    report.sweep_failures.len()
                );
                std::process::exit(1);
            }
        }
        Commands::Cleanup => {
            let report = engine.cleanup_run().await?;
            println!("cleanup: {} artifact(s) deleted", report.deletions());
            if !report.is_clean() {
                eprintln!("failures during cleanup, see the log for the digests");
                std::process::exit(1);
            }
        }
        Commands::Report => {
            let report = engine.cluster_report().await?;
            if report.total() == 0 {
                println!("no container clusters found");
            }
            for (namespace, regions) in &report.clusters {
                if regions.values().any(|names| !names.is_empty()) {
                    println!("[{namespace}]");
                    print!("{}", render_cluster_report(regions));
                }
            }
            if !report.failures.is_empty() {
                eprintln!(
                    "cluster listing failed in {} namespace(s)",
                    report.failures.len()
                );
                std::process::exit(1);
            }
        }
        Commands::Check => {
            let mut failed = false;
            for check in engine.check_credentials().await {
                match &check.result {
                    Ok(()) => println!("{} {}: ok", check.namespace, check.kind),
                    Err(err) => {
                        failed = true;
                        println!("{} {}: {}", check.namespace, check.kind, err);
                    }
                }
            }
            if failed {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            let resources = engine.store().all().await;
            let count_in = |state: LifecycleState| {
                resources.iter().filter(|r| r.state == state).count()
            };
            println!(
                "tracked resources: {} ({} active, {} deleting, {} deleted, {} ignored)",
                resources.len(),
                count_in(LifecycleState::Active),
                count_in(LifecycleState::Deleting),
                count_in(LifecycleState::Deleted),
                resources.iter().filter(|r| r.ignore).count()
            );

            let path = &engine.config().state_file;
            match tokio::fs::read_to_string(path).await {
                Ok(content) => match serde_json::from_str::<InventorySnapshot>(&content) {
                    Ok(snapshot) => println!(
                        "state file: {} (last written {})",
                        path.display(),
                        snapshot.updated_at
                    ),
                    Err(err) => println!("state file: {} (unreadable: {err})", path.display()),
                },
                Err(_) => println!("state file: {} (not written yet)", path.display()),
            }
        }
    }

    Ok(())
}

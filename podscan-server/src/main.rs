//! # podscan
//!
//! Scans every container image running in a cluster scope for known
//! vulnerabilities. One scan job is launched per distinct image; each job
//! posts its report back to the result endpoint hosted here.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use podscan_core::{SessionController, model::ScanResults};
use podscan_server::{
    Orchestrator,
    infra::{
        config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions, ConfigOverrides},
        kube::{KubeClusterReader, KubeJobLauncher},
    },
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "podscan-server")]
#[command(about = "Scan the container images running in a Kubernetes cluster")]
struct Cli {
    /// Path to a podscan.toml configuration file
    #[arg(long, env = "PODSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Namespace to scan (overrides config; empty scans all namespaces)
    #[arg(short, long)]
    namespace: Option<String>,

    /// Maximum number of concurrent scan jobs (overrides config)
    #[arg(long)]
    max_parallelism: Option<usize>,

    /// How long to wait for each scan result, e.g. `10m` (overrides config)
    #[arg(long, value_parser = humantime::parse_duration)]
    result_timeout: Option<Duration>,

    /// Result endpoint port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// How often progress is polled while the session runs
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    poll_interval: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli)?;

    let client = kube::Client::try_default()
        .await
        .context("failed to create kubernetes client")?;
    let controller = SessionController::new(
        Arc::new(KubeClusterReader::new(client.clone())),
        Arc::new(KubeJobLauncher::new(client, config.scanner.clone())),
        config.endpoint.callback(),
    );

    let orchestrator = Orchestrator::new(controller, config.endpoint.listen_addr());
    orchestrator
        .start()
        .await
        .context("failed to start result endpoint")?;

    let outcome = run_session(&orchestrator, &config, cli.poll_interval).await;

    orchestrator.clear().await;
    orchestrator.stop().await;

    let results = outcome?;
    report(&config, &results);
    println!(
        "{}",
        serde_json::to_string_pretty(&results).context("failed to encode results")?
    );
    Ok(())
}

fn load_runtime_config(cli: &Cli) -> anyhow::Result<Config> {
    let ConfigLoad { config, warnings } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?
    .with_overrides(ConfigOverrides {
        target_namespace: cli.namespace.clone(),
        max_parallelism: cli.max_parallelism,
        result_timeout: cli.result_timeout,
        listen_port: cli.port,
    })
    .context("invalid command line overrides")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn,kube=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(config)
}

/// Run one session to completion (or Ctrl-C) and collect its results.
async fn run_session(
    orchestrator: &Orchestrator,
    config: &Config,
    poll_interval: Duration,
) -> anyhow::Result<ScanResults> {
    let handle = orchestrator
        .scan(&config.scan_config())
        .await
        .context("failed to start scan")?;
    info!(
        session = %handle.session,
        images = handle.images_to_scan,
        max_parallelism = config.scan.max_parallelism,
        "scan session started"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                warn!("interrupted, reporting partial results");
                break;
            }
            _ = ticker.tick() => {
                let progress = orchestrator.progress().await;
                info!(
                    to_scan = progress.images_to_scan,
                    started = progress.images_started_to_scan,
                    completed = progress.images_completed_to_scan,
                    "scan progress"
                );
                if progress.is_finished() {
                    break;
                }
            }
        }
    }

    Ok(orchestrator.results().await)
}

fn report(config: &Config, results: &ScanResults) {
    let threshold = config.scan.severity_threshold;
    let flagged: Vec<_> = results
        .image_scan_results
        .iter()
        .filter(|row| row.highest_severity().is_some_and(|worst| worst >= threshold))
        .collect();
    let failed = results.failed().count();

    info!(
        rows = results.image_scan_results.len(),
        flagged = flagged.len(),
        failed,
        threshold = %threshold,
        "scan session finished"
    );
    for row in flagged {
        info!(
            image = %row.image_name,
            pod = %row.pod_name,
            namespace = %row.pod_namespace,
            findings = row.at_least(threshold).count(),
            worst = ?row.highest_severity(),
            "image has findings at or above threshold"
        );
    }
    for row in results.failed() {
        warn!(
            image = %row.image_name,
            pod = %row.pod_name,
            namespace = %row.pod_namespace,
            "image scan failed"
        );
    }
}

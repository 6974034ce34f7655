//! Post collector
//!
//! One-shot CLI over the collector crates:
//! 1. Loads config and, for API commands, the credential file
//! 2. Builds a credential pool that rotates through rate limits
//! 3. Runs one subcommand and prints JSON lines to stdout
//!
//! SIGINT/SIGTERM and `--timeout-secs` cancel a command that is blocked
//! waiting for quota.

mod cli;
mod commands;
mod config;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use collector::{IndexCollector, LinkResolver, TwitterCollector, WatermarkMode};
use credential_pool::{Cancellation, CredentialPool};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{Instrument, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twitter_api::{ClientSettings, HttpClient, load_records};

use crate::cli::{Cli, Command, IndexArgs};
use crate::config::Config;
use crate::metrics::MetricsState;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr with LOG_LEVEL / RUST_LOG support; stdout carries results
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder()?;

    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    let config = if explicit || config_path.exists() {
        info!(path = %config_path.display(), "loading configuration");
        Config::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        info!("no config file, using defaults");
        Config::from_toml_str("").context("invalid default configuration")?
    };

    let run_id = uuid::Uuid::new_v4().as_simple().to_string();
    let span = info_span!("run", run_id = %run_id, command = cli.command.name());
    run(cli, config, prometheus).instrument(span).await
}

async fn run(cli: Cli, config: Config, prometheus: PrometheusHandle) -> Result<()> {
    let (handle, mut cancel) = Cancellation::signal();
    if let Some(secs) = cli.timeout_secs {
        cancel = cancel.and_deadline(tokio::time::Instant::now() + Duration::from_secs(secs));
    }
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.cancel();
    });

    match cli.command {
        Command::Index(args) => {
            spawn_metrics::<HttpClient>(&config, prometheus, None, &cancel);
            run_index(&args, &config, &cancel).await
        }
        command => {
            let collector = build_collector(&config).await?;
            spawn_metrics(&config, prometheus, Some(Arc::clone(collector.pool())), &cancel);
            run_api(command, collector, &config, &cancel).await
        }
    }
}

async fn run_index(args: &IndexArgs, config: &Config, cancel: &Cancellation) -> Result<()> {
    let query = args
        .build_query()
        .context("index search needs at least one --match")?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.index.timeout_secs))
        .build()
        .context("building index client")?;
    let index = IndexCollector::new(http, &config.index.url, &config.index.name);

    let mut out = std::io::stdout().lock();
    tokio::select! {
        result = commands::index(&index, &query, args.from, args.size, &mut out) => {
            let returned = result?;
            info!(returned, "index search complete");
            Ok(())
        }
        _ = cancel.cancelled() => anyhow::bail!("index search cancelled"),
    }
}

async fn run_api(
    command: Command,
    collector: TwitterCollector<HttpClient>,
    config: &Config,
    cancel: &Cancellation,
) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match command {
        Command::Search {
            terms,
            count,
            fixed_step,
        } => {
            let collector = if fixed_step {
                collector.with_search(config.search.page_size, WatermarkMode::FixedStep)
            } else {
                collector
            };
            commands::search(&collector, &terms, count, cancel, &mut out).await?;
        }
        Command::Status { id } => commands::status(&collector, id, cancel, &mut out).await?,
        Command::User { user } => commands::user(&collector, &user, cancel, &mut out).await?,
        Command::Sources { id, no_follow } => {
            let follow = config.links.follow_redirects && !no_follow;
            let resolver = LinkResolver::new(follow, Duration::from_secs(config.links.timeout_secs))
                .context("building link resolver")?;
            commands::sources(&collector, &resolver, id, cancel, &mut out).await?;
        }
        Command::Pool => commands::pool(&collector, &mut out)?,
        Command::Index(_) => anyhow::bail!("index does not go through the API"),
    }
    Ok(())
}

/// Serve `/metrics` and `/health` for the lifetime of the command, if configured.
fn spawn_metrics<C: Send + Sync + 'static>(
    config: &Config,
    prometheus: PrometheusHandle,
    pool: Option<Arc<CredentialPool<C>>>,
    cancel: &Cancellation,
) {
    let Some(addr) = config.metrics.listen_addr else {
        return;
    };
    let state = MetricsState { prometheus, pool };
    let stop = cancel.clone();
    tokio::spawn(async move {
        let shutdown = async move { stop.cancelled().await };
        if let Err(e) = metrics::serve(addr, state, shutdown).await {
            warn!(error = %e, "metrics listener stopped");
        }
    });
}

/// Load credentials and build the API collector.
async fn build_collector(config: &Config) -> Result<TwitterCollector<HttpClient>> {
    let path = &config.credentials.file;
    let records = load_records(path)
        .await
        .with_context(|| format!("failed to load credentials from {}", path.display()))?;

    let settings = ClientSettings {
        base_url: config.api.base_url.clone(),
        timeout: Duration::from_secs(config.api.timeout_secs),
    };
    let pool = CredentialPool::from_records(records, config.pool.backoff(), |record| {
        HttpClient::new(record, &settings)
    });
    if pool.is_empty() {
        warn!(path = %path.display(), "no usable credentials, API calls will fail");
    } else {
        info!(credentials = pool.len(), backoff_secs = pool.backoff().as_secs(), "credential pool ready");
    }

    Ok(TwitterCollector::new(Arc::new(pool)).with_search(config.search.page_size, config.search.watermark))
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, cancelling"),
        _ = terminate => info!("received SIGTERM, cancelling"),
    }
}

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use promconf::{load_config, App, ControllerConfig, Running};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Reconciles RuleGroup and Scrape manifests into Prometheus configuration.
#[derive(Debug, Parser)]
#[command(name = "promconf-controller", version)]
struct Cli {
    /// Controller configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "PROMCONF_CONFIG")]
    config: Option<PathBuf>,

    /// Admission server address, overriding the config file.
    #[arg(long, env = "PROMCONF_LISTEN")]
    listen: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    tracing_log::LogTracer::init().context("installing log bridge")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = Registry::default().with(filter);
    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
    }
    .context("installing tracing subscriber")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            log::info!("shutdown signal received");
            cancel.cancel();
        })
        .context("installing signal handler")?;
    }

    let app = App::from_config(config, &cancel)?;
    let Running { workers, watcher } = app.start(&cancel).await;

    let listen = app.config().listen.clone();
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("binding {}", listen))?;
    log::info!("admission server listening on {}", listen);

    let shutdown = cancel.clone();
    let served = axum::serve(listener, app.router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    // A server error still has to stop the workers.
    cancel.cancel();
    workers.await.context("joining workers")?;
    match tokio::task::spawn_blocking(move || watcher.join()).await {
        Ok(Ok(Err(e))) => log::warn!("manifest watcher stopped: {}", e),
        Ok(Err(_)) => log::error!("manifest watcher panicked"),
        _ => {}
    }

    served.context("admission server")?;
    log::info!("stopped");
    Ok(())
}

//! `pulse-api`: the platform binary. Loads configuration, boots the
//! engine, serves the HTTP API and the metrics port, and shuts everything
//! down on interrupt.
//!
//! Exit codes: 0 clean shutdown, 1 configuration failure, 2 bind failure,
//! 3 fatal runtime error, 130 interrupt.

use analytics_service::AnalyticsEngine;
use api_service::server::{self, ServerError};
use api_service::ApiContext;
use clap::Parser;
use config::{LogFormat, LogLevel, PulseConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_CONFIG: i32 = 1;
const EXIT_BIND: i32 = 2;
const EXIT_RUNTIME: i32 = 3;
const EXIT_INTERRUPT: i32 = 130;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "pulse-api", about = "Pulse analytics platform API server", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override server.port.
    #[arg(long)]
    port: Option<u16>,

    /// Override log.level (debug|info|warn|error).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let code = run().await;
    std::process::exit(code);
}

async fn run() -> i32 {
    let args = Args::parse();

    let mut config = match PulseConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err:#}");
            return EXIT_CONFIG;
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = &args.log_level {
        config.log.level = match level.as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            other => {
                eprintln!("unknown log level {other:?}");
                return EXIT_CONFIG;
            }
        };
    }

    init_tracing(&config);
    info!(port = config.server.port, workers = config.analytics.workers, "starting pulse");

    let engine = Arc::new(AnalyticsEngine::new(&config));
    engine.start();

    let ctx = Arc::new(ApiContext::new(Arc::clone(&engine), &config));

    let api_addr: SocketAddr = ([0, 0, 0, 0], config.server.port).into();
    let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.monitoring.metrics_port).into();

    let (api_quit_tx, api_quit_rx) = tokio::sync::oneshot::channel::<()>();
    let (metrics_quit_tx, metrics_quit_rx) = tokio::sync::oneshot::channel::<()>();

    let metrics_handle = tokio::spawn(server::serve_metrics(
        metrics_addr,
        Arc::clone(engine.monitor()),
        async {
            let _ = metrics_quit_rx.await;
        },
    ));

    let api = server::serve_api(api_addr, ctx, async {
        let _ = api_quit_rx.await;
    });
    tokio::pin!(api);

    let mut interrupted = false;
    let served = tokio::select! {
        result = &mut api => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            interrupted = true;
            let _ = api_quit_tx.send(());
            api.await
        }
    };

    let _ = metrics_quit_tx.send(());
    let report = engine.shutdown(SHUTDOWN_DEADLINE).await;
    if !report.complete {
        error!("engine shutdown incomplete at deadline");
    }
    if let Some(summary) = report.pool {
        info!(
            delivered = summary.delivered,
            discarded = summary.discarded,
            "worker pool drained"
        );
    }
    if let Ok(Err(err)) = metrics_handle.await {
        error!(error = %err, "metrics server failed");
    }

    match served {
        Err(ServerError::Bind { addr, source }) => {
            error!(%addr, error = %source, "failed to bind");
            EXIT_BIND
        }
        Ok(()) if interrupted => EXIT_INTERRUPT,
        Ok(()) => EXIT_OK,
    }
}

fn init_tracing(config: &PulseConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

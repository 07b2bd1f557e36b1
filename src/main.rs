//! mailman3-exporter
//!
//! Prometheus exporter for the Mailman3 Core REST API with tracing logging.
//! This is the main entry point that resolves the configuration and runs the
//! HTTP server.

mod cli;
mod config;
mod handlers;
mod state;

use anyhow::Context;
use axum::{routing::get, Router};
use clap::Parser;
use mailman3_exporter::platform::register_self_metrics;
use mailman3_exporter::{Mailman3Collector, MailmanClient, ScrapeStats, UpstreamStats};
use prometheus::{Gauge, Registry};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

use cli::{Args, LogLevel};
use config::{log_config, resolve_config, show_config, validate_effective_config, Config};
use handlers::{health_handler, metrics_handler, root_handler};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) -> anyhow::Result<()> {
    let log_level = match args.log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Logging initialized with level: {:?}", args.log_level);
    Ok(())
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if loading or validation fails.
fn load_validated_config(args: &Args) -> Config {
    let config = match resolve_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    config
}

/// Builds the shared state: self-metrics registry, upstream client and collector.
fn build_state(config: &Config) -> anyhow::Result<SharedState> {
    let settings = config.to_settings()?;

    let registry = Registry::new();
    register_self_metrics(&registry, &settings).context("Failed to register self-metrics")?;

    let scrape_duration = Gauge::new(
        format!(
            "{}mailman3_exporter_scrape_duration_seconds",
            settings.prefix()
        ),
        "Duration of the previous /metrics request in seconds",
    )?;
    registry.register(Box::new(scrape_duration.clone()))?;

    let upstream_stats = Arc::new(UpstreamStats::new());
    let client = MailmanClient::new(&settings.upstream, upstream_stats.clone())
        .context("Failed to build HTTP client")?;
    let upstream_url = client.url("");

    Ok(Arc::new(AppState {
        registry,
        collector: Mailman3Collector::new(client, &settings),
        scrape_duration,
        scrape_stats: Arc::new(ScrapeStats::new()),
        upstream_stats,
        upstream_url,
    }))
}

/// Waits for Ctrl+C or SIGTERM and returns the matching exit code.
async fn shutdown_signal() -> i32 {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
            0
        }
        _ = terminate => {
            info!("Received SIGTERM");
            1
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = load_validated_config(&args);

        if args.check_config {
            println!("✅ Configuration is valid");
            return Ok(());
        }

        show_config(&config, args.config_format)?;
        return Ok(());
    }

    setup_logging(&args)?;

    let config = load_validated_config(&args);
    if config.log_config.unwrap_or(false) {
        log_config(&config, args.log_level);
    }

    let (host, port) = config.listen_address()?;
    let state = build_state(&config)?;

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    info!("Starting server...");
    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    info!("Server started on port {}", port);
    info!("mailman3-exporter listening on http://{}:{}", host, port);

    let server = axum::serve(listener, app);

    let code = tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
            0
        }
        code = shutdown_signal() => code,
    };

    info!("Shutting down");
    std::process::exit(code);
}

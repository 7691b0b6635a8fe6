//! cmdod - Command-on-Demand for Jamf Pro
//!
//! Gates remote wipe and forced OS updates behind single-use codes that
//! must be echoed back through a device's extension attribute.

use anyhow::{Context, Result};
use clap::Parser;
use cmdod_auth::{BearerToken, CodeStore, DEFAULT_SWEEP_INTERVAL};
use cmdod_core::{Settings, DEFAULT_ENV_PREFIX};
use cmdod_jamf::JamfClient;
use cmdod_server::{create_router, AppState, Verifier};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// cmdod - Verified remote wipe and OS update commands
#[derive(Parser, Debug)]
#[command(name = "cmdod")]
#[command(version, about, long_about = None)]
struct Args {
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Human-readable log lines instead of JSON
    #[arg(long)]
    plain_logs: bool,

    /// Prefix of the environment variables holding the configuration
    #[arg(long, default_value = DEFAULT_ENV_PREFIX)]
    env_prefix: String,

    /// Interface to listen on, overriding the environment
    #[arg(long)]
    listen_interface: Option<IpAddr>,

    /// Port to listen on, overriding the environment
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(log_level.into());
    if args.plain_logs {
        let subscriber = tracing_subscriber::fmt()
            .with_target(false)
            .compact()
            .with_env_filter(filter)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }

    info!("cmdod v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::from_env(&args.env_prefix).context("invalid configuration")?;
    if let Some(interface) = args.listen_interface {
        settings = settings.with_listen_interface(interface);
    }
    if let Some(port) = args.port {
        settings = settings.with_listen_port(port);
    }

    let jamf = JamfClient::new(settings.jamf_url.clone(), settings.credentials.clone())
        .context("failed to create Jamf client")?;
    info!(jamf_url = %jamf.base_url(), "Jamf client ready");

    let codes = Arc::new(CodeStore::new());
    let sweeper = codes.spawn_sweeper(DEFAULT_SWEEP_INTERVAL);

    let verifier = Verifier::new(codes, Arc::new(jamf), settings.proof_attribute.clone());
    let state = Arc::new(AppState::new(
        verifier,
        BearerToken::new(&settings.bearer_token),
    ));
    let router = create_router(state);

    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Service running and listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;

    info!("Goodbye!");
    Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down...");
}

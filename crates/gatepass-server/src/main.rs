//! `GatePass` Access Server
//!
//! HTTP server that issues signed QR credentials and verifies scans.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use zeroize::Zeroizing;

use gatepass_core::config::{default_database_path, load_config};
use gatepass_core::tracing_init::{LogFormat, init_tracing};
use gatepass_crypto::{FreshnessPolicy, PayloadSigner};
use gatepass_server::server::{AppState, build_router};
use gatepass_server::storage::GateDatabase;

#[derive(Parser)]
#[command(name = "gatepass-server")]
#[command(version, about = "GatePass access server - credential issuance and scan verification")]
struct Args {
    /// Explicit config file (JSON), layered over the global one.
    #[arg(long, env = "GATEPASS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on. Overrides the config file.
    #[arg(long, env = "GATEPASS_ADDR")]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file. Overrides the config file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Payload signing secret, at least 32 bytes.
    #[arg(long, env = "GATEPASS_SIGNING_SECRET", hide_env_values = true)]
    signing_secret: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let secret = Zeroizing::new(args.signing_secret.into_bytes());

    let config = load_config(args.config.as_deref())?;
    let log_json = args.log_json || config.server.log_json;
    init_tracing("gatepass_server=info", LogFormat::from_json_flag(log_json))?;

    let addr = args.addr.unwrap_or(config.server.addr);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        "Starting gatepass-server"
    );

    let signer = Arc::new(PayloadSigner::new(
        &secret,
        FreshnessPolicy {
            validity: config.verifier.validity(),
            clock_skew: config.verifier.clock_skew(),
        },
    )?);
    drop(secret);

    let db_path = args
        .db_path
        .or_else(|| config.storage.database_path.clone())
        .or_else(default_database_path)
        .or_else(|| dirs::home_dir().map(|home| home.join(".gatepass").join("gatepass.db")))
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    info!(path = %db_path.display(), "Opening gate database");
    let db = GateDatabase::open(&db_path).await?;

    let state = AppState::new(db.clone(), signer, &config.storage);

    let mut alerts = state.health.subscribe();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => warn!(
                    attempt_id = %alert.attempt_id,
                    granted = alert.granted,
                    error = %alert.error,
                    "Audit gap: verification attempt not logged"
                ),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Audit gap alerts dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "GatePass server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    db.close().await;
    info!("GatePass server stopped");
    Ok(())
}

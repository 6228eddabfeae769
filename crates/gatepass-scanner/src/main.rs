//! `GatePass` Scanning Station
//!
//! Reads decoded QR strings from stdin, one per line, as delivered by the
//! camera decoder, and submits debounced scans to the server.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info};

use gatepass_core::config::load_config;
use gatepass_core::tracing_init::{LogFormat, init_tracing};
use gatepass_scanner::station::{capture, submit_all};
use gatepass_scanner::{ScanDebouncer, StationConfig, VerifyClient, VerifyReply, scan_feed};

#[derive(Parser)]
#[command(name = "gatepass-scanner")]
#[command(version, about = "GatePass scanning station - submits decoded QR scans")]
struct Args {
    /// Explicit config file (JSON), layered over the global one.
    #[arg(long, env = "GATEPASS_CONFIG")]
    config: Option<PathBuf>,

    /// Server base URL. Overrides the config file.
    #[arg(long)]
    server_url: Option<String>,

    /// Operator name reported with every scan.
    #[arg(long, env = "GATEPASS_OPERATOR", default_value = "station")]
    operator: String,

    /// Location label of this station.
    #[arg(long, env = "GATEPASS_LOCATION")]
    location: Option<String>,

    /// Registry to try first.
    #[arg(long)]
    registry_hint: Option<String>,

    /// Attempts for a retryable denial.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Output logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[allow(clippy::print_stdout)]
fn show(reply: &VerifyReply) {
    println!("{}", reply.summary());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_tracing(
        "gatepass_scanner=info",
        LogFormat::from_json_flag(args.log_json),
    )?;

    let server_url = args.server_url.unwrap_or_else(|| config.scanner.server_url.clone());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %server_url,
        debounce = ?config.scanner.debounce(),
        "Starting gatepass-scanner"
    );

    let client = VerifyClient::new(StationConfig {
        server_url,
        operator: args.operator,
        location: args.location,
        registry_hint: args.registry_hint,
        max_attempts: args.max_attempts.max(1),
        backoff: Duration::from_millis(250),
    })?;

    let (publisher, consumer) = scan_feed();
    let debouncer = ScanDebouncer::new(config.scanner.debounce(), config.scanner.min_payload_len);
    let capture_task = tokio::spawn(capture(
        BufReader::new(tokio::io::stdin()),
        debouncer,
        publisher,
    ));

    let submitted = submit_all(consumer, |scan| {
        let client = &client;
        async move {
            match client.verify(&scan).await {
                Ok(reply) => {
                    info!(
                        attempt_id = %reply.attempt_id,
                        decision = %reply.decision,
                        reason = reply.reason_code.as_deref().unwrap_or(""),
                        "Scan decided"
                    );
                    show(&reply);
                }
                Err(e) => error!(error = %e, "Scan could not be submitted"),
            }
        }
    })
    .await;

    let published = capture_task.await??;
    info!(published, submitted, "Input closed, scanner stopped");
    Ok(())
}

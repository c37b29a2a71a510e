//! Command-line entry point for **dyndns**
//!
//! * Parses the config path and per-run overrides (flags or env vars)
//! * Sets up tracing with a compact formatter
//! * Runs exactly one reconciliation pass; schedule it externally (cron, systemd timer)

use anyhow::Result;
use clap::Parser;
use dyndns_core::{Overrides, bootstrap, load_config};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// CLI options
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the config file (optional; environment variables are used if absent)
    #[arg(short, long, env = "DYNDNS_CONFIG", default_value = "dyndns.toml")]
    config: String,

    /// Domain name whose A / AAAA records are reconciled [fallback: DOMAIN_NAME]
    #[arg(short, long)]
    domain: Option<String>,

    /// TTL to set on updated records, in seconds [default: 60]
    #[arg(long)]
    ttl: Option<u32>,

    /// Timeout for the public-address DNS queries, in milliseconds [default: 10000]
    #[arg(long)]
    timeout_millis: Option<u64>,

    /// Timeout for each DNS provider API request, in seconds [default: 30]
    #[arg(long)]
    api_timeout_secs: Option<u64>,

    /// Compare only; report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            domain: self.domain.clone(),
            ttl: self.ttl,
            timeout_millis: self.timeout_millis,
            api_timeout_secs: self.api_timeout_secs,
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().compact())
        .init();

    let cfg = load_config(&cli.config, &cli.overrides())?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling in-flight requests");
            on_signal.cancel();
        }
    });

    let report = bootstrap(cfg, cancel).await?;
    info!("{report}");

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

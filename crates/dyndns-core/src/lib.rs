//! dyndns-core – one reconciliation pass from configuration to report

pub mod cfg;
pub mod detector;
pub mod error;
pub mod reconcile;
pub mod status;

use anyhow::Result;
use cfg::AppConfig;
use detector::EchoResolver;
use dyndns_provider::DnsProvider;
use dyndns_provider_cloudflare::CfProvider;
use reconcile::Reconciler;
use status::PassReport;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builds the Cloudflare client and echo resolver from `cfg` and runs one
/// pass. Per-record failures are in the report; only client construction
/// errors are returned here.
pub async fn bootstrap(cfg: AppConfig, cancel: CancellationToken) -> Result<PassReport> {
    let provider = CfProvider::new(cfg.cloudflare.credentials(), cfg.api_timeout())?;
    let source = EchoResolver::new(cfg.lookup_timeout());
    info!(
        "reconciling {} via {} (ttl={}s{})",
        cfg.domain,
        provider.name(),
        cfg.ttl,
        if cfg.dry_run { ", dry-run" } else { "" }
    );

    let reconciler = Reconciler::new(Arc::new(provider), Arc::new(source), &cfg.domain, cfg.ttl)
        .dry_run(cfg.dry_run);
    Ok(reconciler.run(&cancel).await)
}

pub use cfg::{Overrides, load_config, load_config_from};

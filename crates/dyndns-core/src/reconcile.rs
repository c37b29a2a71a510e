//! Reconciler: compare each provider record with the host's public address
//! and patch the record when they drift.
//!
//! Record types are handled one after another; a failure in one is reported
//! and the next is still attempted.

use crate::{
    detector::{AddressSource, Family},
    error::{ReconcileError, Stage},
    status::{PassReport, RecordStatus},
};
use dyndns_provider::{DnsProvider, RecordType};
use std::{future::Future, net::IpAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct Reconciler {
    provider: Arc<dyn DnsProvider>,
    source: Arc<dyn AddressSource>,
    domain: String,
    ttl: u32,
    dry_run: bool,
}

impl Reconciler {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        source: Arc<dyn AddressSource>,
        domain: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            provider,
            source,
            domain: domain.into(),
            ttl,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, on: bool) -> Self {
        self.dry_run = on;
        self
    }

    /// One full pass over A then AAAA.
    pub async fn run(&self, cancel: &CancellationToken) -> PassReport {
        let mut report = PassReport::new(&self.domain);
        for typ in RecordType::ALL {
            let status = match self.reconcile(typ, cancel).await {
                Ok(status) => status,
                Err(e) => {
                    error!("{e}");
                    e.into()
                }
            };
            report.push(typ, status);
        }
        report
    }

    /// Fetch, resolve, compare and, on mismatch, update a single record type.
    pub async fn reconcile(
        &self,
        typ: RecordType,
        cancel: &CancellationToken,
    ) -> Result<RecordStatus, ReconcileError> {
        let record = guarded(
            cancel,
            typ,
            Stage::Fetch,
            self.provider.fetch_record(typ, &self.domain),
        )
        .await?
        .map_err(|source| ReconcileError::Fetch {
            record_type: typ,
            source,
        })?;
        info!("DNS {} {typ} record contains: {}", record.name(), record.content());

        let host = guarded(
            cancel,
            typ,
            Stage::Resolve,
            self.source.public_addr(Family::for_record(typ)),
        )
        .await?
        .map_err(|source| ReconcileError::Resolve {
            record_type: typ,
            source,
        })?;

        let from = record.content().to_owned();
        let to = host.to_string();

        if same_address(&from, host) {
            debug!("{} {typ} already points at {to}", record.name());
            return Ok(RecordStatus::Unchanged { content: from });
        }

        if self.dry_run {
            info!("dry-run: {} {typ} would update {from} -> {to}", record.name());
            return Ok(RecordStatus::WouldUpdate { from, to });
        }

        info!(
            "DNS {} {typ} record content ({from}) differs from host ({to}). Updating...",
            record.name()
        );
        guarded(
            cancel,
            typ,
            Stage::Update,
            self.provider
                .update_record(record.id(), typ, record.name(), &to, self.ttl),
        )
        .await?
        .map_err(|source| ReconcileError::Update {
            record_type: typ,
            source,
        })?;
        info!("{} {typ} updated {from} -> {to}", record.name());

        Ok(RecordStatus::Updated { from, to })
    }
}

/// Run `fut` unless `cancel` fires first.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    typ: RecordType,
    stage: Stage,
    fut: F,
) -> Result<F::Output, ReconcileError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled { record_type: typ, stage }),
        out = fut => Ok(out),
    }
}

/// Parsed comparison so `2001:db8:0:0::1` and `2001:db8::1` agree; content
/// that is not an address falls back to exact text.
fn same_address(content: &str, host: IpAddr) -> bool {
    match content.trim().parse::<IpAddr>() {
        Ok(published) => published == host,
        Err(_) => content == host.to_string(),
    }
}

//! Outcome of one reconciliation pass, per record type.

use crate::error::{ReconcileError, Stage};
use dyndns_provider::RecordType;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    /// Provider already publishes the host address.
    Unchanged { content: String },
    Updated { from: String, to: String },
    /// Dry-run: a mismatch was found but nothing was written.
    WouldUpdate { from: String, to: String },
    Failed { stage: Stage, reason: String },
}

impl RecordStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, RecordStatus::Failed { .. })
    }
}

impl From<ReconcileError> for RecordStatus {
    fn from(e: ReconcileError) -> Self {
        RecordStatus::Failed {
            stage: e.stage(),
            reason: e.to_string(),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Unchanged { content } => write!(f, "unchanged ({content})"),
            RecordStatus::Updated { from, to } => write!(f, "updated {from} -> {to}"),
            RecordStatus::WouldUpdate { from, to } => write!(f, "would update {from} -> {to}"),
            RecordStatus::Failed { reason, .. } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PassReport {
    pub domain: String,
    pub records: Vec<(RecordType, RecordStatus)>,
}

impl PassReport {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, typ: RecordType, status: RecordStatus) {
        self.records.push((typ, status));
    }

    pub fn status(&self, typ: RecordType) -> Option<&RecordStatus> {
        self.records
            .iter()
            .find(|(t, _)| *t == typ)
            .map(|(_, s)| s)
    }

    pub fn has_failures(&self) -> bool {
        self.records.iter().any(|(_, s)| s.is_failure())
    }

    pub fn updated_count(&self) -> usize {
        self.records
            .iter()
            .filter(|(_, s)| matches!(s, RecordStatus::Updated { .. }))
            .count()
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        for (typ, status) in &self.records {
            write!(f, " {typ} {status};")?;
        }
        Ok(())
    }
}

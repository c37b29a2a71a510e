use crate::detector::DetectError;
use dyndns_provider::{ProviderError, RecordType};
use std::fmt;
use thiserror::Error;

/// Problems found while loading configuration; fatal before any network work.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration:\n{0}")]
    Validate(String),
}

/// The step of a reconciliation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Resolve,
    Update,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch provider record",
            Stage::Resolve => "resolve public address",
            Stage::Update => "update provider record",
        })
    }
}

/// A per-record-type failure; reported, never fatal to the pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{record_type} record: {} failed: {source}", Stage::Fetch)]
    Fetch {
        record_type: RecordType,
        source: ProviderError,
    },

    #[error("{record_type} record: {} failed: {source}", Stage::Resolve)]
    Resolve {
        record_type: RecordType,
        source: DetectError,
    },

    #[error("{record_type} record: {} failed: {source}", Stage::Update)]
    Update {
        record_type: RecordType,
        source: ProviderError,
    },

    #[error("{record_type} record: {stage} cancelled")]
    Cancelled {
        record_type: RecordType,
        stage: Stage,
    },
}

impl ReconcileError {
    pub fn record_type(&self) -> RecordType {
        match self {
            ReconcileError::Fetch { record_type, .. }
            | ReconcileError::Resolve { record_type, .. }
            | ReconcileError::Update { record_type, .. }
            | ReconcileError::Cancelled { record_type, .. } => *record_type,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ReconcileError::Fetch { .. } => Stage::Fetch,
            ReconcileError::Resolve { .. } => Stage::Resolve,
            ReconcileError::Update { .. } => Stage::Update,
            ReconcileError::Cancelled { stage, .. } => *stage,
        }
    }
}

//! Provider-neutral record vocabulary shared by the reconciler and the
//! concrete DNS provider clients.

use async_trait::async_trait;
use std::{fmt, str::FromStr};
use thiserror::Error;

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    AAAA,
}

impl RecordType {
    /// Both supported types, in reconciliation order.
    pub const ALL: [RecordType; 2] = [RecordType::A, RecordType::AAAA];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("A") {
            Ok(RecordType::A)
        } else if s.eq_ignore_ascii_case("AAAA") {
            Ok(RecordType::AAAA)
        } else {
            Err(ProviderError::Decode(format!("unsupported record type `{s}`")))
        }
    }
}

/// One provider-side record as last fetched. Never mutated; a new fetch
/// produces a new snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsRecord {
    id: String,
    name: String,
    record_type: RecordType,
    content: String,
}

impl DnsRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        record_type: RecordType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            record_type,
            content: content.into(),
        }
    }

    /// Provider-assigned opaque identifier, required for updates.
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unsuccessful API call:\n{0}")]
    Api(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("no matching {record_type} record found for `{name}`")]
    NotFound {
        record_type: RecordType,
        name: String,
    },
    #[error("found {count} matching {record_type} records for `{name}`; expected exactly one")]
    Ambiguous {
        record_type: RecordType,
        name: String,
        count: usize,
    },
}

/// Read and write access to exactly one record per (type, name).
#[async_trait]
pub trait DnsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch the single record matching `typ` and `name`.
    ///
    /// Zero matches is [`ProviderError::NotFound`], more than one is
    /// [`ProviderError::Ambiguous`].
    async fn fetch_record(&self, typ: RecordType, name: &str) -> Result<DnsRecord, ProviderError>;

    /// Replace the content of the record addressed by `id`.
    async fn update_record(
        &self,
        id: &str,
        typ: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<(), ProviderError>;
}

//! Test doubles for reconciliation scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use dyndns_core::detector::{AddressSource, DetectError, Family};
use dyndns_provider::{DnsProvider, DnsRecord, ProviderError, RecordType};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the fake provider answers for a record type.
pub enum Fetch {
    Found(DnsRecord),
    ApiError(String),
    Missing,
    /// Never completes; only cancellation gets the caller out.
    Hang,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateCall {
    pub id: String,
    pub typ: RecordType,
    pub name: String,
    pub content: String,
    pub ttl: u32,
}

pub struct FakeProvider {
    fetch: HashMap<RecordType, Fetch>,
    fail_updates: bool,
    updates: Mutex<Vec<UpdateCall>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            fetch: HashMap::new(),
            fail_updates: false,
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, typ: RecordType, plan: Fetch) -> Self {
        self.fetch.insert(typ, plan);
        self
    }

    pub fn with_record(self, id: &str, typ: RecordType, name: &str, content: &str) -> Self {
        self.with(typ, Fetch::Found(DnsRecord::new(id, name, typ, content)))
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn updates(&self) -> Vec<UpdateCall> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_record(&self, typ: RecordType, name: &str) -> Result<DnsRecord, ProviderError> {
        match self.fetch.get(&typ) {
            Some(Fetch::Found(rec)) => Ok(rec.clone()),
            Some(Fetch::ApiError(msg)) => Err(ProviderError::Api(msg.clone())),
            Some(Fetch::Hang) => std::future::pending().await,
            Some(Fetch::Missing) | None => Err(ProviderError::NotFound {
                record_type: typ,
                name: name.to_owned(),
            }),
        }
    }

    async fn update_record(
        &self,
        id: &str,
        typ: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<(), ProviderError> {
        if self.fail_updates {
            return Err(ProviderError::Api("Error: record is locked".into()));
        }
        self.updates.lock().unwrap().push(UpdateCall {
            id: id.to_owned(),
            typ,
            name: name.to_owned(),
            content: content.to_owned(),
            ttl,
        });
        Ok(())
    }
}

/// Address source with fixed answers per family; missing families fail.
pub struct FakeSource {
    addrs: HashMap<Family, IpAddr>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            addrs: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, family: Family, ip: &str) -> Self {
        self.addrs.insert(family, ip.parse().expect("valid test address"));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressSource for FakeSource {
    async fn public_addr(&self, family: Family) -> Result<IpAddr, DetectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.addrs
            .get(&family)
            .copied()
            .ok_or_else(|| DetectError::NoAnswer {
                family,
                name: "myip.opendns.com".into(),
            })
    }
}

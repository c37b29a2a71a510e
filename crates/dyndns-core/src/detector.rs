//! Public-address detection via a DNS echo service
//!
//! * Asks a fixed public resolver for a fixed name; the resolver answers with
//!   the source address it saw, i.e. the host's public address.
//! * The socket is bound to one address family, so the IPv4 query can only
//!   reveal the IPv4 address and the IPv6 query the IPv6 address.
//! * One UDP exchange per lookup, bounded by a timeout; no retry.

use async_trait::async_trait;
use dyndns_provider::RecordType;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType as QueryType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tokio::{
    net::{UdpSocket, lookup_host},
    time::timeout,
};
use tracing::{debug, info};

pub const ECHO_RESOLVER: &str = "resolver1.opendns.com:53";
pub const ECHO_NAME: &str = "myip.opendns.com";

/// Large enough for any plain UDP answer without EDNS.
const MAX_DATAGRAM: usize = 1232;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn for_record(typ: RecordType) -> Self {
        match typ {
            RecordType::A => Family::V4,
            RecordType::AAAA => Family::V6,
        }
    }

    fn unspecified(self) -> SocketAddr {
        match self {
            Family::V4 => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            Family::V6 => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        }
    }

    fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }

    fn query_type(self) -> QueryType {
        match self {
            Family::V4 => QueryType::A,
            Family::V6 => QueryType::AAAA,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::V4 => "IPv4",
            Family::V6 => "IPv6",
        })
    }
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("resolver `{endpoint}` has no {family} address")]
    NoEndpoint { family: Family, endpoint: String },

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed DNS exchange: {0}")]
    Protocol(String),

    #[error("resolver answered {0}")]
    Rcode(String),

    #[error("resolver returned no {family} answer for `{name}`")]
    NoAnswer { family: Family, name: String },
}

/// Where the reconciler learns the host's public address from.
#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn public_addr(&self, family: Family) -> Result<IpAddr, DetectError>;
}

/*──────── echo resolver ────────*/

#[derive(Debug, Clone)]
pub struct EchoResolver {
    endpoint: String,
    name: String,
    timeout: Duration,
}

impl EchoResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            endpoint: ECHO_RESOLVER.to_owned(),
            name: ECHO_NAME.to_owned(),
            timeout,
        }
    }

    /// Use another resolver (`host:port`) and echo name.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>, name: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self.name = name.into();
        self
    }

    pub async fn public_ipv4(&self) -> Result<Ipv4Addr, DetectError> {
        match self.lookup(Family::V4).await? {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(_) => Err(self.no_answer(Family::V4)),
        }
    }

    pub async fn public_ipv6(&self) -> Result<Ipv6Addr, DetectError> {
        match self.lookup(Family::V6).await? {
            IpAddr::V6(v6) => Ok(v6),
            IpAddr::V4(_) => Err(self.no_answer(Family::V6)),
        }
    }

    async fn lookup(&self, family: Family) -> Result<IpAddr, DetectError> {
        let ip = timeout(self.timeout, self.exchange(family))
            .await
            .map_err(|_| DetectError::Timeout(self.timeout))??;
        info!("detect/{family} {} -> {ip}", self.endpoint);
        Ok(ip)
    }

    async fn exchange(&self, family: Family) -> Result<IpAddr, DetectError> {
        let server = lookup_host(&self.endpoint)
            .await?
            .find(|a| family.matches(a))
            .ok_or_else(|| DetectError::NoEndpoint {
                family,
                endpoint: self.endpoint.clone(),
            })?;

        let sock = UdpSocket::bind(family.unspecified()).await?;
        sock.connect(server).await?;

        let (id, query) = build_query(&self.name, family)?;
        sock.send(&query).await?;
        debug!("sent {family} echo query id={id} to {server}");

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let n = sock.recv(&mut buf).await?;
            if n >= 2 && u16::from_be_bytes([buf[0], buf[1]]) == id {
                return parse_answer(&buf[..n], family, &self.name);
            }
            debug!("discarding {n}-byte datagram with foreign id");
        }
    }

    fn no_answer(&self, family: Family) -> DetectError {
        DetectError::NoAnswer {
            family,
            name: self.name.clone(),
        }
    }
}

#[async_trait]
impl AddressSource for EchoResolver {
    async fn public_addr(&self, family: Family) -> Result<IpAddr, DetectError> {
        match family {
            Family::V4 => self.public_ipv4().await.map(IpAddr::V4),
            Family::V6 => self.public_ipv6().await.map(IpAddr::V6),
        }
    }
}

/*──────── wire helpers ────────*/

/// Recursive query for `name`, returned with its random id.
fn build_query(name: &str, family: Family) -> Result<(u16, Vec<u8>), DetectError> {
    let name = Name::from_str(name)
        .map_err(|e| DetectError::Protocol(format!("invalid echo name `{name}`: {e}")))?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(family.query_type());
    query.set_query_class(DNSClass::IN);

    let id = fastrand::u16(..);
    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);

    let mut buf = Vec::with_capacity(64);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .map_err(|e| DetectError::Protocol(format!("failed to encode query: {e}")))?;
    Ok((id, buf))
}

/// First address of the requested family in the answer section.
fn parse_answer(bytes: &[u8], family: Family, name: &str) -> Result<IpAddr, DetectError> {
    let message = Message::from_vec(bytes)
        .map_err(|e| DetectError::Protocol(format!("failed to parse response: {e}")))?;

    let rcode = message.response_code();
    if rcode != ResponseCode::NoError {
        return Err(DetectError::Rcode(format!("{rcode:?}")));
    }

    message
        .answers()
        .iter()
        .find_map(|record| match (family, record.data()) {
            (Family::V4, RData::A(a)) => Some(IpAddr::V4(a.0)),
            (Family::V6, RData::AAAA(aaaa)) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .ok_or_else(|| DetectError::NoAnswer {
            family,
            name: name.to_owned(),
        })
}

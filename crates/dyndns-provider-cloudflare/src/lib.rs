//! Cloudflare DNS record client
//!
//! * Reads and patches exactly one `A` / `AAAA` record, addressed by type and name.
//! * Auth via **API Token** scoped to the zone – needs `DNS:Edit`.
//! * The record must already exist; it is never created here.
//! * All business errors are mapped to [`dyndns_provider::ProviderError`].

use async_trait::async_trait;
use dyndns_provider::{DnsProvider, DnsRecord, ProviderError, RecordType};
use reqwest::{
    Client, Response,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned, de::IgnoredAny};
use std::{fmt, time::Duration};
use tracing::{debug, info};

const API_ROOT: &str = "https://api.cloudflare.com/client/v4";

/// A single name+type pair matches at most one record, so one generous page
/// is always enough.
const PAGE_SIZE: &str = "100";

/*──────── credentials ────────*/

/// Zone-scoped Cloudflare credentials, read once at startup.
#[derive(Clone)]
pub struct Credentials {
    zone_id: String,
    account_id: String,
    api_token: String,
}

impl Credentials {
    pub fn new(
        zone_id: impl Into<String>,
        account_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            account_id: account_id.into(),
            api_token: api_token.into(),
        }
    }

    fn ensure_complete(&self) -> Result<(), ProviderError> {
        let missing: Vec<&str> = [
            ("zone_id", &self.zone_id),
            ("account_id", &self.account_id),
            ("api_token", &self.api_token),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::Config(format!(
                "missing Cloudflare credentials: {}",
                missing.join(", ")
            )))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("zone_id", &self.zone_id)
            .field("account_id", &self.account_id)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

/*──────── wire types ────────*/

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    errors: Vec<ApiMessage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    messages: Vec<ApiMessage>,
    result: Option<T>,
}

/// `null` lists decode as empty.
fn null_as_empty<'de, D>(d: D) -> Result<Vec<ApiMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ApiMessage>>::deserialize(d)?.unwrap_or_default())
}

/// Cloudflare has shipped both bare strings and `{code, message}` objects in
/// `errors` / `messages`, sometimes with either key missing. Anything else is
/// kept verbatim.
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiMessage {
    Text(String),
    Detailed {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        message: Option<String>,
    },
    Other(serde_json::Value),
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMessage::Text(s) => f.write_str(s),
            ApiMessage::Detailed {
                code: Some(code),
                message: Some(message),
            } => write!(f, "{message} (code {code})"),
            ApiMessage::Detailed {
                code: None,
                message: Some(message),
            } => f.write_str(message),
            ApiMessage::Detailed {
                code: Some(code),
                message: None,
            } => write!(f, "code {code}"),
            ApiMessage::Detailed {
                code: None,
                message: None,
            } => f.write_str("(empty)"),
            ApiMessage::Other(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Deserialize)]
struct CfRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
}

#[derive(Serialize)]
struct RecordPatch<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// Every error and message from a failed envelope, one per line.
fn api_error(errors: &[ApiMessage], messages: &[ApiMessage]) -> ProviderError {
    let lines: Vec<String> = errors
        .iter()
        .map(|e| format!("Error: {e}"))
        .chain(messages.iter().map(|m| format!("Message: {m}")))
        .collect();

    if lines.is_empty() {
        ProviderError::Api("provider reported failure without details".into())
    } else {
        ProviderError::Api(lines.join("\n"))
    }
}

/*──────── provider struct ────────*/

pub struct CfProvider {
    zone_id: String,
    api_root: String,
    client: Client,
}

impl CfProvider {
    /// Fails with [`ProviderError::Config`] if any credential is empty; no
    /// request is ever sent with incomplete credentials.
    pub fn new(creds: Credentials, timeout: Duration) -> Result<Self, ProviderError> {
        creds.ensure_complete()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", creds.api_token))
            .map_err(|_| ProviderError::Config("api_token is not a valid header value".into()))?;
        auth.set_sensitive(true);

        let mut hdr = HeaderMap::new();
        hdr.insert(AUTHORIZATION, auth);
        hdr.insert(USER_AGENT, HeaderValue::from_static("dyndns (+cloudflare)"));
        hdr.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            zone_id: creds.zone_id,
            api_root: API_ROOT.to_owned(),
            client: Client::builder()
                .default_headers(hdr)
                .timeout(timeout)
                .build()?,
        })
    }

    /// Point the client at another API root (e.g. a local mock server).
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into().trim_end_matches('/').to_owned();
        self
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.api_root, self.zone_id)
    }

    /*──────── envelope check ────────*/

    async fn check<T: DeserializeOwned>(&self, resp: Response) -> Result<Option<T>, ProviderError> {
        let status = resp.status();
        let body = resp.text().await?;
        debug!("Cloudflare responded {status} ({} bytes)", body.len());

        let env: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("HTTP {status}: {e}")))?;
        if !env.success {
            return Err(api_error(&env.errors, &env.messages));
        }
        Ok(env.result)
    }
}

/*──────── DnsProvider impl ────────*/

#[async_trait]
impl DnsProvider for CfProvider {
    fn name(&self) -> &'static str {
        "Cloudflare"
    }

    async fn fetch_record(&self, typ: RecordType, name: &str) -> Result<DnsRecord, ProviderError> {
        let resp = self
            .client
            .get(self.records_url())
            .query(&[
                ("page", "1"),
                ("per_page", PAGE_SIZE),
                ("type", typ.as_str()),
                ("name", name),
            ])
            .send()
            .await?;

        let mut records: Vec<CfRecord> = self.check(resp).await?.unwrap_or_default();
        match records.len() {
            0 => Err(ProviderError::NotFound {
                record_type: typ,
                name: name.to_owned(),
            }),
            1 => {
                let r = records.remove(0);
                debug!("Cloudflare {typ} {} -> {} (id={})", r.name, r.content, r.id);
                Ok(DnsRecord::new(
                    r.id,
                    r.name,
                    r.record_type.parse()?,
                    r.content,
                ))
            }
            count => Err(ProviderError::Ambiguous {
                record_type: typ,
                name: name.to_owned(),
                count,
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
        let body = RecordPatch {
            record_type: typ.as_str(),
            name,
            content,
            ttl,
            proxied: false,
        };
        let resp = self
            .client
            .patch(format!("{}/{id}", self.records_url()))
            .json(&body)
            .send()
            .await?;

        self.check::<IgnoredAny>(resp).await?;
        info!("Cloudflare patched {typ} record id={id} -> {content}");
        Ok(())
    }
}

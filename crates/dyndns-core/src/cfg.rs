//! Load `dyndns.toml` + environment + CLI overrides into `AppConfig`

use crate::error::ConfigError;
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, File};
use dyndns_provider_cloudflare::Credentials;
use serde::Deserialize;
use std::{env, fmt, path::Path, time::Duration};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Environment variable → config key.
const ENV_KEYS: &[(&str, &str)] = &[
    ("CF_ZONE_ID", "cloudflare.zone_id"),
    ("CF_ACCOUNT_ID", "cloudflare.account_id"),
    ("CF_API_TOKEN", "cloudflare.api_token"),
    ("DOMAIN_NAME", "domain"),
    ("DYNDNS_TTL", "ttl"),
    ("DYNDNS_TIMEOUT_MILLIS", "timeout_millis"),
    ("DYNDNS_API_TIMEOUT_SECS", "api_timeout_secs"),
    ("DYNDNS_DRY_RUN", "dry_run"),
];

/*──────── Cloudflare ────────*/
#[derive(Clone, Default, Deserialize, Validate)]
pub struct CloudflareCfg {
    /// Zone ID from the Cloudflare dashboard overview
    #[serde(default)]
    #[validate(length(min = 1, message = "required; set CF_ZONE_ID"))]
    pub zone_id: String,
    /// Account ID from the Cloudflare dashboard overview
    #[serde(default)]
    #[validate(length(min = 1, message = "required; set CF_ACCOUNT_ID"))]
    pub account_id: String,
    /// API token with `DNS:Edit` on the zone
    #[serde(default)]
    #[validate(length(min = 1, message = "required; set CF_API_TOKEN"))]
    pub api_token: String,
}

impl CloudflareCfg {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.zone_id, &self.account_id, &self.api_token)
    }
}

impl fmt::Debug for CloudflareCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareCfg")
            .field("zone_id", &self.zone_id)
            .field("account_id", &self.account_id)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

/*──────── AppConfig ────────*/
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// fully-qualified name whose A / AAAA records are reconciled
    #[serde(default)]
    #[validate(length(min = 1, message = "required; pass --domain or set DOMAIN_NAME"))]
    pub domain: String,
    /// TTL written on update, in seconds
    #[serde(default = "default_ttl")]
    #[validate(range(min = 1, max = 86400))]
    pub ttl: u32,
    /// public-address lookup timeout in milliseconds
    #[serde(default = "default_timeout_millis")]
    #[validate(range(min = 1))]
    pub timeout_millis: u64,
    /// per-request timeout for the DNS provider API, in seconds
    #[serde(default = "default_api_timeout_secs")]
    #[validate(range(min = 1))]
    pub api_timeout_secs: u64,
    /// detect and compare, but never write
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    #[validate(nested)]
    pub cloudflare: CloudflareCfg,
}

fn default_ttl() -> u32 {
    60
}
fn default_timeout_millis() -> u64 {
    10_000
}
fn default_api_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub domain: Option<String>,
    pub ttl: Option<u32>,
    pub timeout_millis: Option<u64>,
    pub api_timeout_secs: Option<u64>,
    pub dry_run: bool,
}

/// Inject the known environment variables into a `ConfigBuilder`.
///
/// Empty values are treated as unset so they cannot mask the file.
fn add_env<I>(
    mut b: ConfigBuilder<DefaultState>,
    vars: I,
) -> Result<ConfigBuilder<DefaultState>, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (k, v) in vars {
        if v.is_empty() {
            continue;
        }
        if let Some((_, path)) = ENV_KEYS.iter().find(|(name, _)| *name == k) {
            b = b.set_override(*path, v)?;
        }
    }
    Ok(b)
}

fn add_overrides(
    mut b: ConfigBuilder<DefaultState>,
    o: &Overrides,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if let Some(domain) = o.domain.as_deref().filter(|d| !d.is_empty()) {
        b = b.set_override("domain", domain)?;
    }
    if let Some(ttl) = o.ttl {
        b = b.set_override("ttl", ttl.to_string())?;
    }
    if let Some(ms) = o.timeout_millis {
        b = b.set_override("timeout_millis", ms.to_string())?;
    }
    if let Some(secs) = o.api_timeout_secs {
        b = b.set_override("api_timeout_secs", secs.to_string())?;
    }
    if o.dry_run {
        b = b.set_override("dry_run", true)?;
    }
    Ok(b)
}

/// Flatten nested validator output into `path: message` lines.
fn describe(prefix: &str, errs: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errs.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for e in list {
                    let msg = e.message.as_deref().unwrap_or(&*e.code);
                    out.push(format!("  {path}: {msg}"));
                }
            }
            ValidationErrorsKind::Struct(inner) => describe(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (i, inner) in items {
                    describe(&format!("{path}[{i}]"), inner, out);
                }
            }
        }
    }
}

/// Load configuration from an optional TOML file, the process environment
/// and CLI overrides.
///
/// Priority (high → low):
/// 1. CLI overrides
/// 2. Environment (`CF_ZONE_ID`, `CF_ACCOUNT_ID`, `CF_API_TOKEN`, `DOMAIN_NAME`, `DYNDNS_*`)
/// 3. Values in the file (if it exists)
/// 4. Built-in defaults
pub fn load_config(path: &str, overrides: &Overrides) -> Result<AppConfig, ConfigError> {
    load_config_from(path, env::vars(), overrides)
}

/// Same as [`load_config`] with the environment passed explicitly.
pub fn load_config_from<I>(
    path: &str,
    vars: I,
    overrides: &Overrides,
) -> Result<AppConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    // 1) start with the optional file
    let mut builder = Config::builder();
    if Path::new(path).exists() {
        builder = builder.add_source(File::with_name(path).required(true));
    } else {
        tracing::info!("config file `{path}` not found; environment-only mode");
    }

    // 2) environment, then CLI
    builder = add_env(builder, vars)?;
    builder = add_overrides(builder, overrides)?;

    // 3) deserialize and check required fields
    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    if let Err(errs) = cfg.validate() {
        let mut lines = Vec::new();
        describe("", &errs, &mut lines);
        lines.sort();
        return Err(ConfigError::Validate(lines.join("\n")));
    }
    Ok(cfg)
}

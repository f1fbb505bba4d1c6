//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::CheckoutConfig;
use search::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A supplier endpoint from `SUPPLIER_ENDPOINTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierEndpoint {
    pub supplier_id: String,
    pub url: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `json` for JSON log lines, anything else for text
/// - `DATABASE_URL`: PostgreSQL ledger when set, in-memory otherwise
/// - `HANDOFF_SECRET`: key for signing success-page tokens
/// - `SUPPLIER_ENDPOINTS`: `id=url,id=url`
/// - `SUPPLIER_TIMEOUT_MS`, `AUTHORIZATION_TIMEOUT_SECS`
/// - `SUCCESS_URL_BASE`, `INVOICE_URL_BASE`, `PAYMENT_GATEWAY`
/// - `AGENT_COMMISSION_BPS`: agent commission in basis points
/// - `SEARCH_SESSION_TTL_SECS`, `MAX_SEARCH_SESSIONS`: search session limits
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub handoff_secret: String,
    pub supplier_endpoints: Vec<SupplierEndpoint>,
    pub supplier_timeout: Duration,
    pub authorization_timeout: Duration,
    pub success_url_base: String,
    pub invoice_url_base: String,
    pub payment_gateway: String,
    pub agent_commission_bps: u32,
    pub search_session_ttl: Duration,
    pub max_search_sessions: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let checkout = CheckoutConfig::default();

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            handoff_secret: lookup("HANDOFF_SECRET").unwrap_or(defaults.handoff_secret),
            supplier_endpoints: match lookup("SUPPLIER_ENDPOINTS") {
                Some(raw) => parse_endpoints(&raw)?,
                None => Vec::new(),
            },
            supplier_timeout: Duration::from_millis(parse_or(
                &lookup,
                "SUPPLIER_TIMEOUT_MS",
                defaults.supplier_timeout.as_millis() as u64,
            )?),
            authorization_timeout: Duration::from_secs(parse_or(
                &lookup,
                "AUTHORIZATION_TIMEOUT_SECS",
                checkout.authorization_timeout.as_secs(),
            )?),
            success_url_base: lookup("SUCCESS_URL_BASE").unwrap_or(checkout.success_url_base),
            invoice_url_base: lookup("INVOICE_URL_BASE").unwrap_or(checkout.invoice_url_base),
            payment_gateway: lookup("PAYMENT_GATEWAY").unwrap_or(checkout.payment_gateway),
            agent_commission_bps: parse_or(
                &lookup,
                "AGENT_COMMISSION_BPS",
                defaults.agent_commission_bps,
            )?,
            search_session_ttl: Duration::from_secs(parse_or(
                &lookup,
                "SEARCH_SESSION_TTL_SECS",
                defaults.search_session_ttl.as_secs(),
            )?),
            max_search_sessions: parse_or(
                &lookup,
                "MAX_SEARCH_SESSIONS",
                defaults.max_search_sessions,
            )?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            authorization_timeout: self.authorization_timeout,
            success_url_base: self.success_url_base.clone(),
            invoice_url_base: self.invoice_url_base.clone(),
            payment_gateway: self.payment_gateway.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let checkout = CheckoutConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            handoff_secret: "dev-handoff-secret".to_string(),
            supplier_endpoints: Vec::new(),
            supplier_timeout: Duration::from_millis(8_000),
            authorization_timeout: checkout.authorization_timeout,
            success_url_base: checkout.success_url_base,
            invoice_url_base: checkout.invoice_url_base,
            payment_gateway: checkout.payment_gateway,
            agent_commission_bps: 500,
            search_session_ttl: DEFAULT_SESSION_TTL,
            max_search_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

/// Parses `id=url,id=url`. Blank items are skipped.
pub fn parse_endpoints(raw: &str) -> Result<Vec<SupplierEndpoint>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((id, url)) if !id.trim().is_empty() && !url.trim().is_empty() => {
                Ok(SupplierEndpoint {
                    supplier_id: id.trim().to_string(),
                    url: url.trim().to_string(),
                })
            }
            _ => Err(ConfigError::InvalidValue {
                key: "SUPPLIER_ENDPOINTS",
                value: item.to_string(),
            }),
        })
        .collect()
}

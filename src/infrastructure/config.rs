use crate::infrastructure::error::InfraError;
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_HIA_API_BASE: &str = "https://hold-idiot-accountable.onrender.com";
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000/api/hia";
pub const RELAY_PATH: &str = "/api/hia";

const INGEST_PATH: &str = "/api/webhooks/ingest";
const STATUS_PATH: &str = "/api/client/status";

const API_BASE_KEYS: &[&str] = &["HIA_API_BASE", "NEXT_PUBLIC_API_URL"];
const INGEST_URL_KEYS: &[&str] = &["HIA_API_URL", "NEXT_PUBLIC_HIA_API_URL"];
// HIA_HOMELAB_KEY is the legacy name.
const ACCESS_KEY_KEYS: &[&str] = &["HIA_ACCESS_KEY", "HIA_HOMELAB_KEY"];
const SECONDARY_WEBHOOK_KEYS: &[&str] = &["SECONDARY_WEBHOOK_URL"];
const RELAY_ADDR_KEYS: &[&str] = &["LOCKIN_RELAY_ADDR"];
const RELAY_URL_KEYS: &[&str] = &["LOCKIN_RELAY_URL"];
const HOME_KEYS: &[&str] = &["LOCKIN_HOME"];

#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub api_base: String,
    pub ingest_url: String,
    pub status_url: String,
    pub access_key: Option<String>,
    pub secondary_webhook_url: Option<String>,
    pub bind_addr: SocketAddr,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api_base", &self.api_base)
            .field("ingest_url", &self.ingest_url)
            .field("status_url", &self.status_url)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("secondary_webhook_url", &self.secondary_webhook_url)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub relay_url: String,
    pub home: PathBuf,
}

pub fn load_relay_config() -> Result<RelayConfig, InfraError> {
    load_relay_config_from_lookup(|key| std::env::var(key).ok())
}

pub fn load_client_config() -> Result<ClientConfig, InfraError> {
    load_client_config_from_lookup(|key| std::env::var(key).ok())
}

pub fn load_relay_config_from_lookup<F>(lookup: F) -> Result<RelayConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_base = optional_lookup_value(&lookup, API_BASE_KEYS)
        .unwrap_or_else(|| DEFAULT_HIA_API_BASE.to_string())
        .trim_end_matches('/')
        .to_string();
    validate_url(&api_base, "HIA api base")?;

    let ingest_url = optional_lookup_value(&lookup, INGEST_URL_KEYS)
        .unwrap_or_else(|| format!("{api_base}{INGEST_PATH}"));
    validate_url(&ingest_url, "HIA ingest url")?;

    let secondary_webhook_url = optional_lookup_value(&lookup, SECONDARY_WEBHOOK_KEYS);
    if let Some(url) = secondary_webhook_url.as_deref() {
        validate_url(url, "secondary webhook url")?;
    }

    let raw_addr = optional_lookup_value(&lookup, RELAY_ADDR_KEYS)
        .unwrap_or_else(|| DEFAULT_RELAY_ADDR.to_string());
    let bind_addr = raw_addr.parse::<SocketAddr>().map_err(|error| {
        InfraError::InvalidConfig(format!("invalid relay bind address '{raw_addr}': {error}"))
    })?;

    Ok(RelayConfig {
        status_url: format!("{api_base}{STATUS_PATH}"),
        api_base,
        ingest_url,
        access_key: optional_lookup_value(&lookup, ACCESS_KEY_KEYS),
        secondary_webhook_url,
        bind_addr,
    })
}

pub fn load_client_config_from_lookup<F>(lookup: F) -> Result<ClientConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let relay_url = optional_lookup_value(&lookup, RELAY_URL_KEYS)
        .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
    validate_url(&relay_url, "relay url")?;

    let home = match optional_lookup_value(&lookup, HOME_KEYS) {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir()?,
    };

    Ok(ClientConfig { relay_url, home })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|key| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn validate_url(value: &str, field_name: &str) -> Result<(), InfraError> {
    let parsed = Url::parse(value)
        .map_err(|error| InfraError::InvalidConfig(format!("invalid {field_name} '{value}': {error}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(InfraError::InvalidConfig(format!(
            "unsupported scheme '{scheme}' in {field_name}"
        ))),
    }
}

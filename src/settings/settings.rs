use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub kafka: Kafka,
    pub log: Log,
    pub mysql: Mysql,
    pub redis: Redis,
    pub validation: Validation,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub token_store_backend: String, // "redis" or "memory"
    pub issuer: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub cert_path: String,
    pub key_path: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct Kafka {
    pub bootstrap: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Mysql {
    pub dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct Redis {
    pub dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct Validation {
    /// Deadline for one existence-check exchange, in milliseconds.
    pub reply_timeout_ms: u64,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

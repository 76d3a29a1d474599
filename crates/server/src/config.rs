use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8443";
const DEFAULT_REAP_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub reap_interval_seconds: u64,
    pub max_body_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no storage connection string configured; set DATABASE_URL or APP__DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("reap interval must be at least one second")]
    InvalidReapInterval,
    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    reap_interval_seconds: Option<u64>,
    max_body_bytes: Option<usize>,
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("server.toml"), std::env::vars().collect())
}

/// Layers `file` (optional), then the plain `DATABASE_URL` / `SERVER_BIND`
/// variables, then `APP__*` variables; later layers win.
pub fn load_settings_from(
    file: &Path,
    env: HashMap<String, String>,
) -> Result<Settings, ConfigError> {
    let mut plain = HashMap::new();
    if let Some(v) = env.get("DATABASE_URL") {
        plain.insert("database_url".to_string(), v.clone());
    }
    if let Some(v) = env.get("SERVER_BIND") {
        plain.insert("bind_addr".to_string(), v.clone());
    }

    let app_env: HashMap<String, String> = env
        .into_iter()
        .filter(|(key, _)| key.starts_with("APP__"))
        .collect();

    let raw: RawSettings = config::Config::builder()
        .add_source(config::File::from(file.to_path_buf()).required(false))
        .add_source(config::Environment::default().source(Some(plain)))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(app_env)),
        )
        .build()?
        .try_deserialize()?;

    let database_url = raw
        .database_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or(ConfigError::MissingDatabaseUrl)?;

    let reap_interval_seconds = raw
        .reap_interval_seconds
        .unwrap_or(DEFAULT_REAP_INTERVAL_SECONDS);
    if reap_interval_seconds == 0 {
        return Err(ConfigError::InvalidReapInterval);
    }

    Ok(Settings {
        server_bind: raw
            .bind_addr
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        database_url,
        reap_interval_seconds,
        max_body_bytes: raw.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
    })
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

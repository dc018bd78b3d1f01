//! TOML configuration.
//!
//! Everything is optional: a missing config file yields [`Config::default`],
//! which points at a backend on the local loopback. The backend base URL can
//! be injected through the `GAZETTE_BACKEND_URL` environment variable, which
//! wins over the file.
//!
//! ```toml
//! [backend]
//! base_url = "http://127.0.0.1:8000"
//! timeout_secs = 60
//!
//! [catalog]
//! source = "remote"        # or "static"
//! # path = "./archive.json"
//!
//! [resolver]
//! kind = "remote"          # or "local"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `backend.base_url`.
pub const BACKEND_URL_ENV: &str = "GAZETTE_BACKEND_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_source")]
    pub source: String,
    /// JSON file with an array of documents, used by the static source.
    /// The built-in archive is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source: default_catalog_source(),
            path: None,
        }
    }
}

fn default_catalog_source() -> String {
    "remote".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_kind")]
    pub kind: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            kind: default_resolver_kind(),
        }
    }
}

fn default_resolver_kind() -> String {
    "remote".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Switch to the static catalog and the local resolver.
    pub fn offline(mut self) -> Self {
        self.catalog.source = "static".to_string();
        self.resolver.kind = "local".to_string();
        self
    }

    /// Base URL without a trailing slash, ready for path joining.
    pub fn base_url(&self) -> &str {
        self.backend.base_url.trim_end_matches('/')
    }
}

/// Load and validate the config file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    finish(config, std::env::var(BACKEND_URL_ENV).ok())
}

/// Like [`load_config`], but a missing file at `path` yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        finish(Config::default(), std::env::var(BACKEND_URL_ENV).ok())
    }
}

fn finish(mut config: Config, env_url: Option<String>) -> Result<Config> {
    if let Some(url) = env_url.filter(|u| !u.trim().is_empty()) {
        config.backend.base_url = url.trim().to_string();
    }
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let parsed = url::Url::parse(&config.backend.base_url).with_context(|| {
        format!(
            "backend.base_url is not a valid URL: {}",
            config.backend.base_url
        )
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!(
            "backend.base_url must use http or https, got '{}'",
            parsed.scheme()
        );
    }

    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    match config.catalog.source.as_str() {
        "remote" | "static" => {}
        other => anyhow::bail!(
            "Unknown catalog source: '{}'. Must be remote or static.",
            other
        ),
    }

    match config.resolver.kind.as_str() {
        "remote" | "local" => {}
        other => anyhow::bail!(
            "Unknown resolver kind: '{}'. Must be remote or local.",
            other
        ),
    }

    Ok(())
}

//! # Backend Configuration
//!
//! Settings are layered: built-in defaults, then an optional `lms-backend.toml`,
//! then `LMS_`-prefixed environment variables (`LMS_BACKEND_URL`, `LMS_PORT`, ...).

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "lms-backend.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the external REST backend, e.g. `http://localhost:5000/api`
    pub backend_url: String,
    /// When set, mapped children get `{image_base_url}/avatars/{id}.png`
    #[serde(default)]
    pub image_base_url: Option<String>,
    pub bind_address: String,
    pub port: u16,
    pub upstream_timeout_seconds: u64,
    /// Origin allowed by CORS; any origin when absent
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000/api".to_string(),
            image_base_url: None,
            bind_address: "127.0.0.1".to_string(),
            port: 3001,
            upstream_timeout_seconds: 30,
            allowed_origin: None,
        }
    }
}

impl BackendConfig {
    /// Load from `lms-backend.toml` in the working directory (if any) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading backend configuration from {:?}", path);
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("backend_url", defaults.backend_url)?
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("upstream_timeout_seconds", defaults.upstream_timeout_seconds)?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("LMS").try_parsing(true))
            .build()
            .context("Failed to read backend configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("Invalid backend configuration")?;
        info!(
            "Backend configuration loaded: upstream {}, listening on {}:{}",
            config.backend_url, config.bind_address, config.port
        );
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .context("Failed to parse bind address")
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }
}

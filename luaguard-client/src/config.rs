//! Coordinator configuration

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Where the remote transformer lives and how long to wait for it
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_base_url", alias = "baseUrl")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms", alias = "timeoutMs")]
    pub timeout_ms: u64,
    /// Run the local pipeline when the remote is unavailable
    #[serde(default = "default_enable_fallback", alias = "enableFallback")]
    pub enable_fallback: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            enable_fallback: default_enable_fallback(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_enable_fallback() -> bool {
    true
}

fn default_endpoint() -> String {
    "/api/obfuscate".to_string()
}

impl CoordinatorConfig {
    /// Load the `[coordinator]` table of a TOML file, if it has one
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        #[derive(Deserialize)]
        struct File {
            #[serde(default)]
            coordinator: Option<CoordinatorConfig>,
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: File = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(file.coordinator)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full URL of the transform endpoint
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }
}

//! Layered configuration using figment.
//!
//! Sources, highest priority last:
//! 1. Built-in defaults
//! 2. `tech-insights.toml` in the working directory, or the file named by
//!    `TECH_INSIGHTS_CONFIG`
//! 3. Environment variables (`TECH_INSIGHTS_*`, `__` separates sections)
//!
//! `TECH_INSIGHTS_SERVER__PORT=9000` maps to `server.port`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tech_insights_storage::SeedData;

use crate::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "tech-insights.toml";
const CONFIG_PATH_VAR: &str = "TECH_INSIGHTS_CONFIG";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TechInsightsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChecksConfig {
    /// Entities evaluated at once by a bulk run
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// JSON file holding an array of check definitions
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Check definitions as written; parsed once they pass the condition grammar
    #[serde(default)]
    pub definitions: Vec<Value>,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            file: None,
            definitions: Vec::new(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SeedConfig {
    /// JSON file with `{ entities, schemas, facts }`
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl TechInsightsConfig {
    /// Load and validate configuration from every source.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the provider chain. Public so tests can layer extra providers.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("TECH_INSIGHTS_").split("__"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checks.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "checks.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.host".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Inline definitions followed by the ones in `checks.file`, unparsed.
    pub fn load_checks(&self) -> Result<Vec<Value>, ConfigError> {
        let mut checks = self.checks.definitions.clone();
        if let Some(path) = &self.checks.file {
            let raw = read_file(path)?;
            let from_file: Vec<Value> =
                serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            checks.extend(from_file);
        }
        Ok(checks)
    }

    pub fn load_seed(&self) -> Result<Option<SeedData>, ConfigError> {
        let Some(path) = &self.seed.file else {
            return Ok(None);
        };
        let raw = read_file(path)?;
        SeedData::from_json_str(&raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Merge radius used when no `[dedup]` section is given.
pub const DEFAULT_DEDUP_RADIUS_METERS: f64 = 150.0;

/// TOML-backed configuration loaded from disk.
/// Secrets (JWT secret, DB URL) stay as env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_connections: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    pub radius_meters: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_DEDUP_RADIUS_METERS,
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content)?;
    if !(config.dedup.radius_meters.is_finite() && config.dedup.radius_meters > 0.0) {
        anyhow::bail!(
            "dedup.radius_meters must be a positive number, got {}",
            config.dedup.radius_meters
        );
    }
    Ok(config)
}

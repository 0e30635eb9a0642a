use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tax_core::SYSTEM_ACTOR;
use tax_core::db::DbConfig;
use tax_location::LocationConfig;

/// Settings for the admin tool, read from an optional TOML file.
///
/// ```toml
/// actor = "ops"
///
/// [database]
/// backend = "sqlite"
/// connection_string = "tax_rates.db"
///
/// [location]
/// base_url = "http://localhost:8085"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DbConfig,
    pub location: LocationConfig,
    /// Recorded in the audit columns of rows written by the tool.
    pub actor: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DbConfig {
                connection_string: "tax_rates.db".to_string(),
                ..DbConfig::default()
            },
            location: LocationConfig::default(),
            actor: SYSTEM_ACTOR.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Invalid configuration")
    }

    /// Read `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("In config: {}", path.display()))
    }
}

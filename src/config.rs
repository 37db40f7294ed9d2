use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{EtlError, Result};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "etl.toml";

/// Environment variable that points at a config file.
pub const CONFIG_ENV_VAR: &str = "ETL_CONFIG";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EtlConfig {
    pub columns: ColumnConfig,
    pub encoding: EncodingConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Names of the columns the pipeline relies on.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColumnConfig {
    /// Join key shared by both input files
    pub id: String,
    /// Column holding the packed `name-value` tokens
    pub categories: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            categories: "categories".to_string(),
        }
    }
}

/// How the packed categories field is laid out.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncodingConfig {
    /// Separates tokens within the field
    pub token_delimiter: char,
    /// Separates a category name from its value inside a token
    pub name_separator: char,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            token_delimiter: ';',
            name_separator: '-',
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_name: String,
    /// Filter used when RUST_LOG is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "disaster_etl.log".to_string(),
            default_filter: "disaster_etl=info,warn".to_string(),
        }
    }
}

/// Where to write a Prometheus textfile snapshot after a run; no recorder when unset.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub textfile: Option<PathBuf>,
}

impl EtlConfig {
    /// Resolve the configuration for a run.
    ///
    /// Lookup order: the explicit path, then `ETL_CONFIG`, then `etl.toml` in the
    /// working directory. Falls back to defaults when none of them exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Self::from_file(Path::new(path.trim()));
            }
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            return Self::from_file(default_path);
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EtlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.columns.id.is_empty() || self.columns.categories.is_empty() {
            return Err(EtlError::Config("column names must not be empty".to_string()));
        }
        if self.columns.id == self.columns.categories {
            return Err(EtlError::Config(format!(
                "id and categories columns must differ (both '{}')",
                self.columns.id
            )));
        }
        if self.encoding.token_delimiter == self.encoding.name_separator {
            return Err(EtlError::Config(format!(
                "token delimiter and name separator must differ (both '{}')",
                self.encoding.token_delimiter
            )));
        }
        Ok(())
    }
}

//! # Node Configuration
//!
//! Runtime configuration of the replay node.
//!
//! Every field has a default and can be overridden from the environment:
//!
//! | Variable           | Field        |
//! |--------------------|--------------|
//! | `LC_CURRENCY_FILE` | `currency`   |
//! | `LC_CHAIN_FILE`    | `chain_file` |
//! | `LC_LOG_LEVEL`     | `log_level`  |
//! | `LC_QUICK_SYNC`    | `quick_sync` |

use lc_02_consensus_index::CurrencyParameters;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_CURRENCY_FILE: &str = "LC_CURRENCY_FILE";
pub const ENV_CHAIN_FILE: &str = "LC_CHAIN_FILE";
pub const ENV_LOG_LEVEL: &str = "LC_LOG_LEVEL";
pub const ENV_QUICK_SYNC: &str = "LC_QUICK_SYNC";

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Parameters of the replayed currency.
    pub currency: CurrencyParameters,
    /// JSON array of blocks, oldest first.
    pub chain_file: Option<PathBuf>,
    /// `tracing` filter directive.
    pub log_level: String,
    /// Replay trusted blocks without rule checks.
    pub quick_sync: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyParameters::default(),
            chain_file: None,
            log_level: "info".to_string(),
            quick_sync: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid currency file {path}: {source}")]
    Currency {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load from any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = var(ENV_CURRENCY_FILE) {
            config.currency = load_currency(Path::new(&path))?;
        }
        if let Some(path) = var(ENV_CHAIN_FILE) {
            config.chain_file = Some(PathBuf::from(path));
        }
        if let Some(level) = var(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(value) = var(ENV_QUICK_SYNC) {
            config.quick_sync = parse_flag(&value).ok_or(ConfigError::InvalidVar {
                var: ENV_QUICK_SYNC,
                value,
            })?;
        }
        Ok(config)
    }
}

/// Read currency parameters from a JSON file. Missing fields keep their default.
pub fn load_currency(path: &Path) -> Result<CurrencyParameters, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Currency {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

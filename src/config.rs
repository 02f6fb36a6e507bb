//! Connection configuration
//!
//! One control plane per run: a base URL, an optional bearer token and a
//! per-call timeout, loaded from a TOML file with environment overrides.
//! The config is passed explicitly to the HTTP adapter; nothing in the
//! engine reads process-wide state.
//!
//! Resolution order, lowest to highest precedence:
//! 1. `$XDG_CONFIG_HOME/latticectl/config.toml` (or the explicit `--config` path)
//! 2. `LATTICECTL_BASE_URL`, `LATTICECTL_TOKEN`, `LATTICECTL_TIMEOUT_SECS`
//! 3. command-line flags (applied by the CLI layer)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, LatticeResult};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the control-plane API (e.g. `https://lattice.example.com`)
    pub base_url: String,

    /// Bearer token sent with every call
    #[serde(default)]
    pub token: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ConnectionConfig {
    /// Default config file location under the user config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("latticectl").join("config.toml"))
    }

    /// Read a config file
    pub fn from_file(path: &Path) -> LatticeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LatticeError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load the config: explicit path, else default location, else defaults
    ///
    /// Environment overrides apply on top in all three cases.
    pub fn load(explicit_path: Option<&Path>) -> LatticeResult<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var("LATTICECTL_BASE_URL") {
            if !base_url.is_empty() {
                self.base_url = base_url;
            }
        }
        if let Ok(token) = std::env::var("LATTICECTL_TOKEN") {
            if !token.is_empty() {
                self.token = Some(token);
            }
        }
        if let Ok(timeout) = std::env::var("LATTICECTL_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.timeout_secs = secs;
            }
        }
    }
}

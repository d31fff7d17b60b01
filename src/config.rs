use std::path::Path;
use std::str::FromStr;

use bitcoin::Network;
use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "https://blockstream.info/api";
/// Looked up in the working directory with any supported extension.
pub const DEFAULT_CONFIG_FILE: &str = "mergewatch";
pub const ENV_PREFIX: &str = "MERGEWATCH";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Esplora REST base url, without trailing slash.
    pub api_url: String,
    /// "bitcoin", "testnet", "signet" or "regtest"
    pub network: String,
    /// Pages of confirmed history to request, 0 for all.
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub log_level: String,
    /// "pretty" or "json"
    pub log_format: String,
}

impl Settings {
    /// Defaults, then the config file, then `MERGEWATCH_*` variables. An
    /// explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Settings::load_layered(path, ENV_PREFIX)
    }

    fn load_layered(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("network", "bitcoin")?
            .set_default("max_pages", 10_i64)?
            .set_default("timeout_secs", 30_i64)?
            .set_default("log_level", "info")?
            .set_default("log_format", "pretty")?
            .add_source(file)
            .add_source(Environment::with_prefix(env_prefix))
            .build()?
            .try_deserialize()
    }

    pub fn network(&self) -> Result<Network, ConfigError> {
        Network::from_str(&self.network)
            .map_err(|e| ConfigError::Message(format!("invalid network {:?}: {}", self.network, e)))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_url: String::from(DEFAULT_API_URL),
            network: String::from("bitcoin"),
            max_pages: 10,
            timeout_secs: 30,
            log_level: String::from("info"),
            log_format: String::from("pretty"),
        }
    }
}

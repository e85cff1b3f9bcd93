//! Tool settings loading with env-var overrides.
//!
//! Reads `provision.toml` relative to the current working directory (or the
//! path given with `--settings`), then applies `PROVISION_LOG_LEVEL`,
//! `PROVISION_CENTRIFUGE_BIN` and `PROVISION_ETH_NODE_URL`. Without a settings
//! file the built-in development defaults are used.
//!
//! These settings describe the provisioning tool itself. The node's own
//! configuration comes from the template (see [`crate::template`]).

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::contracts::default_deployments_path;
use crate::error::AppError;
use crate::template::EthereumDefaults;

const DEFAULT_SETTINGS_PATH: &str = "provision.toml";

/// Keystore of the local development chain's funded account.
pub const DEV_ACCOUNT_KEY: &str = r#"{"address":"89b0a86583c4444acfd71b463e0d3c55ae1412a5","crypto":{"cipher":"aes-128-ctr","ciphertext":"c779f8379d770d92cfc1ddd4a8f31d5a0adc8f2a0b2a1401370d3630f38c0c8a","cipherparams":{"iv":"36c168e73bf980fe75b0727f890a71ad"},"kdf":"scrypt","kdfparams":{"dklen":32,"n":262144,"p":1,"r":8,"salt":"de1be16e3c981944d1eca2b8b27e4e6e0b5bfb43be0376a5d8889fa679a28122"},"mac":"cc128b815555ba1ead7cae9060e8842afca8356d06455bd9a5752ba6fcc092ef"},"id":"45e060a6-d2ae-43b8-922f-44829499d37d","version":3}"#;

/// Ethereum endpoint and account written into every node config.
#[derive(Debug, Clone)]
pub struct EthereumSettings {
    pub node_url: String,
    /// Keystore JSON (file contents when `account_key_file` was set).
    pub account_key: String,
    pub account_password: String,
}

/// How the `centrifuge` binary is invoked.
#[derive(Debug, Clone)]
pub struct CentrifugeSettings {
    pub binary: PathBuf,
    /// Working directory for every command; `newidentity.json` appears here.
    pub work_dir: PathBuf,
}

/// Fully-resolved tool settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_level: String,
    pub ethereum: EthereumSettings,
    pub centrifuge: CentrifugeSettings,
    /// Contract deployment artifact read in development mode.
    pub deployments_file: PathBuf,
}

impl Settings {
    pub fn ethereum_defaults(&self) -> EthereumDefaults {
        EthereumDefaults {
            node_url: self.ethereum.node_url.clone(),
            account_key: self.ethereum.account_key.clone(),
            account_password: self.ethereum.account_password.clone(),
        }
    }
}

/// Environment-sourced overrides. Tests build this directly instead of
/// mutating the process environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub centrifuge_bin: Option<String>,
    pub eth_node_url: Option<String>,
    pub gopath: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("PROVISION_LOG_LEVEL").ok(),
            centrifuge_bin: env::var("PROVISION_CENTRIFUGE_BIN").ok(),
            eth_node_url: env::var("PROVISION_ETH_NODE_URL").ok(),
            gopath: env::var("GOPATH").ok(),
        }
    }
}

/// `provision.toml` as written on disk.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    ethereum: RawEthereum,
    #[serde(default)]
    centrifuge: RawCentrifuge,
    #[serde(default)]
    dev: RawDev,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEthereum {
    #[serde(default = "default_node_url")]
    node_url: String,
    /// Path to a keystore JSON file; the dev keystore is used when unset.
    #[serde(default)]
    account_key_file: Option<String>,
    #[serde(default)]
    account_password: String,
}

impl Default for RawEthereum {
    fn default() -> Self {
        Self { node_url: default_node_url(), account_key_file: None, account_password: String::new() }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCentrifuge {
    #[serde(default = "default_binary")]
    binary: String,
    #[serde(default = "default_work_dir")]
    work_dir: String,
}

impl Default for RawCentrifuge {
    fn default() -> Self {
        Self { binary: default_binary(), work_dir: default_work_dir() }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawDev {
    #[serde(default)]
    deployments_file: Option<String>,
}

fn default_node_url() -> String { "ws://127.0.0.1:9546".to_string() }
fn default_binary() -> String { "centrifuge".to_string() }
fn default_work_dir() -> String { ".".to_string() }
fn default_log_level() -> String { "info".to_string() }

/// Load settings from the given path, or `provision.toml`, then apply env overrides.
/// If no path is given and `provision.toml` does not exist, built-in defaults apply.
pub fn load(settings_path: Option<&str>) -> Result<Settings, AppError> {
    let overrides = Overrides::from_env();

    if let Some(path) = settings_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new(DEFAULT_SETTINGS_PATH);
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        resolve(RawSettings::default(), &overrides)
    }
}

/// Load from an explicit path with the given overrides.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Settings, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawSettings = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    resolve(parsed, overrides)
}

fn resolve(raw: RawSettings, overrides: &Overrides) -> Result<Settings, AppError> {
    let account_key = match raw.ethereum.account_key_file {
        Some(file) => {
            let path = expand_home(&file);
            fs::read_to_string(&path)
                .map(|s| s.trim().to_string())
                .map_err(|e| AppError::Config(format!("cannot read account key {}: {e}", path.display())))?
        }
        None => DEV_ACCOUNT_KEY.to_string(),
    };

    let deployments_file = match raw.dev.deployments_file {
        Some(file) => expand_home(&file),
        None => default_deployments_path(overrides.gopath.as_deref()),
    };

    Ok(Settings {
        log_level: overrides
            .log_level
            .clone()
            .or(raw.log_level)
            .unwrap_or_else(default_log_level),
        ethereum: EthereumSettings {
            node_url: overrides.eth_node_url.clone().unwrap_or(raw.ethereum.node_url),
            account_key,
            account_password: raw.ethereum.account_password,
        },
        centrifuge: CentrifugeSettings {
            binary: overrides
                .centrifuge_bin
                .as_deref()
                .map(expand_home)
                .unwrap_or_else(|| expand_home(&raw.centrifuge.binary)),
            work_dir: expand_home(&raw.centrifuge.work_dir),
        },
        deployments_file,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

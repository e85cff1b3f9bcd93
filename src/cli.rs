//! Command-line argument definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;
use crate::template::ResolveOptions;

/// Provision a new node: write its config, create its identity, register its keys.
#[derive(Parser, Debug)]
#[command(name = "node-provision")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Running in development mode (local contracts, `testing` network)
    #[arg(long)]
    pub dev: bool,

    /// Target data directory for the config and key material
    #[arg(long, value_name = "DIR", default_value = "default")]
    pub datadir: PathBuf,

    /// Node API port
    #[arg(long, default_value_t = 8082)]
    pub apiport: u16,

    /// Node P2P port
    #[arg(long, default_value_t = 38202)]
    pub p2pport: u16,

    /// Bootstrap peers (kept verbatim as a single entry)
    #[arg(long, value_name = "PEERS")]
    pub bootstraps: Option<String>,

    /// Configuration template
    #[arg(long, value_name = "FILE", default_value = "config.yaml.tpl")]
    pub template: PathBuf,

    /// Tool settings file (default: ./provision.toml when present)
    #[arg(long, value_name = "FILE", env = "PROVISION_SETTINGS")]
    pub settings: Option<String>,

    /// Log level; overrides RUST_LOG and the settings file
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn resolve_options(&self, settings: &Settings) -> ResolveOptions {
        ResolveOptions {
            data_dir: self.datadir.clone(),
            dev_mode: self.dev,
            api_port: self.apiport,
            p2p_port: self.p2pport,
            bootstrap_peers: self.bootstraps.clone(),
            ethereum: settings.ethereum_defaults(),
        }
    }
}

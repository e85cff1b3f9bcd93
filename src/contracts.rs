//! Development-mode contract address discovery.
//!
//! A local contract deployment leaves a build artifact shaped like
//! ```text
//! { "contracts": { "IdentityFactory": { "address": "0x…" }, … } }
//! ```
//! An absent artifact is tolerated: development addresses are optional.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::document::ContractAddresses;
use crate::error::AppError;

/// Artifact path below `$GOPATH/src`.
const DEPLOYMENTS_SUBPATH: &str = "github.com/centrifuge/centrifuge-ethereum-contracts/deployments/local.json";

/// Source of locally deployed contract addresses.
pub trait ContractLookup {
    /// `Ok(None)` when no deployment is available.
    fn contract_addresses(&self) -> Result<Option<ContractAddresses>, AppError>;
}

/// Reads addresses from a deployment artifact on disk.
#[derive(Debug, Clone)]
pub struct DeploymentsFile {
    path: PathBuf,
}

impl DeploymentsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContractLookup for DeploymentsFile {
    fn contract_addresses(&self) -> Result<Option<ContractAddresses>, AppError> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), "deployment artifact not found, contract addresses omitted");
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", self.path.display())))?;
        let addrs = parse_deployments(&raw)
            .map_err(|e| AppError::Config(format!("{}: {e}", self.path.display())))?;
        debug!(
            identity_factory = %addrs.identity_factory,
            identity_registry = %addrs.identity_registry,
            anchor_repository = %addrs.anchor_repository,
            "contract addresses discovered"
        );
        Ok(Some(addrs))
    }
}

/// Lookup for non-development runs and tests: never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContracts;

impl ContractLookup for NoContracts {
    fn contract_addresses(&self) -> Result<Option<ContractAddresses>, AppError> {
        Ok(None)
    }
}

/// Default artifact location: `$GOPATH/src/…/deployments/local.json`,
/// with GOPATH falling back to `~/go`.
pub fn default_deployments_path(gopath: Option<&str>) -> PathBuf {
    let root = match gopath {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("go"),
    };
    root.join("src").join(DEPLOYMENTS_SUBPATH)
}

#[derive(Deserialize)]
struct RawDeployments {
    contracts: HashMap<String, RawContract>,
}

#[derive(Deserialize)]
struct RawContract {
    address: String,
}

fn parse_deployments(raw: &str) -> Result<ContractAddresses, String> {
    let parsed: RawDeployments = serde_json::from_str(raw).map_err(|e| format!("parse error: {e}"))?;
    let address = |name: &str| {
        parsed
            .contracts
            .get(name)
            .map(|c| c.address.clone())
            .ok_or_else(|| format!("contract {name} missing from deployment"))
    };
    Ok(ContractAddresses {
        identity_factory: address("IdentityFactory")?,
        identity_registry: address("IdentityRegistry")?,
        anchor_repository: address("AnchorRepository")?,
        ..ContractAddresses::default()
    })
}

//! Configuration Document: the node config persisted to `config_<suffix>.yaml`.
//!
//! Only the sections this tool reads or writes are typed. Every section keeps
//! the template's remaining fields in an `extra` map so they survive each
//! write and read-modify-write untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Template fields this tool does not interpret.
pub type Extra = BTreeMap<String, serde_yaml::Value>;

/// Network name used for development-mode network selection.
pub const DEV_NETWORK: &str = "testing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub ethereum: EthereumSection,
    pub keys: KeysSection,
    pub storage: StorageSection,
    pub node_port: u16,
    pub p2p: P2pSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centrifuge_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<BTreeMap<String, NetworkSection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthereumSection {
    #[serde(rename = "nodeURL")]
    pub node_url: String,
    pub accounts: AccountsSection,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountsSection {
    pub main: Account,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub key: String,
    pub password: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeysSection {
    pub ethauth: KeyPaths,
    pub signing: KeyPaths,
    pub p2p: KeyPaths,
    #[serde(flatten)]
    pub extra: Extra,
}

impl KeysSection {
    pub fn get(&self, key_type: KeyType) -> &KeyPaths {
        match key_type {
            KeyType::EthAuth => &self.ethauth,
            KeyType::Signing => &self.signing,
            KeyType::P2p => &self.p2p,
        }
    }
}

/// Private/public material locations for one key pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPaths {
    pub private_key: String,
    pub public_key: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    pub path: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P2pSection {
    pub port: u16,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_addresses: Option<ContractAddresses>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_peers: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl NetworkSection {
    pub fn is_empty(&self) -> bool {
        self.contract_addresses.is_none() && self.bootstrap_peers.is_none() && self.extra.is_empty()
    }
}

/// Deployed contract addresses of a network.
///
/// Templates may spell the names in camelCase or list further contracts;
/// both are accepted and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContractAddresses {
    #[serde(default, alias = "identityFactory", skip_serializing_if = "String::is_empty")]
    pub identity_factory: String,
    #[serde(default, alias = "identityRegistry", skip_serializing_if = "String::is_empty")]
    pub identity_registry: String,
    #[serde(default, alias = "anchorRepository", skip_serializing_if = "String::is_empty")]
    pub anchor_repository: String,
    #[serde(flatten)]
    pub extra: Extra,
}

// ── key types ─────────────────────────────────────────────────────────────────

/// The three key pairs every node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    EthAuth,
    Signing,
    P2p,
}

impl KeyType {
    /// Generation and registration order.
    pub const ALL: [KeyType; 3] = [KeyType::EthAuth, KeyType::Signing, KeyType::P2p];

    /// Curve passed to the key generator.
    pub fn algorithm(self) -> &'static str {
        match self {
            KeyType::EthAuth => "secp256k1",
            KeyType::Signing | KeyType::P2p => "ed25519",
        }
    }

    /// Purpose token passed to the key registrar.
    pub fn registration_role(self) -> &'static str {
        match self {
            KeyType::EthAuth => "ethauth",
            KeyType::Signing => "sign",
            KeyType::P2p => "p2p",
        }
    }

    /// Section name under `keys`.
    pub fn section(self) -> &'static str {
        match self {
            KeyType::EthAuth => "ethauth",
            KeyType::Signing => "signing",
            KeyType::P2p => "p2p",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

// ── identity ──────────────────────────────────────────────────────────────────

/// Identity id minted by the identity authority. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Result<Self, AppError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AppError::IdentityNotCreated("identity authority returned an empty id".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── parsing ───────────────────────────────────────────────────────────────────

impl ConfigDocument {
    /// Build the typed document from an already-resolved YAML tree.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, AppError> {
        serde_yaml::from_value(value)
            .map_err(|e| AppError::Template(format!("template is missing a required section: {e}")))
    }

    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, AppError> {
        serde_yaml::from_str(text)
            .map_err(|e| AppError::Store(format!("cannot parse {}: {e}", origin.display())))
    }

    pub fn to_yaml(&self) -> Result<String, AppError> {
        serde_yaml::to_string(self).map_err(|e| AppError::Store(format!("cannot serialize config: {e}")))
    }
}

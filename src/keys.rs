//! Key Provisioner: generates the node's key pairs and registers them
//! against the provisioned identity.
//!
//! All three pairs are generated first, then each is registered. Both passes
//! run in [`KeyType::ALL`] order and stop at the first failure, so an error
//! always names exactly one key type. Nothing is rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::document::KeyType;
use crate::error::AppError;
use crate::store;
use crate::template;

/// Capability to materialize key files and bind them to the node identity.
pub trait KeyRegistrar {
    /// Write the key pair for `key_type` to `private_key` / `public_key`.
    fn generate_keys(
        &self,
        key_type: KeyType,
        private_key: &Path,
        public_key: &Path,
        config_path: &Path,
    ) -> Result<(), AppError>;

    /// Register the key of `key_type` with the identity named in `config_path`.
    fn register_key(&self, key_type: KeyType, config_path: &Path) -> Result<(), AppError>;
}

/// One provisioned key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairDescriptor {
    pub key_type: KeyType,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    /// Set only after the registrar accepted the key.
    pub registered: bool,
}

impl KeyPairDescriptor {
    pub fn algorithm(&self) -> &'static str {
        self.key_type.algorithm()
    }
}

/// Generate and register every key pair listed in the document at `config_path`.
///
/// The document must already carry `identityId`, and every key path must be
/// rooted at `data_dir`.
pub fn provision_keys(
    registrar: &dyn KeyRegistrar,
    config_path: &Path,
    data_dir: &Path,
) -> Result<Vec<KeyPairDescriptor>, AppError> {
    let document = store::load(config_path)?;
    let identity_id = document.identity_id.as_deref().ok_or_else(|| {
        AppError::Config(format!("{} has no identityId; keys need an identity", config_path.display()))
    })?;
    template::check_paths(&document, data_dir)?;

    let mut descriptors: Vec<KeyPairDescriptor> = KeyType::ALL
        .into_iter()
        .map(|key_type| {
            let paths = document.keys.get(key_type);
            KeyPairDescriptor {
                key_type,
                private_key: PathBuf::from(&paths.private_key),
                public_key: PathBuf::from(&paths.public_key),
                registered: false,
            }
        })
        .collect();

    for key in &descriptors {
        generate(registrar, key, config_path)?;
    }

    for key in &mut descriptors {
        registrar
            .register_key(key.key_type, config_path)
            .inspect_err(|e| error!(key = %key.key_type, "key registration failed: {e}"))?;
        key.registered = true;
        info!(key = %key.key_type, role = key.key_type.registration_role(), %identity_id, "key registered");
    }

    Ok(descriptors)
}

fn generate(registrar: &dyn KeyRegistrar, key: &KeyPairDescriptor, config_path: &Path) -> Result<(), AppError> {
    for path in [&key.private_key, &key.public_key] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AppError::Keys {
                key: key.key_type.section(),
                reason: format!("cannot create {}: {e}", parent.display()),
            })?;
        }
    }

    debug!(
        key = %key.key_type,
        algorithm = key.algorithm(),
        private_key = %key.private_key.display(),
        public_key = %key.public_key.display(),
        "generating key pair"
    );
    registrar
        .generate_keys(key.key_type, &key.private_key, &key.public_key, config_path)
        .inspect_err(|e| error!(key = %key.key_type, "key generation failed: {e}"))?;

    for path in [&key.private_key, &key.public_key] {
        if !path.is_file() {
            return Err(AppError::Keys {
                key: key.key_type.section(),
                reason: format!("generator did not write {}", path.display()),
            });
        }
    }
    info!(key = %key.key_type, algorithm = key.algorithm(), "key pair generated");
    Ok(())
}

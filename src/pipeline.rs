//! Provisioning pipeline.
//!
//! ```text
//! resolve template ─► write config ─► create identity ─┬─► inject identityId ─► provision keys
//!                                                      └─► not created: stop
//! ```
//!
//! The document is passed from stage to stage as a value; each mutation
//! yields the document the next stage consumes. Every stage blocks until its
//! external commands return. A failure stops the run where it happened.

use std::path::PathBuf;

use tracing::info;

use crate::contracts::ContractLookup;
use crate::document::{ConfigDocument, IdentityId};
use crate::error::AppError;
use crate::identity::{self, IdentityAuthority};
use crate::keys::{self, KeyPairDescriptor, KeyRegistrar};
use crate::store;
use crate::template::{self, ResolveOptions, Template};

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub identity_id: IdentityId,
    pub keys: Vec<KeyPairDescriptor>,
    /// Final persisted document.
    pub document: ConfigDocument,
}

/// The external capabilities one provisioning run needs.
pub struct Pipeline<'a> {
    authority: &'a dyn IdentityAuthority,
    registrar: &'a dyn KeyRegistrar,
    contracts: &'a dyn ContractLookup,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        authority: &'a dyn IdentityAuthority,
        registrar: &'a dyn KeyRegistrar,
        contracts: &'a dyn ContractLookup,
    ) -> Self {
        Self { authority, registrar, contracts }
    }

    /// Provision one node from `template`.
    ///
    /// When the identity is not created the config file stays on disk
    /// without `identityId` and no key is generated.
    pub fn run(&self, template: &Template, options: &ResolveOptions) -> Result<ProvisionReport, AppError> {
        let resolved = template::resolve(template, options, self.contracts)?;
        let config_path = resolved.path;

        store::write(&config_path, &resolved.document)?;
        info!(config_path = %config_path.display(), "config file created");

        let identity_id = identity::create_identity(self.authority, &config_path)?;

        let document = store::read_modify_write(&config_path, |doc| {
            doc.identity_id = Some(identity_id.as_str().to_string());
        })?;
        info!(identity_id = %identity_id, "identity written to config");

        let keys = keys::provision_keys(self.registrar, &config_path, &resolved.data_dir)?;

        info!(
            config_path = %config_path.display(),
            identity_id = %identity_id,
            keys = keys.len(),
            "node provisioned"
        );

        Ok(ProvisionReport {
            config_path,
            data_dir: resolved.data_dir,
            identity_id,
            keys,
            document,
        })
    }
}

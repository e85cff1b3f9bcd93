//! Identity Provisioner: mints the node identity through the identity authority.
//!
//! The authority answers with an explicit [`IdentityOutcome`]. A not-created
//! identity becomes [`AppError::IdentityNotCreated`], which halts the
//! pipeline before any key is generated.

use std::path::Path;

use tracing::{error, info};

use crate::document::IdentityId;
use crate::error::AppError;

/// Result of one identity-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityOutcome {
    Created(IdentityId),
    NotCreated { reason: String },
}

/// Capability to mint a new node identity.
///
/// `config_path` points at the persisted document; the authority reads its
/// network and account context from there.
pub trait IdentityAuthority {
    /// `Err` is reserved for failures to reach the authority at all.
    fn create_identity(&self, config_path: &Path) -> Result<IdentityOutcome, AppError>;
}

/// Request a new identity for the node configured at `config_path`.
pub fn create_identity(authority: &dyn IdentityAuthority, config_path: &Path) -> Result<IdentityId, AppError> {
    info!(config_path = %config_path.display(), "requesting node identity");

    match authority.create_identity(config_path)? {
        IdentityOutcome::Created(id) => {
            info!(identity_id = %id, "identity created");
            Ok(id)
        }
        IdentityOutcome::NotCreated { reason } => {
            error!(config_path = %config_path.display(), %reason, "identity was not created");
            Err(AppError::IdentityNotCreated(reason))
        }
    }
}

//! `centrifuge` CLI adapter: the out-of-process identity authority and key registrar.
//!
//! Commands issued (all with `-c <config path>`):
//! ```text
//! centrifuge createidentity -c <config>
//! centrifuge generatekeys   -t <secp256k1|ed25519> -p <private> -q <public> -c <config>
//! centrifuge addkey         -p <ethauth|sign|p2p> -c <config>
//! ```
//! `createidentity` reports its result by writing `newidentity.json`
//! (`{"id": "..."}`) into its working directory. That file is read here and
//! turned into an [`IdentityOutcome`]; nothing past this module sees it.
//!
//! Commands inherit stdio and run without a timeout.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::document::{IdentityId, KeyType};
use crate::error::AppError;
use crate::identity::{IdentityAuthority, IdentityOutcome};
use crate::keys::KeyRegistrar;

/// Artifact `createidentity` leaves in its working directory.
pub const IDENTITY_ARTIFACT: &str = "newidentity.json";

/// Drives the `centrifuge` binary.
#[derive(Debug, Clone)]
pub struct CentrifugeCli {
    binary: PathBuf,
    work_dir: PathBuf,
}

impl CentrifugeCli {
    pub fn new(binary: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), work_dir: work_dir.into() }
    }

    pub fn identity_artifact(&self) -> PathBuf {
        self.work_dir.join(IDENTITY_ARTIFACT)
    }

    fn run(&self, args: &[&OsStr]) -> Result<(String, ExitStatus), AppError> {
        let line = self.describe(args);
        debug!(command = %line, work_dir = %self.work_dir.display(), "running");
        let status = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.work_dir)
            .status()
            .map_err(|e| AppError::Command { command: line.clone(), reason: e.to_string() })?;
        Ok((line, status))
    }

    /// Run and treat a non-zero exit as fatal.
    fn run_checked(&self, args: &[&OsStr]) -> Result<(), AppError> {
        let (command, status) = self.run(args)?;
        if !status.success() {
            return Err(AppError::Command { command, reason: status.to_string() });
        }
        Ok(())
    }

    fn describe(&self, args: &[&OsStr]) -> String {
        std::iter::once(self.binary.as_os_str())
            .chain(args.iter().copied())
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl IdentityAuthority for CentrifugeCli {
    fn create_identity(&self, config_path: &Path) -> Result<IdentityOutcome, AppError> {
        let artifact = self.identity_artifact();
        // A leftover artifact would be read as this run's result.
        if artifact.exists() {
            warn!(path = %artifact.display(), "removing stale identity artifact");
            fs::remove_file(&artifact)?;
        }

        let (command, status) = self.run(&[OsStr::new("createidentity"), OsStr::new("-c"), config_path.as_os_str()])?;
        if !status.success() {
            warn!(%command, %status, "createidentity exited unsuccessfully");
        }

        Ok(read_identity_artifact(&artifact))
    }
}

impl KeyRegistrar for CentrifugeCli {
    fn generate_keys(
        &self,
        key_type: KeyType,
        private_key: &Path,
        public_key: &Path,
        config_path: &Path,
    ) -> Result<(), AppError> {
        self.run_checked(&[
            OsStr::new("generatekeys"),
            OsStr::new("-t"),
            OsStr::new(key_type.algorithm()),
            OsStr::new("-p"),
            private_key.as_os_str(),
            OsStr::new("-q"),
            public_key.as_os_str(),
            OsStr::new("-c"),
            config_path.as_os_str(),
        ])
    }

    fn register_key(&self, key_type: KeyType, config_path: &Path) -> Result<(), AppError> {
        self.run_checked(&[
            OsStr::new("addkey"),
            OsStr::new("-p"),
            OsStr::new(key_type.registration_role()),
            OsStr::new("-c"),
            config_path.as_os_str(),
        ])
    }
}

#[derive(Deserialize)]
struct NewIdentity {
    id: String,
}

/// Interpret the `createidentity` artifact at `path`.
pub fn read_identity_artifact(path: &Path) -> IdentityOutcome {
    let not_created = |reason: String| IdentityOutcome::NotCreated { reason };

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return not_created(format!("{} not found", path.display()));
        }
        Err(e) => return not_created(format!("cannot read {}: {e}", path.display())),
    };

    let parsed: NewIdentity = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => return not_created(format!("cannot parse {}: {e}", path.display())),
    };

    match IdentityId::new(parsed.id) {
        Ok(id) => IdentityOutcome::Created(id),
        Err(e) => not_created(format!("{}: {e}", path.display())),
    }
}

//! Config Store: durable home of the configuration document.
//!
//! Every write replaces the whole file: the YAML is written to a sibling
//! `.tmp` file and renamed over the target, so a reader sees either the old
//! document or the new one. On unix the file is mode 0600 since it carries the
//! account key and password.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::document::ConfigDocument;
use crate::error::AppError;

/// Serialize `document` to `path`, creating or overwriting it.
pub fn write(path: &Path, document: &ConfigDocument) -> Result<(), AppError> {
    let yaml = document.to_yaml()?;
    let tmp = tmp_path(path);

    let mut file = open_for_write(&tmp)
        .map_err(|e| AppError::Store(format!("cannot open {} for write: {e}", tmp.display())))?;
    let written = file.write_all(yaml.as_bytes()).and_then(|_| file.sync_all());
    drop(file);
    written.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::Store(format!("cannot write {}: {e}", tmp.display()))
    })?;

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::Store(format!("cannot replace {}: {e}", path.display()))
    })?;

    debug!(path = %path.display(), bytes = yaml.len(), "config document written");
    Ok(())
}

/// Read a persisted document.
pub fn load(path: &Path) -> Result<ConfigDocument, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::Store(format!("cannot read {}: {e}", path.display())))?;
    ConfigDocument::from_yaml(&text, path)
}

/// Load `path`, apply `mutate`, write the result back and return it.
pub fn read_modify_write<F>(path: &Path, mutate: F) -> Result<ConfigDocument, AppError>
where
    F: FnOnce(&mut ConfigDocument),
{
    let mut document = load(path)?;
    mutate(&mut document);
    write(path, &document)?;
    Ok(document)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn open_for_write(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_for_write(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

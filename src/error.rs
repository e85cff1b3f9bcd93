//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("config store error: {0}")]
    Store(String),

    #[error("identity not created: {0}")]
    IdentityNotCreated(String),

    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    #[error("key provisioning error ({key}): {reason}")]
    Keys { key: &'static str, reason: String },

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("config error"));
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn identity_not_created_display() {
        let e = AppError::IdentityNotCreated("newidentity.json not found".into());
        assert!(e.to_string().starts_with("identity not created"));
        assert!(e.to_string().contains("newidentity.json"));
    }

    #[test]
    fn command_error_names_the_command() {
        let e = AppError::Command {
            command: "centrifuge addkey -p sign".into(),
            reason: "exit status: 2".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("centrifuge addkey -p sign"));
        assert!(msg.contains("exit status: 2"));
    }

    #[test]
    fn keys_error_names_one_key_type() {
        let e = AppError::Keys { key: "p2p", reason: "public key missing".into() };
        assert!(e.to_string().contains("(p2p)"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }
}

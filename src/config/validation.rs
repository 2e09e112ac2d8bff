//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("session.outgoing_queue must be greater than zero")]
    ZeroOutgoingQueue,
    #[error("vhost path must start with '/': {0:?}")]
    InvalidVhostPath(String),
    #[error("duplicate vhost path: {0}")]
    DuplicateVhost(String),
    #[error("vhost {0}: user name is required")]
    MissingUserName(String),
    #[error("vhost {vhost}: duplicate user {user}")]
    DuplicateUser { vhost: String, user: String },
    #[error("vhost {vhost}: user {user} has zero permission")]
    ZeroPermission { vhost: String, user: String },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }
    if config.session.outgoing_queue == 0 {
        errors.push(ValidationError::ZeroOutgoingQueue);
    }

    let mut paths = HashSet::new();
    for vhost in &config.vhost {
        if !vhost.path.starts_with('/') {
            errors.push(ValidationError::InvalidVhostPath(vhost.path.clone()));
        }
        if !paths.insert(vhost.path.as_str()) {
            errors.push(ValidationError::DuplicateVhost(vhost.path.clone()));
        }

        let mut names = HashSet::new();
        for user in &vhost.user {
            if user.name.is_empty() {
                errors.push(ValidationError::MissingUserName(vhost.path.clone()));
            } else if !names.insert(user.name.as_str()) {
                errors.push(ValidationError::DuplicateUser {
                    vhost: vhost.path.clone(),
                    user: user.name.clone(),
                });
            }
            if user.permission == 0 {
                errors.push(ValidationError::ZeroPermission {
                    vhost: vhost.path.clone(),
                    user: user.name.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

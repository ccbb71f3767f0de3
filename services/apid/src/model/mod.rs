//! Resource model definitions.
//!
//! # Purpose
//! Defines the [`Resource`] contract shared by every configuration type the API
//! serves, plus the check and handler records themselves.
//!
//! # Key invariants
//! - A resource is identified by its `name`, which is also its store key.
//! - A resource is never persisted unless [`Resource::validate`] succeeds.
mod check;
mod handler;

pub use check::CheckConfig;
pub use handler::{Handler, HandlerSocket, HandlerType};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Scope assigned to resources that do not name an environment or organization.
pub const DEFAULT_SCOPE: &str = "default";

/// Self-validation failure for a decoded resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A named, user-managed configuration record exposed through the API.
///
/// Implementors describe one resource type: `KIND` is the collection path
/// segment (`checks`, `handlers`) and the object prefix used in permissions.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    fn validate(&self) -> Result<(), ValidationError>;
}

/// Validate a resource name: non-empty, only ASCII word characters, dots, and dashes.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("name cannot be empty"));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
    if !valid {
        return Err(ValidationError::new(format!(
            "name must contain only letters, digits, '_', '.', or '-': {name}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_scope(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(format!("{field} must be set")));
    }
    Ok(())
}

pub(crate) fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_name_accepts_word_dot_dash() {
        assert!(validate_name("disk_usage.root-fs").is_ok());
        assert!(validate_name("check1").is_ok());
    }

    #[test]
    fn validate_name_rejects_empty_and_separators() {
        assert!(validate_name("").is_err());
        assert!(validate_name("disk usage").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a:b").is_err());
    }

    #[test]
    fn validate_name_is_ascii_only() {
        assert!(validate_name("café").is_err());
        assert!(validate_name("диск").is_err());
        assert!(validate_name("cafe").is_ok());
    }
}

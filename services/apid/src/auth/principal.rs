//! Principal identity model.
//!
//! # Purpose
//! Represents the authenticated caller and the permissions granted to it,
//! derived from verified token claims.
use crate::auth::abilities::{Permission, parse_permission};
use crate::auth::token::TokenClaims;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: String,
    permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(subject: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            subject: subject.into(),
            permissions,
        }
    }

    /// Build a principal from verified claims, dropping malformed permissions.
    pub fn from_claims(claims: &TokenClaims) -> Self {
        let permissions = claims
            .perms
            .iter()
            .filter_map(|raw| match parse_permission(raw) {
                Ok(permission) => Some(permission),
                Err(err) => {
                    tracing::warn!(
                        subject = %claims.sub,
                        permission = %raw,
                        error = %err,
                        "ignoring malformed permission"
                    );
                    None
                }
            })
            .collect();
        Self::new(claims.sub.clone(), permissions)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }
}

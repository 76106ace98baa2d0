//! Error types for policy configuration
//!
//! Every error raised by this crate is a configuration error: the scope
//! catalog or a role definition is malformed. They are raised before any
//! remote call is made.

use thiserror::Error;

/// Policy configuration error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Scope value is not of the form `<code>:<resource>`
    #[error("Invalid scope value '{value}': {reason}")]
    InvalidScope {
        /// The offending scope value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Scope value appears more than once in a catalog
    #[error("Duplicate scope value: {0}")]
    DuplicateScope(String),

    /// Rule set is not a well-formed mapping
    #[error("Malformed rule set: {0}")]
    MalformedRuleSet(String),

    /// Role definition is invalid
    #[error("Invalid role definition '{role}': {reason}")]
    InvalidRole {
        /// Role name (may be empty).
        role: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Role name appears more than once
    #[error("Duplicate role definition: {0}")]
    DuplicateRole(String),

    /// Policy document could not be decoded
    #[error("Invalid policy document: {0}")]
    InvalidDocument(String),
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

impl PolicyError {
    pub(crate) fn invalid_scope(value: impl Into<String>, reason: impl Into<String>) -> Self {
        PolicyError::InvalidScope {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_role(role: impl Into<String>, reason: impl Into<String>) -> Self {
        PolicyError::InvalidRole {
            role: role.into(),
            reason: reason.into(),
        }
    }

    /// Get error code for diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            PolicyError::InvalidScope { .. } => "INVALID_SCOPE",
            PolicyError::DuplicateScope(_) => "DUPLICATE_SCOPE",
            PolicyError::MalformedRuleSet(_) => "MALFORMED_RULE_SET",
            PolicyError::InvalidRole { .. } => "INVALID_ROLE",
            PolicyError::DuplicateRole(_) => "DUPLICATE_ROLE",
            PolicyError::InvalidDocument(_) => "INVALID_DOCUMENT",
        }
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::InvalidDocument(err.to_string())
    }
}

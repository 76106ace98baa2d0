//! Error types for token verification and authorization
//!
//! Authorization decisions are returned as values (see
//! [`Decision`](crate::enforcer::Decision)); these errors are what a caller
//! gets when it converts a denial into a `Result`, or when a token cannot be
//! verified.

use thiserror::Error;

/// Authentication and authorization error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token was presented
    #[error("JWT token missing")]
    MissingToken,

    /// JWT token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// JWT token is invalid (malformed, bad signature, wrong issuer, etc.)
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Caller is not authenticated for this operation
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Why the request was rejected.
        reason: String,
        /// Scopes the endpoint requires.
        required_scopes: Vec<String>,
    },

    /// Caller is authenticated but lacks required scopes
    #[error("Forbidden: {reason} (required: {})", .required_scopes.join(" "))]
    Forbidden {
        /// Why the request was rejected.
        reason: String,
        /// Scopes the endpoint requires.
        required_scopes: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Denials and bad tokens are expected outcomes, not server faults.
    pub fn is_server_error(&self) -> bool {
        matches!(self, AuthError::Internal(_) | AuthError::ConfigError(_))
    }

    /// Check if this error is a token verification failure.
    pub fn is_verification_error(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken | AuthError::TokenExpired | AuthError::InvalidToken(_)
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidToken(_)
            | AuthError::Unauthorized { .. } => 401,

            AuthError::Forbidden { .. } => 403,

            AuthError::ConfigError(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::Unauthorized { .. } => "UNAUTHORIZED",
            AuthError::Forbidden { .. } => "FORBIDDEN",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Scopes attached to a denial, if any.
    pub fn required_scopes(&self) -> &[String] {
        match self {
            AuthError::Unauthorized { required_scopes, .. }
            | AuthError::Forbidden { required_scopes, .. } => required_scopes,
            _ => &[],
        }
    }
}

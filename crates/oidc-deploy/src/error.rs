//! Error types for provider calls and deployment runs.

use oidc_policy::PolicyError;
use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by a [`ManagementApi`](crate::provider::ManagementApi).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    /// HTTP status associated with the error, if the provider answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            ProviderError::AuthenticationFailed => Some(401),
            ProviderError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Get error code for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProviderError::RequestFailed(_) => "REQUEST_FAILED",
            ProviderError::Api { .. } => "API_ERROR",
            ProviderError::InvalidResponse(_) => "INVALID_RESPONSE",
            ProviderError::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ProviderError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Deployment stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Roles rule
    RolesRule,
    /// API (resource server)
    Api,
    /// Client application
    Client,
    /// Database connection
    Connection,
    /// Role reconciliation
    Roles,
}

impl Stage {
    /// Get the stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RolesRule => "roles rule",
            Stage::Api => "API",
            Stage::Client => "client",
            Stage::Connection => "connection",
            Stage::Roles => "roles",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role whose reconciliation failed.
#[derive(Debug)]
pub struct RoleFailure {
    /// Role name.
    pub role: String,
    /// The provider error that stopped it.
    pub error: ProviderError,
}

impl fmt::Display for RoleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.error)
    }
}

/// Deployment errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Invalid deployment configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid scope catalog or role definitions.
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// A provider call failed during a sequential stage.
    #[error("{stage} stage failed: {source}")]
    Remote {
        /// Stage that failed.
        stage: Stage,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },

    /// One or more roles failed to reconcile.
    #[error("Reconciliation failed for {} role(s): {}", .failures.len(), join_failures(.failures))]
    Reconciliation {
        /// Every failed role with its error.
        failures: Vec<RoleFailure>,
    },
}

fn join_failures(failures: &[RoleFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

impl DeployError {
    /// Wrap a provider error with the stage it occurred in.
    pub fn remote(stage: Stage, source: ProviderError) -> Self {
        DeployError::Remote { stage, source }
    }

    /// Check if the error was raised before any remote call.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, DeployError::Config(_) | DeployError::Policy(_))
    }

    /// Get error code for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            DeployError::Config(_) => "CONFIGURATION_ERROR",
            DeployError::Policy(e) => e.error_code(),
            DeployError::Remote { .. } => "REMOTE_API_ERROR",
            DeployError::Reconciliation { .. } => "RECONCILIATION_ERROR",
        }
    }
}

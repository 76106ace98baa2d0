//! Deployment configuration.
//!
//! Identifies the target provider tenant and the environment being
//! provisioned in it. Credentials are supplied at runtime, typically from
//! environment variables, and never compiled in.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default name of the rule that copies assigned roles into the id token.
pub const DEFAULT_ROLES_RULE_NAME: &str = "ROLES-RULE";

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is missing or empty.
    #[error("Missing required configuration value: {0}")]
    MissingValue(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Provider management API endpoint and machine-to-machine credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    /// Tenant domain, e.g. "https://tenant.auth0.com". A bare host name is
    /// treated as https.
    pub domain: String,

    /// Client id of the management application.
    pub client_id: String,

    /// Client secret of the management application.
    pub client_secret: String,
}

impl std::fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl ProviderEndpoint {
    /// Base URL of the tenant without a trailing slash.
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        }
    }

    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// Audience of management API tokens.
    pub fn management_audience(&self) -> String {
        self.url("/api/v2/")
    }
}

/// Configuration for one deployment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Provider tenant and credentials.
    pub provider: ProviderEndpoint,

    /// Environment name; used as the API, client and connection name.
    pub environment_name: String,

    /// Environment base URL; used as the API identifier and the roles claim
    /// namespace.
    pub environment_base_url: String,

    /// URL of the client application; callback and logout URLs hang off it.
    pub environment_client_url: String,

    /// Name of the roles rule.
    pub roles_rule_name: String,

    /// Provider request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum number of roles reconciled concurrently.
    pub role_concurrency: usize,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            provider: ProviderEndpoint::default(),
            environment_name: String::new(),
            environment_base_url: String::new(),
            environment_client_url: String::new(),
            roles_rule_name: DEFAULT_ROLES_RULE_NAME.to_string(),
            request_timeout_secs: 30,
            role_concurrency: 4,
        }
    }
}

impl DeployConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AUTH0_DOMAIN`: provider tenant domain
    /// - `CLIENT_ID`: management application client id
    /// - `CLIENT_SECRET`: management application client secret
    /// - `ENVIRONMENT_NAME`: environment name
    /// - `ENVIRONMENT_BASE_URL`: API identifier and roles claim namespace
    /// - `ENVIRONMENT_CLIENT_URL`: client application URL
    /// - `ROLES_RULE_NAME`: roles rule name (default: ROLES-RULE)
    /// - `PROVIDER_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    /// - `ROLE_CONCURRENCY`: concurrent role reconciliations (default: 4)
    pub fn from_env() -> Self {
        let default = Self::default();
        let var = |key: &str| std::env::var(key).unwrap_or_default();

        Self {
            provider: ProviderEndpoint {
                domain: var("AUTH0_DOMAIN"),
                client_id: var("CLIENT_ID"),
                client_secret: var("CLIENT_SECRET"),
            },
            environment_name: var("ENVIRONMENT_NAME"),
            environment_base_url: var("ENVIRONMENT_BASE_URL"),
            environment_client_url: var("ENVIRONMENT_CLIENT_URL"),
            roles_rule_name: std::env::var("ROLES_RULE_NAME").unwrap_or(default.roles_rule_name),
            request_timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.request_timeout_secs),
            role_concurrency: std::env::var("ROLE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.role_concurrency),
        }
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Effective role concurrency, never below one.
    pub fn concurrency(&self) -> usize {
        self.role_concurrency.max(1)
    }

    /// Validate that the environment identity is complete.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("domain", &self.provider.domain),
            ("client_id", &self.provider.client_id),
            ("client_secret", &self.provider.client_secret),
            ("environment_name", &self.environment_name),
            ("environment_base_url", &self.environment_base_url),
            ("environment_client_url", &self.environment_client_url),
            ("roles_rule_name", &self.roles_rule_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingValue(key.to_string()));
            }
        }

        for (key, value) in [
            ("environment_base_url", &self.environment_base_url),
            ("environment_client_url", &self.environment_client_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected an http(s) URL, got {:?}", value),
                });
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

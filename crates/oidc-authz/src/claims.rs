//! Access token claims
//!
//! This module defines the decoded claims of a verified access token. Only
//! the registered claims are typed; everything else, including the granted
//! permissions claim and namespaced role claims, is kept as raw JSON.

use chrono::{DateTime, Utc};
use oidc_policy::ScopeSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default name of the claim carrying granted permissions.
pub const DEFAULT_SCOPE_CLAIM: &str = "permissions";

/// Decoded claims of a verified access token.
///
/// # Example
///
/// ```rust
/// use oidc_authz::claims::TokenClaims;
///
/// let claims = TokenClaims::new("user-1", "https://idp.example/", chrono::Duration::minutes(10))
///     .with_claim("permissions", serde_json::json!("r:things w:things"));
///
/// assert!(claims.granted_scopes("permissions").has("w:things"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    // Standard JWT claims (RFC 7519)
    /// Subject
    pub sub: String,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Audience
    #[serde(default, skip_serializing_if = "Audience::is_empty")]
    pub aud: Audience,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// All remaining claims
    #[serde(default, flatten)]
    pub custom: HashMap<String, Value>,
}

impl TokenClaims {
    /// Create claims for a subject that expire after `duration`.
    pub fn new(sub: impl Into<String>, iss: impl Into<String>, duration: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            iss: iss.into(),
            aud: Audience::default(),
            exp: (now + duration).timestamp(),
            iat: Some(now.timestamp()),
            custom: HashMap::new(),
        }
    }

    /// Set the audience.
    pub fn with_audience(mut self, aud: impl Into<String>) -> Self {
        self.aud = Audience::One(aud.into());
        self
    }

    /// Set an arbitrary claim.
    pub fn with_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.custom.insert(name.into(), value);
        self
    }

    /// Get a raw claim.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.custom.get(name)
    }

    /// Scopes granted by the named claim.
    ///
    /// The claim may be a space-delimited string or an array of strings.
    /// A missing claim, any other shape, and non-string array items grant
    /// nothing.
    pub fn granted_scopes(&self, claim: &str) -> ScopeSet {
        match self.custom.get(claim) {
            Some(Value::String(scopes)) => ScopeSet::from_delimited(scopes),
            Some(Value::Array(scopes)) => scopes
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .collect(),
            _ => ScopeSet::new(),
        }
    }

    /// Role names written by the provider's roles rule into the
    /// `<namespace>/roles` claim.
    pub fn roles(&self, namespace: &str) -> Vec<String> {
        let claim = format!("{}/roles", namespace.trim_end_matches('/'));
        match self.custom.get(&claim) {
            Some(Value::Array(roles)) => roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Get expiration as DateTime.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// The `aud` claim: a single string or a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience.
    One(String),
    /// Several audiences.
    Many(Vec<String>),
}

impl Default for Audience {
    fn default() -> Self {
        Audience::Many(Vec::new())
    }
}

impl Audience {
    /// Check whether `aud` is among the audiences.
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::One(one) => one == aud,
            Audience::Many(many) => many.iter().any(|a| a == aud),
        }
    }

    /// Check if no audience is present.
    pub fn is_empty(&self) -> bool {
        match self {
            Audience::One(_) => false,
            Audience::Many(many) => many.is_empty(),
        }
    }
}

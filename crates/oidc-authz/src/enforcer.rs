//! Request-time scope enforcement
//!
//! An endpoint declares the scopes it requires; a request presents a token.
//! The enforcer compares the token's granted-scope claim against the
//! requirement with all-of semantics and returns a [`Decision`].
//!
//! ```text
//! Unchecked --verify--> TokenValidated --match--> ScopeChecked
//!     |                      |                         |
//!     +-- no token / bad ----+--> Unauthorized         +--> Allow | Forbidden
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use crate::claims::{TokenClaims, DEFAULT_SCOPE_CLAIM};
use crate::error::{AuthError, AuthResult};
use crate::verifier::TokenVerifier;

/// Security scheme key that carries scope requirements.
pub const OPENID_CONNECT_SCHEME: &str = "openIdConnect";

const MISSING_TOKEN_REASON: &str = "JWT Token missing.";
const INSUFFICIENT_SCOPE_REASON: &str = "Insufficient authorization.";

/// Scopes an endpoint requires, all of which must be granted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredScopes(Vec<String>);

impl RequiredScopes {
    /// Create a requirement from scope names. Empty names are dropped.
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            scopes
                .into_iter()
                .map(Into::into)
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// A requirement that every request satisfies.
    pub fn none() -> Self {
        Self::default()
    }

    /// Extract the requirement from an endpoint's security-requirement list.
    ///
    /// The first entry keyed by `openIdConnect` wins; entries for other
    /// schemes are ignored. No such entry means nothing is required.
    pub fn from_security(security: &[HashMap<String, Vec<String>>]) -> Self {
        security
            .iter()
            .find_map(|requirement| requirement.get(OPENID_CONNECT_SCHEME))
            .map(|scopes| Self::new(scopes.iter().cloned()))
            .unwrap_or_default()
    }

    /// Check whether nothing is required.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The required scope names.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consume into the scope names.
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Every required scope is granted.
    Allow,

    /// No usable token was presented.
    Unauthorized {
        /// Why the request was rejected.
        reason: String,
        /// Scopes the endpoint requires.
        required_scopes: Vec<String>,
    },

    /// The token is valid but lacks a required scope.
    Forbidden {
        /// Why the request was rejected.
        reason: String,
        /// Scopes the endpoint requires.
        required_scopes: Vec<String>,
    },
}

impl Decision {
    /// Check if the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// HTTP status for the decision.
    pub fn status_code(&self) -> u16 {
        match self {
            Decision::Allow => 200,
            Decision::Unauthorized { .. } => 401,
            Decision::Forbidden { .. } => 403,
        }
    }

    /// Convert a denial into an [`AuthError`].
    pub fn into_result(self) -> AuthResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Unauthorized {
                reason,
                required_scopes,
            } => Err(AuthError::Unauthorized {
                reason,
                required_scopes,
            }),
            Decision::Forbidden {
                reason,
                required_scopes,
            } => Err(AuthError::Forbidden {
                reason,
                required_scopes,
            }),
        }
    }
}

/// Enforcer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnforcerConfig {
    /// Claim holding granted scopes
    pub scope_claim: String,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            scope_claim: DEFAULT_SCOPE_CLAIM.to_string(),
        }
    }
}

/// Decides whether a request's token satisfies an endpoint's requirement.
///
/// # Example
///
/// ```rust
/// use oidc_authz::claims::TokenClaims;
/// use oidc_authz::enforcer::{AuthorizationEnforcer, RequiredScopes};
///
/// let enforcer = AuthorizationEnforcer::default();
/// let required = RequiredScopes::new(["r:things"]);
/// let claims = TokenClaims::new("user-1", "https://idp.example/", chrono::Duration::minutes(5))
///     .with_claim("permissions", serde_json::json!(["r:things", "w:things"]));
///
/// assert!(enforcer.decide(&required, Some(&claims)).is_allowed());
/// assert_eq!(enforcer.decide(&required, None).status_code(), 401);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuthorizationEnforcer {
    config: EnforcerConfig,
}

impl AuthorizationEnforcer {
    /// Create an enforcer.
    pub fn new(config: EnforcerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    /// Decide on already-verified claims.
    pub fn decide(&self, required: &RequiredScopes, claims: Option<&TokenClaims>) -> Decision {
        if required.is_empty() {
            return Decision::Allow;
        }

        let Some(claims) = claims else {
            return Decision::Unauthorized {
                reason: MISSING_TOKEN_REASON.to_string(),
                required_scopes: required.as_slice().to_vec(),
            };
        };

        let granted = claims.granted_scopes(&self.config.scope_claim);
        let missing = granted.missing(required.as_slice());
        if missing.is_empty() {
            return Decision::Allow;
        }

        debug!(sub = %claims.sub, missing = ?missing, "Token lacks required scopes");
        Decision::Forbidden {
            reason: INSUFFICIENT_SCOPE_REASON.to_string(),
            required_scopes: required.as_slice().to_vec(),
        }
    }

    /// Verify a raw bearer token and decide.
    ///
    /// Verification is skipped when nothing is required. A verification
    /// failure yields `Unauthorized` carrying the verifier's message.
    #[instrument(skip(self, verifier, raw_token), fields(required = ?required.as_slice()))]
    pub async fn authorize(
        &self,
        verifier: &dyn TokenVerifier,
        required: &RequiredScopes,
        raw_token: Option<&str>,
    ) -> Decision {
        if required.is_empty() {
            return Decision::Allow;
        }

        let Some(raw_token) = raw_token.filter(|t| !t.is_empty()) else {
            return self.decide(required, None);
        };

        match verifier.validate(raw_token).await {
            Ok(claims) => self.decide(required, Some(&claims)),
            Err(e) => {
                warn!(error = %e, "Token verification failed");
                Decision::Unauthorized {
                    reason: e.to_string(),
                    required_scopes: required.as_slice().to_vec(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;

    fn claims_with(value: serde_json::Value) -> TokenClaims {
        TokenClaims::new("user-1", "https://idp.example/", Duration::minutes(5))
            .with_claim(DEFAULT_SCOPE_CLAIM, value)
    }

    struct StaticVerifier(AuthResult<TokenClaims>);

    #[async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn validate(&self, _raw_token: &str) -> AuthResult<TokenClaims> {
            self.0.clone()
        }
    }

    #[test]
    fn test_nothing_required_always_allows() {
        let enforcer = AuthorizationEnforcer::default();
        assert_eq!(enforcer.decide(&RequiredScopes::none(), None), Decision::Allow);
        assert_eq!(
            enforcer.decide(&RequiredScopes::none(), Some(&claims_with(json!(null)))),
            Decision::Allow
        );
    }

    #[test]
    fn test_all_of_semantics() {
        let enforcer = AuthorizationEnforcer::default();
        let required = RequiredScopes::new(["r:x", "w:x"]);

        let partial = claims_with(json!("r:x"));
        let decision = enforcer.decide(&required, Some(&partial));
        assert_eq!(
            decision,
            Decision::Forbidden {
                reason: "Insufficient authorization.".to_string(),
                required_scopes: vec!["r:x".to_string(), "w:x".to_string()],
            }
        );
        assert_eq!(decision.status_code(), 403);

        let full = claims_with(json!("r:x w:x r:y"));
        assert!(enforcer.decide(&required, Some(&full)).is_allowed());
    }

    #[test]
    fn test_string_and_array_claims_are_equivalent() {
        let enforcer = AuthorizationEnforcer::default();
        let required = RequiredScopes::new(["r:x", "w:x"]);

        let as_string = enforcer.decide(&required, Some(&claims_with(json!("r:x w:x"))));
        let as_array = enforcer.decide(&required, Some(&claims_with(json!(["r:x", "w:x"]))));
        assert_eq!(as_string, as_array);
        assert!(as_string.is_allowed());
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let enforcer = AuthorizationEnforcer::default();
        let required = RequiredScopes::new(["r:x"]);

        let decision = enforcer.decide(&required, None);
        assert_eq!(decision.status_code(), 401);
        match decision.into_result() {
            Err(AuthError::Unauthorized {
                reason,
                required_scopes,
            }) => {
                assert_eq!(reason, "JWT Token missing.");
                assert_eq!(required_scopes, vec!["r:x".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_claim_shape_grants_nothing() {
        let enforcer = AuthorizationEnforcer::default();
        let required = RequiredScopes::new(["r:x"]);
        let decision = enforcer.decide(&required, Some(&claims_with(json!({ "r:x": true }))));
        assert_eq!(decision.status_code(), 403);
    }

    #[test]
    fn test_custom_scope_claim() {
        let enforcer = AuthorizationEnforcer::new(EnforcerConfig {
            scope_claim: "scope".to_string(),
        });
        let required = RequiredScopes::new(["r:x"]);
        let claims = TokenClaims::new("user-1", "iss", Duration::minutes(5))
            .with_claim("scope", json!("openid r:x"));
        assert!(enforcer.decide(&required, Some(&claims)).is_allowed());
        let decision = enforcer.decide(&required, Some(&claims_with(json!("r:x"))));
        assert_eq!(decision.status_code(), 403);
    }

    #[test]
    fn test_from_security_picks_openid_connect() {
        let security: Vec<HashMap<String, Vec<String>>> = serde_json::from_value(json!([
            { "apiKey": [] },
            { "openIdConnect": ["r:accounts", "w:accounts"] }
        ]))
        .unwrap();

        let required = RequiredScopes::from_security(&security);
        assert_eq!(required.as_slice(), ["r:accounts", "w:accounts"]);

        assert!(RequiredScopes::from_security(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_authorize_verifier_failure_is_unauthorized() {
        let enforcer = AuthorizationEnforcer::default();
        let verifier = StaticVerifier(Err(AuthError::TokenExpired));
        let required = RequiredScopes::new(["r:x"]);

        let decision = enforcer.authorize(&verifier, &required, Some("abc")).await;
        assert_eq!(
            decision,
            Decision::Unauthorized {
                reason: "Token has expired".to_string(),
                required_scopes: vec!["r:x".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_authorize_runs_scope_check_after_verification() {
        let enforcer = AuthorizationEnforcer::default();
        let verifier = StaticVerifier(Ok(claims_with(json!(["r:x"]))));

        let allowed = enforcer
            .authorize(&verifier, &RequiredScopes::new(["r:x"]), Some("abc"))
            .await;
        assert!(allowed.is_allowed());

        let forbidden = enforcer
            .authorize(&verifier, &RequiredScopes::new(["w:x"]), Some("abc"))
            .await;
        assert_eq!(forbidden.status_code(), 403);

        let missing = enforcer
            .authorize(&verifier, &RequiredScopes::new(["w:x"]), None)
            .await;
        assert_eq!(missing.status_code(), 401);
    }

    #[tokio::test]
    async fn test_authorize_skips_verification_when_nothing_required() {
        let enforcer = AuthorizationEnforcer::default();
        let verifier = StaticVerifier(Err(AuthError::InvalidToken("bad".to_string())));
        let decision = enforcer
            .authorize(&verifier, &RequiredScopes::none(), Some("garbage"))
            .await;
        assert!(decision.is_allowed());
    }
}

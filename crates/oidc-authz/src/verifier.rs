//! Token verification
//!
//! Verification is an external collaborator of the enforcer: anything that
//! can turn a raw bearer token into [`TokenClaims`] implements
//! [`TokenVerifier`]. A [`JwtVerifier`] over the jsonwebtoken crate is
//! provided for statically configured keys; fetching and rotating JWKS keys
//! is left to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::claims::TokenClaims;
use crate::error::{AuthError, AuthResult};

#[cfg(feature = "jwt")]
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};

/// Validates raw bearer tokens.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a raw token and return its claims.
    async fn validate(&self, raw_token: &str) -> AuthResult<TokenClaims>;
}

/// Extract the token from an `Authorization` header value.
///
/// Returns `None` unless the value uses the `Bearer` scheme with a
/// non-empty token.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Configuration for [`JwtVerifier`].
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC algorithms (HS256, HS384, HS512)
    pub secret: Option<String>,

    /// Public key (PEM) for RSA/EC algorithms
    pub public_key: Option<String>,

    /// Algorithm to accept
    pub algorithm: JwtAlgorithm,

    /// Expected issuer (`iss`)
    pub issuer: String,

    /// Expected audience (`aud`), usually the API identifier
    pub audience: Vec<String>,

    /// Allowed clock skew in seconds
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            public_key: None,
            algorithm: JwtAlgorithm::RS256,
            issuer: String::new(),
            audience: Vec::new(),
            leeway_secs: 60,
        }
    }
}

/// Supported JWT algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
}

#[cfg(feature = "jwt")]
impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
            JwtAlgorithm::RS256 => Algorithm::RS256,
            JwtAlgorithm::RS384 => Algorithm::RS384,
            JwtAlgorithm::RS512 => Algorithm::RS512,
            JwtAlgorithm::ES256 => Algorithm::ES256,
            JwtAlgorithm::ES384 => Algorithm::ES384,
        }
    }
}

/// Verifies JWT access tokens against a statically configured key.
#[cfg(feature = "jwt")]
pub struct JwtVerifier {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

#[cfg(feature = "jwt")]
impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithm", &self.config.algorithm)
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(feature = "jwt")]
impl JwtVerifier {
    /// Create a verifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigError`] when the key required by the
    /// algorithm is missing or unreadable, or the issuer is empty.
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        if config.issuer.is_empty() {
            return Err(AuthError::ConfigError("Issuer is required".to_string()));
        }
        let decoding_key = Self::create_decoding_key(&config)?;
        Ok(Self {
            config,
            decoding_key,
        })
    }

    fn create_decoding_key(config: &JwtConfig) -> AuthResult<DecodingKey> {
        match config.algorithm {
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512 => {
                let secret = config
                    .secret
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Secret required for HMAC".to_string()))?;
                Ok(DecodingKey::from_secret(secret.as_bytes()))
            }
            JwtAlgorithm::RS256 | JwtAlgorithm::RS384 | JwtAlgorithm::RS512 => {
                let key = config
                    .public_key
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Public key required for RSA".to_string()))?;
                DecodingKey::from_rsa_pem(key.as_bytes())
                    .map_err(|e| AuthError::ConfigError(format!("Invalid RSA public key: {}", e)))
            }
            JwtAlgorithm::ES256 | JwtAlgorithm::ES384 => {
                let key = config
                    .public_key
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Public key required for EC".to_string()))?;
                DecodingKey::from_ec_pem(key.as_bytes())
                    .map_err(|e| AuthError::ConfigError(format!("Invalid EC public key: {}", e)))
            }
        }
    }

    /// Validate and decode a token synchronously.
    pub fn validate_token(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(self.config.algorithm.into());
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = self.config.leeway_secs;
        if self.config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.config.audience);
        }

        let token_data: TokenData<TokenClaims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AuthError::InvalidToken("Malformed token".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("Invalid signature".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    AuthError::InvalidToken("Invalid issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    AuthError::InvalidToken("Invalid audience".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => {
                    AuthError::InvalidToken("Invalid algorithm".to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    /// Get the configuration.
    pub fn config(&self) -> &JwtConfig {
        &self.config
    }
}

#[cfg(feature = "jwt")]
#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn validate(&self, raw_token: &str) -> AuthResult<TokenClaims> {
        self.validate_token(raw_token)
    }
}


#[cfg(all(test, feature = "jwt"))]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret-with-enough-entropy";
    const ISSUER: &str = "https://tenant.example/";
    const AUDIENCE: &str = "http://api.local";

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(JwtConfig {
            secret: Some(SECRET.to_string()),
            algorithm: JwtAlgorithm::HS256,
            issuer: ISSUER.to_string(),
            audience: vec![AUDIENCE.to_string()],
            ..Default::default()
        })
        .unwrap()
    }

    fn sign(claims: &TokenClaims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims() -> TokenClaims {
        TokenClaims::new("user-1", ISSUER, Duration::minutes(10))
            .with_audience(AUDIENCE)
            .with_claim("permissions", json!(["r:things"]))
    }

    #[tokio::test]
    async fn test_valid_token() {
        let token = sign(&claims(), SECRET);
        let decoded = verifier().validate(&token).await.unwrap();
        assert_eq!(decoded.sub, "user-1");
        assert!(decoded.granted_scopes("permissions").has("r:things"));
    }

    #[test]
    fn test_wrong_signature() {
        let token = sign(&claims(), "another-secret-entirely");
        assert_eq!(
            verifier().validate_token(&token).unwrap_err(),
            AuthError::InvalidToken("Invalid signature".to_string())
        );
    }

    #[test]
    fn test_expired_token() {
        let mut expired = claims();
        expired.exp = chrono::Utc::now().timestamp() - 3600;
        let token = sign(&expired, SECRET);
        assert_eq!(verifier().validate_token(&token).unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn test_wrong_audience() {
        let token = sign(&claims().with_audience("http://elsewhere"), SECRET);
        assert!(matches!(
            verifier().validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_garbage_token() {
        assert!(verifier().validate_token("not-a-jwt").is_err());
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = JwtVerifier::new(JwtConfig {
            issuer: ISSUER.to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, AuthError::ConfigError(_)));
    }
}

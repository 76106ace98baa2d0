//! # OIDC Scope Enforcement
//!
//! This crate decides, at request time, whether a caller's access token
//! carries the scopes an endpoint requires. It consumes the same
//! `<action>:<resource>` permission names that `oidc-policy` produces and
//! has no runtime dependency on resolution or reconciliation.
//!
//! ## Overview
//!
//! - **Claims**: decoded access token claims and granted-scope extraction
//! - **Verification**: the [`TokenVerifier`] seam and a JWT implementation
//! - **Enforcement**: all-of scope matching yielding a [`Decision`]
//!
//! ## Features
//!
//! - `jwt` (default): [`JwtVerifier`] using jsonwebtoken
//!
//! ## Usage
//!
//! ```rust
//! use oidc_authz::{AuthorizationEnforcer, Decision, RequiredScopes, TokenClaims};
//!
//! let enforcer = AuthorizationEnforcer::default();
//! let required = RequiredScopes::new(["r:accounts", "w:accounts"]);
//!
//! let claims = TokenClaims::new("user-1", "https://idp.example/", chrono::Duration::minutes(5))
//!     .with_claim("permissions", serde_json::json!("r:accounts"));
//!
//! match enforcer.decide(&required, Some(&claims)) {
//!     Decision::Forbidden { required_scopes, .. } => assert_eq!(required_scopes.len(), 2),
//!     other => panic!("unexpected decision: {:?}", other),
//! }
//! ```

pub mod claims;
pub mod enforcer;
pub mod error;
pub mod verifier;

// Re-export main types
pub use claims::{Audience, TokenClaims, DEFAULT_SCOPE_CLAIM};
pub use enforcer::{AuthorizationEnforcer, Decision, EnforcerConfig, RequiredScopes};
pub use error::{AuthError, AuthResult};
pub use verifier::{bearer_token, JwtAlgorithm, JwtConfig, TokenVerifier};

#[cfg(feature = "jwt")]
pub use verifier::JwtVerifier;

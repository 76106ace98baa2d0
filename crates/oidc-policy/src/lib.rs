//! # OIDC Scope Policy
//!
//! This crate turns a declarative scope catalog and role definitions into the
//! concrete permission sets an OpenID Connect provider stores on its roles.
//! It performs no I/O.
//!
//! ## Overview
//!
//! - **Scopes**: `(action, resource)` pairs written as `r:accounts`, `w:accounts`
//! - **Rule sets**: include/exclude selectors over the catalog
//! - **Roles**: role definitions and their resolved scopes
//! - **Permissions**: provider-native `(API identifier, scope)` grants and the
//!   scope sets tokens carry
//!
//! ## Architecture
//!
//! ```text
//! ScopeCatalog + RoleDefinition --resolve--> ResolvedRole --permissions(api)--> [Permission]
//!
//! Precedence per scope:
//!   include: ALL > action type > resource (nested rules match named actions only)
//!   exclude: resource clause, else action type clause (never both)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use oidc_policy::{resolve, RoleDefinition, RuleSet, ScopeCatalog};
//! use oidc_policy::actions::ActionType;
//!
//! let catalog = ScopeCatalog::from_resources(["accounts", "users"]).unwrap();
//!
//! let operator = RoleDefinition::new("operator", RuleSet::new().with_action(ActionType::Read));
//! let resolved = resolve(&operator, &catalog).unwrap();
//! assert_eq!(resolved.scope_names(), vec!["r:accounts", "r:users"]);
//!
//! let permissions = resolved.permissions("https://api.example");
//! assert_eq!(permissions[0].resource_server_identifier, "https://api.example");
//! ```

pub mod actions;
pub mod document;
pub mod error;
pub mod permissions;
pub mod resolver;
pub mod roles;
pub mod rules;
pub mod scopes;

// Re-export main types for convenience
pub use actions::ActionType;
pub use document::PolicyDocument;
pub use error::{PolicyError, PolicyResult};
pub use permissions::{Permission, ScopeSet};
pub use resolver::{is_granted, resolve, resolve_all};
pub use roles::{GrantedScope, ResolvedRole, RoleDefinition};
pub use rules::{ResourceClause, RuleEntry, RuleSet, WILDCARD_KEY};
pub use scopes::{CatalogEntry, Scope, ScopeCatalog};

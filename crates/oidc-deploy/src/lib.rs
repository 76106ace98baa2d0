//! # OIDC Deployment
//!
//! Pushes resolved roles and their supporting resources to an identity
//! provider through its management API, without assuming the provider
//! starts empty and without deleting anything that was not declared.
//!
//! ## Overview
//!
//! - **Config**: target tenant, credentials and environment identity
//! - **Provider**: the [`ManagementApi`] seam with HTTP and in-memory
//!   implementations
//! - **Defaults**: canonical payloads for newly created resources
//! - **Reconcile**: ordered verify-or-create stages and exact-match role
//!   permission replacement
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use oidc_deploy::{DeployConfig, MemoryManagementApi, ProviderEndpoint, ReconciliationEngine};
//! use oidc_policy::{ActionType, RoleDefinition, RuleSet, ScopeCatalog};
//!
//! # tokio_test_block(async {
//! let config = DeployConfig {
//!     provider: ProviderEndpoint {
//!         domain: "https://tenant.example".into(),
//!         client_id: "id".into(),
//!         client_secret: "secret".into(),
//!     },
//!     environment_name: "LOCAL-DEV".into(),
//!     environment_base_url: "http://api.local".into(),
//!     environment_client_url: "http://app.local".into(),
//!     ..Default::default()
//! };
//!
//! let engine = ReconciliationEngine::new(Arc::new(MemoryManagementApi::new()), config);
//! let catalog = ScopeCatalog::from_resources(["accounts"]).unwrap();
//! let roles = [RoleDefinition::new("operator", RuleSet::new().with_action(ActionType::Read))];
//!
//! let report = engine.deploy(&catalog, &roles).await.unwrap();
//! assert_eq!(report.roles.outcomes[0].granted, 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod defaults;
pub mod error;
pub mod provider;
pub mod reconcile;

// Re-export main types
pub use config::{ConfigError, DeployConfig, ProviderEndpoint, DEFAULT_ROLES_RULE_NAME};
pub use error::{DeployError, DeployResult, ProviderError, ProviderResult, RoleFailure, Stage};
pub use provider::{
    ApiOperation, HttpManagementClient, ManagementApi, ManagementApiStats, MemoryManagementApi,
    NamedResource,
};
pub use reconcile::{
    verify_or_create, DeploymentReport, ReconciliationEngine, RoleOutcome, RoleReconciliation,
    Verified,
};

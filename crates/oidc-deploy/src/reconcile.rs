//! Reconciliation engine.
//!
//! Drives the provider toward the declared configuration in ordered stages:
//!
//! ```text
//! roles rule -> API -> client -> connection -> roles
//! ```
//!
//! The first four stages verify a resource by name and create it with
//! canonical defaults when absent; existing resources are never modified.
//! Roles are reconciled with exact-match semantics: every existing
//! permission is revoked, then the resolved set is granted. The replacement
//! is not atomic. A failure between revoke and grant leaves the role
//! under-permissioned until the next successful run; nothing is rolled back.

use oidc_policy::{resolve_all, PolicyDocument, ResolvedRole, RoleDefinition, ScopeCatalog};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigError, DeployConfig};
use crate::defaults;
use crate::error::{DeployError, DeployResult, ProviderError, ProviderResult, RoleFailure, Stage};
use crate::provider::{
    Client, Connection, HttpManagementClient, ManagementApi, NamedResource, ResourceServer, Role,
    Rule,
};

/// A resource found by name or freshly created.
#[derive(Debug, Clone, PartialEq)]
pub struct Verified<T> {
    /// The resource as returned by the provider.
    pub resource: T,
    /// Whether this run created it.
    pub created: bool,
}

impl<T> Verified<T> {
    fn found(resource: T) -> Self {
        Self {
            resource,
            created: false,
        }
    }

    fn created(resource: T) -> Self {
        Self {
            resource,
            created: true,
        }
    }
}

/// Verify a resource exists by exact name, creating it when absent.
///
/// Lists the resources of the kind once. A match is returned unmodified;
/// otherwise `create` runs and its result is returned.
pub async fn verify_or_create<T, L, LF, C, CF>(
    kind: &str,
    name: &str,
    list: L,
    create: C,
) -> ProviderResult<Verified<T>>
where
    T: NamedResource,
    L: FnOnce() -> LF,
    LF: Future<Output = ProviderResult<Vec<T>>>,
    C: FnOnce() -> CF,
    CF: Future<Output = ProviderResult<T>>,
{
    let existing = list().await?;
    if let Some(found) = existing.into_iter().find(|r| r.name() == name) {
        info!(kind, name, "Already exists, leaving it unchanged");
        return Ok(Verified::found(found));
    }

    info!(kind, name, "Does not exist, creating it");
    let created = create().await?;
    info!(kind, name, "Created");
    Ok(Verified::created(created))
}

/// Result of reconciling one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOutcome {
    /// Role name
    pub name: String,
    /// Provider role id
    pub role_id: String,
    /// Whether the role was created by this run
    pub created: bool,
    /// Permissions revoked before granting
    pub revoked: usize,
    /// Permissions granted
    pub granted: usize,
}

/// Result of the role stage.
#[derive(Debug, Clone)]
pub struct RoleReconciliation {
    /// Outcome per declared role, in declaration order.
    pub outcomes: Vec<RoleOutcome>,
    /// Provider roles listed after every role settled.
    pub roles: Vec<Role>,
}

/// Everything a deployment produced or found.
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    /// Rule that adds roles to the id token.
    pub roles_rule: Verified<Rule>,
    /// Resource server of the environment.
    pub api: Verified<ResourceServer>,
    /// Client application of the environment.
    pub client: Verified<Client>,
    /// Database connection enabled for the client.
    pub connection: Verified<Connection>,
    /// Role stage result.
    pub roles: RoleReconciliation,
}

/// Reconciles a provider tenant against declared policy.
///
/// # Example
///
/// ```rust,no_run
/// use oidc_deploy::{DeployConfig, ReconciliationEngine};
/// use oidc_policy::PolicyDocument;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DeployConfig::from_env();
/// let engine = ReconciliationEngine::connect(config)?;
///
/// let document = PolicyDocument::from_json(r#"{
///     "scopes": ["accounts", "users"],
///     "roles": [{ "name": "operator", "include": { "read": true } }]
/// }"#)?;
///
/// let report = engine.deploy_document(&document).await?;
/// println!("API identifier: {}", report.api.resource.identifier);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReconciliationEngine {
    api: Arc<dyn ManagementApi>,
    config: DeployConfig,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl ReconciliationEngine {
    /// Create an engine over any management API implementation.
    pub fn new(api: Arc<dyn ManagementApi>, config: DeployConfig) -> Self {
        Self { api, config }
    }

    /// Create an engine talking to the configured provider over HTTP.
    pub fn connect(config: DeployConfig) -> DeployResult<Self> {
        config.validate()?;
        let client = HttpManagementClient::new(config.provider.clone(), config.timeout())
            .map_err(|e| ConfigError::InvalidValue {
                key: "provider".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Get the configuration.
    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Deploy a policy document.
    pub async fn deploy_document(&self, document: &PolicyDocument) -> DeployResult<DeploymentReport> {
        let catalog = document.catalog()?;
        self.deploy(&catalog, &document.roles).await
    }

    /// Run every stage in order.
    ///
    /// Configuration and role definitions are validated before the first
    /// remote call.
    #[instrument(skip_all, fields(environment = %self.config.environment_name))]
    pub async fn deploy(
        &self,
        catalog: &ScopeCatalog,
        roles: &[RoleDefinition],
    ) -> DeployResult<DeploymentReport> {
        self.config.validate()?;
        let resolved = resolve_all(roles, catalog)?;

        let roles_rule = self.verify_roles_rule().await?;
        let api = self.verify_api(catalog).await?;
        let client = self.verify_client().await?;
        let connection = self
            .verify_connection(vec![client.resource.client_id.clone()])
            .await?;
        let roles = self
            .reconcile_roles(resolved, &api.resource.identifier)
            .await?;

        info!(
            roles = roles.outcomes.len(),
            api = %api.resource.identifier,
            "Deployment complete"
        );
        Ok(DeploymentReport {
            roles_rule,
            api,
            client,
            connection,
            roles,
        })
    }

    /// Verify the roles rule, namespaced by the environment base URL.
    pub async fn verify_roles_rule(&self) -> DeployResult<Verified<Rule>> {
        let name = &self.config.roles_rule_name;
        let rule = defaults::roles_rule(name, &self.config.environment_base_url);
        verify_or_create(
            Stage::RolesRule.as_str(),
            name,
            || self.api.list_rules(),
            || self.api.create_rule(&rule),
        )
        .await
        .map_err(|e| DeployError::remote(Stage::RolesRule, e))
    }

    /// Verify the API exposing the catalog scopes.
    pub async fn verify_api(&self, catalog: &ScopeCatalog) -> DeployResult<Verified<ResourceServer>> {
        let name = &self.config.environment_name;
        let payload =
            defaults::resource_server(name, &self.config.environment_base_url, catalog);
        verify_or_create(
            Stage::Api.as_str(),
            name,
            || self.api.list_resource_servers(),
            || self.api.create_resource_server(&payload),
        )
        .await
        .map_err(|e| DeployError::remote(Stage::Api, e))
    }

    /// Verify the client application.
    pub async fn verify_client(&self) -> DeployResult<Verified<Client>> {
        let name = &self.config.environment_name;
        let payload = defaults::client(name, &self.config.environment_client_url);
        verify_or_create(
            Stage::Client.as_str(),
            name,
            || self.api.list_clients(),
            || self.api.create_client(&payload),
        )
        .await
        .map_err(|e| DeployError::remote(Stage::Client, e))
    }

    /// Verify the database connection enabled for `client_ids`.
    pub async fn verify_connection(
        &self,
        client_ids: Vec<String>,
    ) -> DeployResult<Verified<Connection>> {
        let name = &self.config.environment_name;
        let payload = defaults::connection(name, client_ids);
        verify_or_create(
            Stage::Connection.as_str(),
            name,
            || self.api.list_connections(),
            || self.api.create_connection(&payload),
        )
        .await
        .map_err(|e| DeployError::remote(Stage::Connection, e))
    }

    /// Make every declared role's permissions exactly its resolved set.
    ///
    /// Roles run concurrently up to the configured limit. Every role runs
    /// to completion even when others fail; any failure is reported as
    /// [`DeployError::Reconciliation`] listing each failed role.
    #[instrument(skip(self, resolved), fields(roles = resolved.len()))]
    pub async fn reconcile_roles(
        &self,
        resolved: Vec<ResolvedRole>,
        default_api: &str,
    ) -> DeployResult<RoleReconciliation> {
        let existing = self
            .api
            .list_roles()
            .await
            .map_err(|e| DeployError::remote(Stage::Roles, e))?;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency()));
        let mut tasks = JoinSet::new();

        for (index, role) in resolved.into_iter().enumerate() {
            let found = existing.iter().find(|r| r.name == role.name).cloned();
            let api = Arc::clone(&self.api);
            let semaphore = Arc::clone(&semaphore);
            let default_api = default_api.to_string();

            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => reconcile_role(api.as_ref(), found, &role, &default_api).await,
                    Err(e) => Err(ProviderError::Internal(e.to_string())),
                };
                (index, role.name, outcome)
            });
        }

        let mut outcomes = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(outcome))) => outcomes.push((index, outcome)),
                Ok((index, role, Err(error))) => {
                    warn!(role = %role, error = %error, "Role reconciliation failed");
                    failures.push((index, RoleFailure { role, error }));
                }
                Err(e) => {
                    error!(error = %e, "Role reconciliation task aborted");
                    failures.push((
                        usize::MAX,
                        RoleFailure {
                            role: "<unknown>".to_string(),
                            error: ProviderError::Internal(e.to_string()),
                        },
                    ));
                }
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|(index, _)| *index);
            error!(failed = failures.len(), "Role reconciliation incomplete");
            return Err(DeployError::Reconciliation {
                failures: failures.into_iter().map(|(_, f)| f).collect(),
            });
        }

        outcomes.sort_by_key(|(index, _)| *index);
        let roles = self
            .api
            .list_roles()
            .await
            .map_err(|e| DeployError::remote(Stage::Roles, e))?;

        Ok(RoleReconciliation {
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
            roles,
        })
    }
}

/// Create-or-find, revoke all, grant resolved. Strictly sequential.
#[instrument(skip(api, found, role, default_api), fields(role = %role.name))]
async fn reconcile_role(
    api: &dyn ManagementApi,
    found: Option<Role>,
    role: &ResolvedRole,
    default_api: &str,
) -> ProviderResult<RoleOutcome> {
    let (remote, created, revoked) = match found {
        Some(existing) => {
            let current = api.list_role_permissions(&existing.id).await?;
            let revoke: Vec<_> = current.iter().map(|p| p.to_permission()).collect();
            if !revoke.is_empty() {
                debug!(count = revoke.len(), "Revoking existing permissions");
                api.remove_role_permissions(&existing.id, &revoke).await?;
            }
            (existing, false, revoke.len())
        }
        None => {
            let created = api
                .create_role(&defaults::role(&role.name, &role.description))
                .await?;
            info!("Role created");
            (created, true, 0)
        }
    };

    let grant = role.permissions(default_api);
    if !grant.is_empty() {
        debug!(count = grant.len(), "Granting resolved permissions");
        api.add_role_permissions(&remote.id, &grant).await?;
    }

    Ok(RoleOutcome {
        name: role.name.clone(),
        role_id: remote.id,
        created,
        revoked,
        granted: grant.len(),
    })
}

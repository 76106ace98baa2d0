//! In-memory management API.
//!
//! Suitable for tests and dry runs. Every call is counted, and failures can
//! be injected per operation or per role.

use async_trait::async_trait;
use oidc_policy::Permission;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    Client, Connection, ManagementApi, NewClient, NewConnection, NewResourceServer, NewRole,
    NewRule, ResourceServer, Role, RolePermission, Rule,
};
use crate::error::{ProviderError, ProviderResult};

/// Management API operations, for counting calls and injecting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    ListRules,
    CreateRule,
    ListResourceServers,
    CreateResourceServer,
    ListClients,
    CreateClient,
    ListConnections,
    CreateConnection,
    ListRoles,
    CreateRole,
    ListRolePermissions,
    AddRolePermissions,
    RemoveRolePermissions,
}

/// Call counts per operation.
#[derive(Debug, Clone, Default)]
pub struct ManagementApiStats {
    calls: HashMap<ApiOperation, usize>,
}

impl ManagementApiStats {
    /// Number of calls made to `operation`.
    pub fn calls(&self, operation: ApiOperation) -> usize {
        self.calls.get(&operation).copied().unwrap_or(0)
    }

    /// Total number of calls.
    pub fn total(&self) -> usize {
        self.calls.values().sum()
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    status: u16,
    message: String,
}

impl InjectedFailure {
    fn to_error(&self) -> ProviderError {
        ProviderError::Api {
            status: self.status,
            message: self.message.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    rules: Vec<Rule>,
    resource_servers: Vec<ResourceServer>,
    clients: Vec<Client>,
    connections: Vec<Connection>,
    roles: Vec<Role>,
    role_permissions: HashMap<String, BTreeSet<Permission>>,
    stats: ManagementApiStats,
    failures: HashMap<ApiOperation, InjectedFailure>,
    role_failures: HashMap<(String, ApiOperation), InjectedFailure>,
}

impl State {
    fn record(&mut self, operation: ApiOperation) -> ProviderResult<()> {
        *self.stats.calls.entry(operation).or_insert(0) += 1;
        match self.failures.get(&operation) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn record_for_role(&mut self, operation: ApiOperation, role_id: &str) -> ProviderResult<()> {
        self.record(operation)?;
        let role_name = self
            .roles
            .iter()
            .find(|role| role.id == role_id)
            .map(|role| role.name.clone())
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: format!("Role not found: {}", role_id),
            })?;
        match self.role_failures.get(&(role_name, operation)) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn conflict(kind: &str, name: &str) -> ProviderError {
        ProviderError::Api {
            status: 409,
            message: format!("{} already exists: {}", kind, name),
        }
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::now_v7().simple())
}

fn to_map<T: serde::Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// In-memory management API.
#[derive(Clone, Default)]
pub struct MemoryManagementApi {
    state: Arc<RwLock<State>>,
}

impl std::fmt::Debug for MemoryManagementApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManagementApi").finish()
    }
}

impl MemoryManagementApi {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `operation` fail with the given status.
    pub async fn fail_operation(&self, operation: ApiOperation, status: u16, message: &str) {
        self.state.write().await.failures.insert(
            operation,
            InjectedFailure {
                status,
                message: message.to_string(),
            },
        );
    }

    /// Make `operation` fail for the named role only.
    pub async fn fail_for_role(
        &self,
        role_name: &str,
        operation: ApiOperation,
        status: u16,
        message: &str,
    ) {
        self.state.write().await.role_failures.insert(
            (role_name.to_string(), operation),
            InjectedFailure {
                status,
                message: message.to_string(),
            },
        );
    }

    /// Remove all injected failures.
    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.failures.clear();
        state.role_failures.clear();
    }

    /// Seed a role with existing permissions, bypassing call counting.
    pub async fn seed_role(&self, name: &str, permissions: Vec<Permission>) -> Role {
        let mut state = self.state.write().await;
        let role = Role {
            id: new_id("rol"),
            name: name.to_string(),
            description: None,
        };
        state.roles.push(role.clone());
        state
            .role_permissions
            .insert(role.id.clone(), permissions.into_iter().collect());
        role
    }

    /// Permissions currently granted to the named role, sorted.
    pub async fn permissions_of(&self, role_name: &str) -> Vec<Permission> {
        let state = self.state.read().await;
        state
            .roles
            .iter()
            .find(|role| role.name == role_name)
            .and_then(|role| state.role_permissions.get(&role.id))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get call statistics.
    pub async fn stats(&self) -> ManagementApiStats {
        self.state.read().await.stats.clone()
    }
}

#[async_trait]
impl ManagementApi for MemoryManagementApi {
    async fn list_rules(&self) -> ProviderResult<Vec<Rule>> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::ListRules)?;
        Ok(state.rules.clone())
    }

    async fn create_rule(&self, rule: &NewRule) -> ProviderResult<Rule> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::CreateRule)?;
        if state.rules.iter().any(|r| r.name == rule.name) {
            return Err(State::conflict("Rule", &rule.name));
        }
        let created = Rule {
            id: new_id("rul"),
            name: rule.name.clone(),
            script: rule.script.clone(),
            order: rule.order.or(Some(state.rules.len() as i64 + 1)),
            enabled: rule.enabled,
        };
        state.rules.push(created.clone());
        Ok(created)
    }

    async fn list_resource_servers(&self) -> ProviderResult<Vec<ResourceServer>> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::ListResourceServers)?;
        Ok(state.resource_servers.clone())
    }

    async fn create_resource_server(
        &self,
        resource_server: &NewResourceServer,
    ) -> ProviderResult<ResourceServer> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::CreateResourceServer)?;
        if state
            .resource_servers
            .iter()
            .any(|rs| rs.identifier == resource_server.identifier)
        {
            return Err(State::conflict("Resource server", &resource_server.identifier));
        }
        let mut extra = to_map(resource_server);
        for key in ["name", "identifier", "scopes"] {
            extra.remove(key);
        }
        let created = ResourceServer {
            id: new_id("rs"),
            name: resource_server.name.clone(),
            identifier: resource_server.identifier.clone(),
            scopes: resource_server.scopes.clone(),
            extra,
        };
        state.resource_servers.push(created.clone());
        Ok(created)
    }

    async fn list_clients(&self) -> ProviderResult<Vec<Client>> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::ListClients)?;
        Ok(state.clients.clone())
    }

    async fn create_client(&self, client: &NewClient) -> ProviderResult<Client> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::CreateClient)?;
        let mut extra = to_map(client);
        extra.remove("name");
        let created = Client {
            client_id: uuid::Uuid::now_v7().simple().to_string(),
            name: client.name.clone(),
            extra,
        };
        state.clients.push(created.clone());
        Ok(created)
    }

    async fn list_connections(&self) -> ProviderResult<Vec<Connection>> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::ListConnections)?;
        Ok(state.connections.clone())
    }

    async fn create_connection(&self, connection: &NewConnection) -> ProviderResult<Connection> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::CreateConnection)?;
        if state.connections.iter().any(|c| c.name == connection.name) {
            return Err(State::conflict("Connection", &connection.name));
        }
        let mut extra = to_map(connection);
        extra.remove("name");
        extra.remove("enabled_clients");
        let created = Connection {
            id: new_id("con"),
            name: connection.name.clone(),
            enabled_clients: connection.enabled_clients.clone(),
            extra,
        };
        state.connections.push(created.clone());
        Ok(created)
    }

    async fn list_roles(&self) -> ProviderResult<Vec<Role>> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::ListRoles)?;
        Ok(state.roles.clone())
    }

    async fn create_role(&self, role: &NewRole) -> ProviderResult<Role> {
        let mut state = self.state.write().await;
        state.record(ApiOperation::CreateRole)?;
        if state.roles.iter().any(|r| r.name == role.name) {
            return Err(State::conflict("Role", &role.name));
        }
        let created = Role {
            id: new_id("rol"),
            name: role.name.clone(),
            description: Some(role.description.clone()),
        };
        state.roles.push(created.clone());
        Ok(created)
    }

    async fn list_role_permissions(&self, role_id: &str) -> ProviderResult<Vec<RolePermission>> {
        let mut state = self.state.write().await;
        state.record_for_role(ApiOperation::ListRolePermissions, role_id)?;
        Ok(state
            .role_permissions
            .get(role_id)
            .map(|set| {
                set.iter()
                    .map(|p| RolePermission {
                        resource_server_name: Some(p.resource_server_identifier.clone()),
                        description: Some(p.permission_name.clone()),
                        ..RolePermission::from(p.clone())
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_role_permissions(
        &self,
        role_id: &str,
        permissions: &[Permission],
    ) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.record_for_role(ApiOperation::AddRolePermissions, role_id)?;
        state
            .role_permissions
            .entry(role_id.to_string())
            .or_default()
            .extend(permissions.iter().cloned());
        Ok(())
    }

    async fn remove_role_permissions(
        &self,
        role_id: &str,
        permissions: &[Permission],
    ) -> ProviderResult<()> {
        let mut state = self.state.write().await;
        state.record_for_role(ApiOperation::RemoveRolePermissions, role_id)?;
        if let Some(granted) = state.role_permissions.get_mut(role_id) {
            for permission in permissions {
                granted.remove(permission);
            }
        }
        Ok(())
    }
}

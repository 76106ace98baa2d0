//! Provider management API.
//!
//! The reconciliation engine talks to the identity provider only through
//! [`ManagementApi`]. Two implementations are provided:
//!
//! - [`HttpManagementClient`]: the provider's `/api/v2` REST API over reqwest
//! - [`MemoryManagementApi`]: in-process state for tests and dry runs
//!
//! Remote resources are typed on the fields this crate reads; every other
//! attribute the provider returns is kept in `extra`.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use oidc_policy::Permission;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderResult;

pub use http::HttpManagementClient;
pub use memory::{ApiOperation, ManagementApiStats, MemoryManagementApi};

/// A resource identified by name during verify-or-create.
pub trait NamedResource {
    /// Resource name.
    fn name(&self) -> &str;
}

/// Rule script run by the provider on every login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Provider id
    pub id: String,
    /// Rule name
    pub name: String,
    /// Script source
    #[serde(default)]
    pub script: String,
    /// Execution order
    #[serde(default)]
    pub order: Option<i64>,
    /// Whether the rule runs
    #[serde(default)]
    pub enabled: bool,
}

/// Payload for creating a [`Rule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    /// Rule name
    pub name: String,
    /// Script source
    pub script: String,
    /// Execution order; the provider appends when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Whether the rule runs
    pub enabled: bool,
}

/// A scope registered on a resource server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiScope {
    /// Permission name
    pub value: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
}

/// Resource server (API) protected by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceServer {
    /// Provider id
    #[serde(default)]
    pub id: String,
    /// API name
    pub name: String,
    /// Audience identifier; role permissions reference it
    pub identifier: String,
    /// Registered scopes
    #[serde(default)]
    pub scopes: Vec<ApiScope>,
    /// Remaining attributes
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for creating a [`ResourceServer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResourceServer {
    /// API name
    pub name: String,
    /// Audience identifier
    pub identifier: String,
    /// Scopes to register
    pub scopes: Vec<ApiScope>,
    /// Token signing algorithm
    pub signing_alg: String,
    /// Whether refresh tokens may be issued
    pub allow_offline_access: bool,
    /// Access token lifetime in seconds
    pub token_lifetime: u32,
    /// Access token lifetime for browser flows in seconds
    pub token_lifetime_for_web: u32,
    /// Skip the consent screen for first-party clients
    pub skip_consent_for_verifiable_first_party_clients: bool,
    /// Enable role based access control
    pub enforce_policies: bool,
    /// Access token format; permissions are added to the token
    pub token_dialect: String,
}

/// Client application registered with the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Provider-issued client id
    pub client_id: String,
    /// Client name
    pub name: String,
    /// Remaining attributes
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// JWT settings of a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtConfiguration {
    /// Id token lifetime in seconds
    pub lifetime_in_seconds: u32,
    /// Scope configuration
    pub scopes: Map<String, Value>,
    /// Signing algorithm
    pub alg: String,
}

/// Payload for creating a [`Client`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClient {
    /// Client name
    pub name: String,
    /// Client description
    pub description: String,
    /// Allowed login callback URLs
    pub callbacks: Vec<String>,
    /// Allowed CORS origins
    pub allowed_origins: Vec<String>,
    /// Allowed post-logout redirect URLs
    pub allowed_logout_urls: Vec<String>,
    /// Enabled grant types
    pub grant_types: Vec<String>,
    /// Token endpoint authentication method
    pub token_endpoint_auth_method: String,
    /// Application type
    pub app_type: String,
    /// Whether the client is OIDC conformant
    pub oidc_conformant: bool,
    /// JWT settings
    pub jwt_configuration: JwtConfiguration,
}

/// Database connection users sign in through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Provider id
    #[serde(default)]
    pub id: String,
    /// Connection name
    pub name: String,
    /// Clients allowed to use the connection
    #[serde(default)]
    pub enabled_clients: Vec<String>,
    /// Remaining attributes
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Toggle for an optional password check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordToggle {
    /// Whether the check is on
    pub enable: bool,
}

/// Password dictionary check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordDictionary {
    /// Whether the check is on
    pub enable: bool,
    /// Additional forbidden passwords
    pub dictionary: Vec<String>,
}

/// Password reuse check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHistory {
    /// Whether the check is on
    pub enable: bool,
    /// Number of previous passwords remembered
    pub size: u32,
}

/// Password complexity requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordComplexity {
    /// Minimum password length
    pub min_length: u32,
}

/// Options of a database connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Password strength policy name
    #[serde(rename = "passwordPolicy")]
    pub password_policy: String,
    /// Whether self sign-up is disabled
    pub disable_signup: bool,
    /// Whether a username is required
    pub requires_username: bool,
    /// Whether brute force protection is on
    pub brute_force_protection: bool,
    /// Connection strategy version
    pub strategy_version: u32,
    /// Reject passwords containing personal data
    pub password_no_personal_info: PasswordToggle,
    /// Reject common passwords
    pub password_dictionary: PasswordDictionary,
    /// Reject reused passwords
    pub password_history: PasswordHistory,
    /// Complexity requirements
    pub password_complexity_options: PasswordComplexity,
}

/// Payload for creating a [`Connection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConnection {
    /// Connection name
    pub name: String,
    /// Connection strategy
    pub strategy: String,
    /// Clients allowed to use the connection
    pub enabled_clients: Vec<String>,
    /// Connection options
    pub options: ConnectionOptions,
}

/// Role registered with the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Provider id
    pub id: String,
    /// Role name
    pub name: String,
    /// Role description
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload for creating a [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    /// Role name
    pub name: String,
    /// Role description
    pub description: String,
}

/// A permission as listed on a role.
///
/// Listings carry display fields the add/remove endpoints reject; convert
/// with [`RolePermission::to_permission`] before sending one back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    /// Resource server the permission belongs to
    pub resource_server_identifier: String,
    /// Permission name
    pub permission_name: String,
    /// Resource server name, listings only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_server_name: Option<String>,
    /// Permission description, listings only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RolePermission {
    /// Strip display fields.
    pub fn to_permission(&self) -> Permission {
        Permission::new(&self.resource_server_identifier, &self.permission_name)
    }
}

impl From<Permission> for RolePermission {
    fn from(permission: Permission) -> Self {
        Self {
            resource_server_identifier: permission.resource_server_identifier,
            permission_name: permission.permission_name,
            resource_server_name: None,
            description: None,
        }
    }
}

macro_rules! named {
    ($($ty:ty),* $(,)?) => {
        $(impl NamedResource for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

named!(Rule, ResourceServer, Client, Connection, Role);

/// Operations consumed from the provider management API.
///
/// Listing calls return every resource of the kind. No call is retried.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// List all rules.
    async fn list_rules(&self) -> ProviderResult<Vec<Rule>>;

    /// Create a rule.
    async fn create_rule(&self, rule: &NewRule) -> ProviderResult<Rule>;

    /// List all resource servers.
    async fn list_resource_servers(&self) -> ProviderResult<Vec<ResourceServer>>;

    /// Create a resource server.
    async fn create_resource_server(
        &self,
        resource_server: &NewResourceServer,
    ) -> ProviderResult<ResourceServer>;

    /// List all clients.
    async fn list_clients(&self) -> ProviderResult<Vec<Client>>;

    /// Create a client.
    async fn create_client(&self, client: &NewClient) -> ProviderResult<Client>;

    /// List all connections.
    async fn list_connections(&self) -> ProviderResult<Vec<Connection>>;

    /// Create a connection.
    async fn create_connection(&self, connection: &NewConnection) -> ProviderResult<Connection>;

    /// List all roles.
    async fn list_roles(&self) -> ProviderResult<Vec<Role>>;

    /// Create a role.
    async fn create_role(&self, role: &NewRole) -> ProviderResult<Role>;

    /// List the permissions granted to a role.
    async fn list_role_permissions(&self, role_id: &str) -> ProviderResult<Vec<RolePermission>>;

    /// Grant permissions to a role.
    async fn add_role_permissions(
        &self,
        role_id: &str,
        permissions: &[Permission],
    ) -> ProviderResult<()>;

    /// Revoke permissions from a role.
    async fn remove_role_permissions(
        &self,
        role_id: &str,
        permissions: &[Permission],
    ) -> ProviderResult<()>;
}

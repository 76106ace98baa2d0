//! HTTP management API client.
//!
//! Talks to the provider's `/api/v2` REST API. A management token is
//! obtained with the client-credentials grant and cached until shortly
//! before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use oidc_policy::Permission;
use reqwest::{Client as HttpClient, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

use super::{
    Client, Connection, ManagementApi, NewClient, NewConnection, NewResourceServer, NewRole,
    NewRule, ResourceServer, Role, RolePermission, Rule,
};
use crate::config::ProviderEndpoint;
use crate::error::{ProviderError, ProviderResult};

/// Page size used when listing resources.
const PAGE_SIZE: usize = 50;

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    86_400
}

#[derive(Serialize)]
struct PermissionsBody<'a> {
    permissions: &'a [Permission],
}

/// Management API client over HTTP.
#[derive(Clone)]
pub struct HttpManagementClient {
    /// HTTP client instance.
    client: HttpClient,

    /// Tenant endpoint and credentials.
    endpoint: ProviderEndpoint,

    /// Cached management token.
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl std::fmt::Debug for HttpManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpManagementClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl HttpManagementClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RequestFailed`] if the HTTP client cannot be
    /// built.
    pub fn new(endpoint: ProviderEndpoint, timeout: Duration) -> ProviderResult<Self> {
        let client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the endpoint configuration.
    pub fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }

    /// Get a management token, fetching a new one when the cached token is
    /// missing or about to expire.
    #[instrument(skip(self))]
    pub async fn access_token(&self) -> ProviderResult<String> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let mut cached = self.token.write().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        debug!("Requesting management API token");
        let audience = self.endpoint.management_audience();
        let response = self
            .client
            .post(self.endpoint.url("/oauth/token"))
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.endpoint.client_id,
                client_secret: &self.endpoint.client_secret,
                audience: &audience,
            })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            error!("Management token request rejected ({})", status.as_u16());
            return Err(ProviderError::AuthenticationFailed);
        }

        let token: TokenResponse = Self::handle_response(response).await?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
        });
        Ok(access_token)
    }

    /// URL under `/api/v2` with each segment percent-encoded.
    fn api_url(&self, segments: &[&str]) -> ProviderResult<Url> {
        let mut url = Url::parse(&self.endpoint.url("/api/v2"))
            .map_err(|e| ProviderError::Internal(format!("invalid provider URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Internal("provider URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> ProviderResult<RequestBuilder> {
        let url = self.api_url(segments)?;
        let token = self.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn get_all<T>(&self, segments: &[&str]) -> ProviderResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 0usize;
        loop {
            let response = self
                .request(Method::GET, segments)
                .await?
                .query(&[("page", page), ("per_page", PAGE_SIZE)])
                .send()
                .await?;
            let batch: Vec<T> = Self::handle_response(response).await?;
            let done = batch.len() < PAGE_SIZE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    async fn post<B, T>(&self, segments: &[&str], body: &B) -> ProviderResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::POST, segments).await?.json(body).send().await?;
        Self::handle_response(response).await
    }

    async fn send_permissions(
        &self,
        method: Method,
        role_id: &str,
        permissions: &[Permission],
    ) -> ProviderResult<()> {
        let response = self
            .request(method, &["roles", role_id, "permissions"])
            .await?
            .json(&PermissionsBody { permissions })
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            error!("Management API authentication failed");
            return Err(ProviderError::AuthenticationFailed);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Management API error ({}): {}", status.as_u16(), message);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn handle_response<T>(response: reqwest::Response) -> ProviderResult<T>
    where
        T: DeserializeOwned,
    {
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ManagementApi for HttpManagementClient {
    #[instrument(skip(self))]
    async fn list_rules(&self) -> ProviderResult<Vec<Rule>> {
        self.get_all(&["rules"]).await
    }

    #[instrument(skip(self, rule), fields(name = %rule.name))]
    async fn create_rule(&self, rule: &NewRule) -> ProviderResult<Rule> {
        self.post(&["rules"], rule).await
    }

    #[instrument(skip(self))]
    async fn list_resource_servers(&self) -> ProviderResult<Vec<ResourceServer>> {
        self.get_all(&["resource-servers"]).await
    }

    #[instrument(skip(self, resource_server), fields(name = %resource_server.name))]
    async fn create_resource_server(
        &self,
        resource_server: &NewResourceServer,
    ) -> ProviderResult<ResourceServer> {
        self.post(&["resource-servers"], resource_server).await
    }

    #[instrument(skip(self))]
    async fn list_clients(&self) -> ProviderResult<Vec<Client>> {
        self.get_all(&["clients"]).await
    }

    #[instrument(skip(self, client), fields(name = %client.name))]
    async fn create_client(&self, client: &NewClient) -> ProviderResult<Client> {
        self.post(&["clients"], client).await
    }

    #[instrument(skip(self))]
    async fn list_connections(&self) -> ProviderResult<Vec<Connection>> {
        self.get_all(&["connections"]).await
    }

    #[instrument(skip(self, connection), fields(name = %connection.name))]
    async fn create_connection(&self, connection: &NewConnection) -> ProviderResult<Connection> {
        self.post(&["connections"], connection).await
    }

    #[instrument(skip(self))]
    async fn list_roles(&self) -> ProviderResult<Vec<Role>> {
        self.get_all(&["roles"]).await
    }

    #[instrument(skip(self, role), fields(name = %role.name))]
    async fn create_role(&self, role: &NewRole) -> ProviderResult<Role> {
        self.post(&["roles"], role).await
    }

    #[instrument(skip(self))]
    async fn list_role_permissions(&self, role_id: &str) -> ProviderResult<Vec<RolePermission>> {
        self.get_all(&["roles", role_id, "permissions"])
            .await
    }

    #[instrument(skip(self, permissions), fields(count = permissions.len()))]
    async fn add_role_permissions(
        &self,
        role_id: &str,
        permissions: &[Permission],
    ) -> ProviderResult<()> {
        self.send_permissions(Method::POST, role_id, permissions).await
    }

    #[instrument(skip(self, permissions), fields(count = permissions.len()))]
    async fn remove_role_permissions(
        &self,
        role_id: &str,
        permissions: &[Permission],
    ) -> ProviderResult<()> {
        self.send_permissions(Method::DELETE, role_id, permissions).await
    }
}

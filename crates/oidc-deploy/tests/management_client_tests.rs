//! HTTP management client tests.
//!
//! A wiremock server plays the provider: it issues management tokens on
//! `/oauth/token` and serves the `/api/v2` endpoints.

use oidc_deploy::config::ProviderEndpoint;
use oidc_deploy::defaults;
use oidc_deploy::provider::{HttpManagementClient, ManagementApi};
use oidc_deploy::ProviderError;
use oidc_policy::Permission;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "mgmt-token";

async fn setup() -> (MockServer, HttpManagementClient) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_json(json!({
            "grant_type": "client_credentials",
            "client_id": "deploy-client",
            "client_secret": "deploy-secret",
            "audience": format!("{}/api/v2/", server.uri())
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "expires_in": 86400,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let client = HttpManagementClient::new(
        ProviderEndpoint {
            domain: server.uri(),
            client_id: "deploy-client".to_string(),
            client_secret: "deploy-secret".to_string(),
        },
        Duration::from_secs(5),
    )
    .unwrap();

    (server, client)
}

#[tokio::test]
async fn test_token_is_fetched_once_and_reused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "expires_in": 86400
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .and(header("Authorization", "Bearer mgmt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let client = HttpManagementClient::new(
        ProviderEndpoint {
            domain: server.uri(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        },
        Duration::from_secs(5),
    )
    .unwrap();

    assert!(client.list_roles().await.unwrap().is_empty());
    assert!(client.list_roles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "access_denied",
            "error_description": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let client = HttpManagementClient::new(
        ProviderEndpoint {
            domain: server.uri(),
            client_id: "id".to_string(),
            client_secret: "wrong".to_string(),
        },
        Duration::from_secs(5),
    )
    .unwrap();

    let err = client.list_rules().await.unwrap_err();
    assert!(matches!(err, ProviderError::AuthenticationFailed));
}

#[tokio::test]
async fn test_list_roles_paginates() {
    let (server, client) = setup().await;

    let first_page: Vec<_> = (0..50)
        .map(|i| json!({ "id": format!("rol_{}", i), "name": format!("role-{}", i) }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first_page))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "rol_50", "name": "admin", "description": "Admin" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let roles = client.list_roles().await.unwrap();
    assert_eq!(roles.len(), 51);
    assert_eq!(roles[50].name, "admin");
    assert_eq!(roles[50].description.as_deref(), Some("Admin"));
}

#[tokio::test]
async fn test_create_rule_sends_canonical_payload() {
    let (server, client) = setup().await;
    let rule = defaults::roles_rule("ROLES-RULE", "http://api.local");

    Mock::given(method("POST"))
        .and(path("/api/v2/rules"))
        .and(header("Authorization", "Bearer mgmt-token"))
        .and(body_json(json!({
            "name": "ROLES-RULE",
            "script": rule.script,
            "enabled": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "rul_1",
            "name": "ROLES-RULE",
            "script": rule.script,
            "order": 1,
            "enabled": true,
            "stage": "login_success"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client.create_rule(&rule).await.unwrap();
    assert_eq!(created.id, "rul_1");
    assert_eq!(created.order, Some(1));
}

#[tokio::test]
async fn test_role_permission_endpoints() {
    let (server, client) = setup().await;
    let grant = vec![
        Permission::new("http://api.local", "r:accounts"),
        Permission::new("http://api.local", "r:users"),
    ];

    Mock::given(method("GET"))
        .and(path("/api/v2/roles/rol_1/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "resource_server_identifier": "http://api.local",
            "permission_name": "w:accounts",
            "resource_server_name": "LOCAL-DEV",
            "description": "Allows creating and updating the accounts resource."
        }])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/v2/roles/rol_1/permissions"))
        .and(body_json(json!({
            "permissions": [
                { "resource_server_identifier": "http://api.local", "permission_name": "w:accounts" }
            ]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/roles/rol_1/permissions"))
        .and(body_json(json!({
            "permissions": [
                { "resource_server_identifier": "http://api.local", "permission_name": "r:accounts" },
                { "resource_server_identifier": "http://api.local", "permission_name": "r:users" }
            ]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let current = client.list_role_permissions("rol_1").await.unwrap();
    let revoke: Vec<_> = current.iter().map(|p| p.to_permission()).collect();
    client.remove_role_permissions("rol_1", &revoke).await.unwrap();
    client.add_role_permissions("rol_1", &grant).await.unwrap();
}

#[tokio::test]
async fn test_role_id_is_escaped_in_path() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/roles/rol%2F1%3Fx/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/roles/rol%2F1%3Fx/permissions"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.list_role_permissions("rol/1?x").await.unwrap().is_empty());
    client
        .add_role_permissions("rol/1?x", &[Permission::new("http://api.local", "r:accounts")])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_api_error_maps_status_and_message() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/roles"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .create_role(&defaults::role("admin", "Admin"))
        .await
        .unwrap_err();

    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "Too Many Requests");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_api_call() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/clients"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(matches!(
        client.list_clients().await,
        Err(ProviderError::AuthenticationFailed)
    ));
}

#[tokio::test]
async fn test_invalid_response_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/connections"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    assert!(matches!(
        client.list_connections().await,
        Err(ProviderError::InvalidResponse(_))
    ));
}

//! Canonical settings for resources created during a deployment.
//!
//! Existing resources are never updated, so these values only apply the
//! first time a resource is created.

use oidc_policy::ScopeCatalog;
use serde_json::Map;

use crate::provider::{
    ApiScope, ConnectionOptions, JwtConfiguration, NewClient, NewConnection, NewResourceServer,
    NewRole, NewRule, PasswordComplexity, PasswordDictionary, PasswordHistory, PasswordToggle,
};

/// Signing algorithm for access and id tokens.
pub const SIGNING_ALG: &str = "RS256";

/// Access and id token lifetime in seconds.
pub const TOKEN_LIFETIME_SECS: u32 = 600;

/// Placeholder in the roles rule script replaced by the claim namespace.
pub const NAMESPACE_PLACEHOLDER: &str = "{{namespace}}";

const ROLES_RULE_TEMPLATE: &str = r#"function rolesRule(user, context, callback) {
	const namespace = '{{namespace}}';
	const assignedRoles = (context.authorization || {}).roles;

	let idTokenClaims = context.idToken || {};

	idTokenClaims[`${namespace}/roles`] = assignedRoles;

	context.idToken = idTokenClaims;
	callback(null, user, context);
}"#;

/// Script copying the user's assigned roles into the `<namespace>/roles`
/// id token claim.
pub fn roles_rule_script(namespace: &str) -> String {
    ROLES_RULE_TEMPLATE.replace(
        NAMESPACE_PLACEHOLDER,
        &namespace.replace('\\', "\\\\").replace('\'', "\\'"),
    )
}

/// Enabled roles rule.
pub fn roles_rule(name: &str, namespace: &str) -> NewRule {
    NewRule {
        name: name.to_string(),
        script: roles_rule_script(namespace),
        order: None,
        enabled: true,
    }
}

/// API whose scopes are the catalog entries it owns.
///
/// Scopes pinned to a different API are left out.
pub fn resource_server(name: &str, identifier: &str, catalog: &ScopeCatalog) -> NewResourceServer {
    let scopes = catalog
        .iter()
        .filter(|scope| scope.api().map_or(true, |api| api == identifier))
        .map(|scope| ApiScope {
            value: scope.value().to_string(),
            description: scope.description().to_string(),
        })
        .collect();

    NewResourceServer {
        name: name.to_string(),
        identifier: identifier.to_string(),
        scopes,
        signing_alg: SIGNING_ALG.to_string(),
        allow_offline_access: false,
        token_lifetime: TOKEN_LIFETIME_SECS,
        token_lifetime_for_web: TOKEN_LIFETIME_SECS,
        skip_consent_for_verifiable_first_party_clients: true,
        enforce_policies: true,
        token_dialect: "access_token_authz".to_string(),
    }
}

/// Public native client using the authorization code flow.
pub fn client(name: &str, client_url: &str) -> NewClient {
    let url = client_url.trim_end_matches('/');
    NewClient {
        name: name.to_string(),
        description: format!("Client application for the {} environment.", url),
        callbacks: vec![
            format!("{}/auth/code-callback", url),
            format!("{}/auth/silent-code-callback", url),
        ],
        allowed_origins: vec![url.to_string()],
        allowed_logout_urls: vec![format!("{}/auth/logged-out", url)],
        grant_types: vec!["authorization_code".to_string()],
        token_endpoint_auth_method: "none".to_string(),
        app_type: "native".to_string(),
        oidc_conformant: true,
        jwt_configuration: JwtConfiguration {
            lifetime_in_seconds: TOKEN_LIFETIME_SECS,
            scopes: Map::new(),
            alg: SIGNING_ALG.to_string(),
        },
    }
}

/// Username/password database connection with signup disabled.
pub fn connection(name: &str, enabled_clients: Vec<String>) -> NewConnection {
    NewConnection {
        name: name.to_string(),
        strategy: "auth0".to_string(),
        enabled_clients,
        options: ConnectionOptions {
            password_policy: "excellent".to_string(),
            disable_signup: true,
            requires_username: false,
            brute_force_protection: true,
            strategy_version: 2,
            password_no_personal_info: PasswordToggle { enable: false },
            password_dictionary: PasswordDictionary {
                enable: true,
                dictionary: Vec::new(),
            },
            password_history: PasswordHistory {
                enable: true,
                size: 5,
            },
            password_complexity_options: PasswordComplexity { min_length: 8 },
        },
    }
}

/// Role payload.
pub fn role(name: &str, description: &str) -> NewRole {
    NewRole {
        name: name.to_string(),
        description: description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oidc_policy::Scope;
    use serde_json::json;

    #[test]
    fn test_roles_rule_namespace() {
        let rule = roles_rule("ROLES-RULE", "http://api.local");
        assert!(rule.enabled);
        assert!(rule.script.contains("const namespace = 'http://api.local';"));
        assert!(!rule.script.contains(NAMESPACE_PLACEHOLDER));
        assert!(rule.script.contains("`${namespace}/roles`"));
    }

    #[test]
    fn test_roles_rule_escapes_quotes() {
        let script = roles_rule_script("http://x/'y");
        assert!(script.contains(r"const namespace = 'http://x/\'y';"));
    }

    #[test]
    fn test_resource_server_payload() {
        let mut catalog = ScopeCatalog::from_resources(["accounts"]).unwrap();
        catalog
            .add(Scope::parse("r:billing", "Billing").unwrap().with_api("http://billing"))
            .unwrap();

        let api = resource_server("LOCAL-DEV", "http://api.local", &catalog);
        let value = serde_json::to_value(&api).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "LOCAL-DEV",
                "identifier": "http://api.local",
                "scopes": [
                    { "value": "r:accounts", "description": "Allows accessing the accounts resource" },
                    { "value": "w:accounts", "description": "Allows creating and updating the accounts resource." }
                ],
                "signing_alg": "RS256",
                "allow_offline_access": false,
                "token_lifetime": 600,
                "token_lifetime_for_web": 600,
                "skip_consent_for_verifiable_first_party_clients": true,
                "enforce_policies": true,
                "token_dialect": "access_token_authz"
            })
        );
    }

    #[test]
    fn test_client_payload() {
        let client = client("LOCAL-DEV", "http://app.local:4200/");
        assert_eq!(
            client.callbacks,
            vec![
                "http://app.local:4200/auth/code-callback",
                "http://app.local:4200/auth/silent-code-callback"
            ]
        );
        assert_eq!(client.allowed_logout_urls, vec!["http://app.local:4200/auth/logged-out"]);
        assert_eq!(
            client.description,
            "Client application for the http://app.local:4200 environment."
        );

        let value = serde_json::to_value(&client).unwrap();
        assert_eq!(
            value["jwt_configuration"],
            json!({ "lifetime_in_seconds": 600, "scopes": {}, "alg": "RS256" })
        );
    }

    #[test]
    fn test_connection_payload() {
        let value = serde_json::to_value(connection("LOCAL-DEV", vec!["cid".to_string()])).unwrap();
        assert_eq!(value["enabled_clients"], json!(["cid"]));
        assert_eq!(value["options"]["passwordPolicy"], json!("excellent"));
        assert_eq!(value["options"]["password_history"], json!({ "enable": true, "size": 5 }));
        assert_eq!(value["options"]["password_complexity_options"]["min_length"], json!(8));
    }
}

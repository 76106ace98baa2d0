//! # Roles
//!
//! Role definitions as written in configuration, and the resolved roles the
//! resolver produces from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PolicyError, PolicyResult};
use crate::permissions::Permission;
use crate::rules::RuleSet;

/// A declared role: a name plus include/exclude rules over the scope catalog.
///
/// When decoded, a missing or empty description defaults to `"<name> role."`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawRoleDefinition")]
pub struct RoleDefinition {
    /// Unique role name.
    pub name: String,

    /// Role description shown by the provider.
    pub description: String,

    /// Scopes selected for the role.
    pub include: RuleSet,

    /// Scopes removed again after inclusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<RuleSet>,
}

impl RoleDefinition {
    /// Create a role definition with the default description `"<name> role."`.
    pub fn new(name: impl Into<String>, include: RuleSet) -> Self {
        let name = name.into();
        Self {
            description: default_description(&name),
            name,
            include,
            exclude: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the exclude rules.
    pub fn with_exclude(mut self, exclude: RuleSet) -> Self {
        self.exclude = Some(exclude);
        self
    }

    /// Load role definitions from the role-map shape keyed by role name:
    ///
    /// ```text
    /// {
    ///   "admin": {
    ///     "description": "Admin Role",
    ///     "scopes": { "include": { "ALL": true }, "exclude": { "accounts": { "write": true } } }
    ///   }
    /// }
    /// ```
    ///
    /// A missing description defaults to `"<name> role."`. Roles are returned
    /// sorted by name.
    pub fn from_role_map(value: &Value) -> PolicyResult<Vec<RoleDefinition>> {
        let roles = value.as_object().ok_or_else(|| {
            PolicyError::InvalidDocument("role map must be an object keyed by role name".to_string())
        })?;

        roles
            .iter()
            .map(|(name, definition)| Self::from_role_map_entry(name, definition))
            .collect()
    }

    fn from_role_map_entry(name: &str, definition: &Value) -> PolicyResult<RoleDefinition> {
        let description = match definition.get("description") {
            None | Some(Value::Null) => default_description(name),
            Some(Value::String(description)) if !description.is_empty() => description.clone(),
            Some(Value::String(_)) => default_description(name),
            Some(_) => {
                return Err(PolicyError::invalid_role(name, "description must be a string"));
            }
        };

        let scopes = definition
            .get("scopes")
            .ok_or_else(|| PolicyError::invalid_role(name, "missing 'scopes'"))?;

        let include = scopes
            .get("include")
            .ok_or_else(|| PolicyError::invalid_role(name, "missing 'scopes.include'"))
            .and_then(RuleSet::from_value)?;

        let exclude = match scopes.get("exclude") {
            None | Some(Value::Null) => None,
            Some(value) => Some(RuleSet::from_value(value)?),
        };

        Ok(RoleDefinition {
            name: name.to_string(),
            description,
            include,
            exclude,
        })
    }
}

fn default_description(name: &str) -> String {
    format!("{} role.", name)
}

/// Wire shape of a role definition with an optional description.
#[derive(Deserialize)]
struct RawRoleDefinition {
    name: String,
    #[serde(default)]
    description: Option<String>,
    include: RuleSet,
    #[serde(default)]
    exclude: Option<RuleSet>,
}

impl From<RawRoleDefinition> for RoleDefinition {
    fn from(raw: RawRoleDefinition) -> Self {
        let description = raw
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| default_description(&raw.name));
        Self {
            name: raw.name,
            description,
            include: raw.include,
            exclude: raw.exclude,
        }
    }
}

/// A scope granted to a resolved role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GrantedScope {
    /// Scope value, used as the permission name.
    pub name: String,

    /// Scope description.
    pub description: String,

    /// Resource server identifier when it differs from the default API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
}

/// The concrete scopes a role definition selects from a catalog.
///
/// Scopes appear in catalog order and are unique, because catalog values are.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedRole {
    /// Role name.
    pub name: String,

    /// Role description.
    pub description: String,

    /// Granted scopes in catalog order.
    pub scopes: Vec<GrantedScope>,
}

impl ResolvedRole {
    /// Provider-native permissions for this role.
    ///
    /// Each scope is granted on its own API when it names one, otherwise on
    /// `default_api`.
    pub fn permissions(&self, default_api: &str) -> Vec<Permission> {
        self.scopes
            .iter()
            .map(|scope| {
                Permission::new(
                    scope.api.as_deref().unwrap_or(default_api),
                    scope.name.clone(),
                )
            })
            .collect()
    }

    /// Granted permission names in catalog order.
    pub fn scope_names(&self) -> Vec<&str> {
        self.scopes.iter().map(|s| s.name.as_str()).collect()
    }

    /// Check whether a scope value was granted.
    pub fn grants(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s.name == scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionType;
    use serde_json::json;

    #[test]
    fn test_role_definition_builder() {
        let role = RoleDefinition::new("operator", RuleSet::new().with_action(ActionType::Read));
        assert_eq!(role.description, "operator role.");
        assert!(role.exclude.is_none());

        let role = role
            .with_description("Operator Role")
            .with_exclude(RuleSet::new().with_resource("accounts"));
        assert_eq!(role.description, "Operator Role");
        assert!(role.exclude.is_some());
    }

    #[test]
    fn test_role_definition_deserialize() {
        let role: RoleDefinition = serde_json::from_value(json!({
            "name": "admin",
            "description": "Admin Role",
            "include": { "ALL": true },
            "exclude": { "accounts": { "write": true } }
        }))
        .unwrap();

        assert_eq!(role.name, "admin");
        assert!(role.include.has_wildcard());
        assert_eq!(role.exclude.as_ref().map(|e| e.len()), Some(1));
    }

    #[test]
    fn test_role_definition_deserialize_defaults_description() {
        let role: RoleDefinition = serde_json::from_value(json!({
            "name": "operator",
            "include": { "read": true }
        }))
        .unwrap();

        assert_eq!(role.description, "operator role.");
        assert!(role.exclude.is_none());
    }

    #[test]
    fn test_role_definition_with_malformed_include_fails_to_decode() {
        let result: Result<RoleDefinition, _> = serde_json::from_value(json!({
            "name": "admin",
            "description": "Admin Role",
            "include": "ALL"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_role_map() {
        let roles = RoleDefinition::from_role_map(&json!({
            "support": {
                "description": "Support Role",
                "scopes": { "include": { "ALL": true } }
            },
            "attendant": {
                "scopes": { "include": { "read": true } }
            },
            "admin": {
                "description": "Admin Role",
                "scopes": {
                    "include": { "ALL": true },
                    "exclude": { "account": { "write": true } }
                }
            }
        }))
        .unwrap();

        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "attendant", "support"]);
        assert_eq!(roles[1].description, "attendant role.");
        assert!(roles[0].exclude.is_some());
        assert!(roles[2].exclude.is_none());
    }

    #[test]
    fn test_from_role_map_missing_scopes() {
        let err = RoleDefinition::from_role_map(&json!({ "ghost": { "description": "x" } }))
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidRole { .. }));

        assert!(RoleDefinition::from_role_map(&json!(["admin"])).is_err());
    }

    #[test]
    fn test_resolved_role_permissions_default_api() {
        let role = ResolvedRole {
            name: "reporter".to_string(),
            description: "Reporter".to_string(),
            scopes: vec![
                GrantedScope {
                    name: "r:accounts".to_string(),
                    description: String::new(),
                    api: None,
                },
                GrantedScope {
                    name: "r:reports".to_string(),
                    description: String::new(),
                    api: Some("https://reports.example".to_string()),
                },
            ],
        };

        let permissions = role.permissions("https://api.example");
        assert_eq!(
            permissions,
            vec![
                Permission::new("https://api.example", "r:accounts"),
                Permission::new("https://reports.example", "r:reports"),
            ]
        );
        assert!(role.grants("r:reports"));
        assert!(!role.grants("w:reports"));
    }
}

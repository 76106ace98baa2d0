//! # Role Resolution
//!
//! Turns a [`RoleDefinition`] and a [`ScopeCatalog`] into a [`ResolvedRole`].
//! Resolution is a pure function of its inputs.
//!
//! Each scope is evaluated on its own:
//!
//! 1. Include: the wildcard, then the scope's action type, then the scope's
//!    resource (a nested resource rule only matches its named action types).
//! 2. Exclude: at most one clause applies. A resource clause is checked
//!    first; only when the resource is absent from the exclude set is the
//!    action type clause checked. A nested resource exclude only removes its
//!    named action types, a plain resource exclude removes every action.

use std::collections::HashSet;

use crate::error::{PolicyError, PolicyResult};
use crate::roles::{GrantedScope, ResolvedRole, RoleDefinition};
use crate::rules::{ResourceClause, RuleSet};
use crate::scopes::{Scope, ScopeCatalog};

/// Resolve one role definition against the catalog.
///
/// # Errors
///
/// Returns [`PolicyError::InvalidRole`] when the role name is empty or the
/// exclude set contains the wildcard.
///
/// # Example
///
/// ```
/// use oidc_policy::{resolve, RoleDefinition, RuleSet, ScopeCatalog};
/// use oidc_policy::actions::ActionType;
///
/// let catalog = ScopeCatalog::from_resources(["accounts", "users"]).unwrap();
/// let admin = RoleDefinition::new("admin", RuleSet::all())
///     .with_exclude(RuleSet::new().with_resource_action("accounts", ActionType::Write));
///
/// let resolved = resolve(&admin, &catalog).unwrap();
/// assert_eq!(resolved.scope_names(), vec!["r:accounts", "r:users", "w:users"]);
/// ```
pub fn resolve(role: &RoleDefinition, catalog: &ScopeCatalog) -> PolicyResult<ResolvedRole> {
    validate(role)?;

    let scopes = catalog
        .iter()
        .filter(|scope| is_granted(scope, &role.include, role.exclude.as_ref()))
        .map(|scope| GrantedScope {
            name: scope.value().to_string(),
            description: scope.description().to_string(),
            api: scope.api().map(str::to_string),
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        role = %role.name,
        granted = scopes.len(),
        catalog = catalog.len(),
        "Resolved role"
    );

    Ok(ResolvedRole {
        name: role.name.clone(),
        description: role.description.clone(),
        scopes,
    })
}

/// Resolve every role definition, in order.
///
/// # Errors
///
/// Fails on the first invalid role, or with [`PolicyError::DuplicateRole`]
/// when two definitions share a name.
pub fn resolve_all(roles: &[RoleDefinition], catalog: &ScopeCatalog) -> PolicyResult<Vec<ResolvedRole>> {
    let mut seen = HashSet::new();
    roles
        .iter()
        .map(|role| {
            if !seen.insert(role.name.as_str()) {
                return Err(PolicyError::DuplicateRole(role.name.clone()));
            }
            resolve(role, catalog)
        })
        .collect()
}

/// Decide whether a single scope is granted by an include/exclude pair.
pub fn is_granted(scope: &Scope, include: &RuleSet, exclude: Option<&RuleSet>) -> bool {
    let action = scope.action();
    let resource = scope.resource();

    let mut include_it = if include.has_wildcard() || include.has_action(action) {
        true
    } else {
        match include.resource_clause(resource, action) {
            ResourceClause::Any | ResourceClause::Nested(true) => true,
            ResourceClause::Nested(false) | ResourceClause::Absent => false,
        }
    };

    if let Some(exclude) = exclude {
        match exclude.resource_clause(resource, action) {
            ResourceClause::Any | ResourceClause::Nested(true) => include_it = false,
            ResourceClause::Nested(false) => {}
            ResourceClause::Absent => {
                if exclude.has_action(action) {
                    include_it = false;
                }
            }
        }
    }

    include_it
}

fn validate(role: &RoleDefinition) -> PolicyResult<()> {
    if role.name.trim().is_empty() {
        return Err(PolicyError::invalid_role(&role.name, "role name must not be empty"));
    }
    if role.exclude.as_ref().is_some_and(RuleSet::has_wildcard) {
        return Err(PolicyError::invalid_role(
            &role.name,
            "the ALL wildcard is only allowed in include rules",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionType;
    use serde_json::json;

    fn catalog() -> ScopeCatalog {
        ScopeCatalog::from_resources(["accounts", "users"]).unwrap()
    }

    fn rules(value: serde_json::Value) -> RuleSet {
        RuleSet::from_value(&value).unwrap()
    }

    fn names(role: &ResolvedRole) -> Vec<&str> {
        role.scope_names()
    }

    #[test]
    fn test_operator_and_admin_scenario() {
        let catalog = catalog();

        let operator = RoleDefinition::new("operator", rules(json!({ "read": true })));
        let resolved = resolve(&operator, &catalog).unwrap();
        assert_eq!(names(&resolved), vec!["r:accounts", "r:users"]);

        let admin = RoleDefinition::new("admin", rules(json!({ "ALL": true })))
            .with_exclude(rules(json!({ "accounts": { "write": true } })));
        let resolved = resolve(&admin, &catalog).unwrap();
        assert_eq!(names(&resolved), vec!["r:accounts", "r:users", "w:users"]);
    }

    #[test]
    fn test_resolution_is_pure() {
        let catalog = catalog();
        let role = RoleDefinition::new("mixed", rules(json!({ "users": true, "write": true })))
            .with_exclude(rules(json!({ "read": true })));

        let first = resolve(&role, &catalog).unwrap();
        let second = resolve(&role, &catalog).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wildcard_include_yields_full_catalog() {
        let catalog = catalog();
        let resolved = resolve(&RoleDefinition::new("owner", RuleSet::all()), &catalog).unwrap();

        let expected: Vec<&str> = catalog.iter().map(|s| s.value()).collect();
        assert_eq!(names(&resolved), expected);
        assert_eq!(resolved.scopes[0].description, "Allows accessing the accounts resource");
    }

    #[test]
    fn test_nested_resource_exclude_overrides_action_include() {
        let catalog = catalog();
        let role = RoleDefinition::new("writer", rules(json!({ "write": true, "read": true })))
            .with_exclude(rules(json!({ "users": { "write": true } })));

        let resolved = resolve(&role, &catalog).unwrap();
        assert!(!resolved.grants("w:users"));
        assert!(resolved.grants("r:users"));
        assert!(resolved.grants("w:accounts"));
        assert!(resolved.grants("r:accounts"));
    }

    #[test]
    fn test_plain_resource_exclude_removes_every_action() {
        let catalog = catalog();
        let role = RoleDefinition::new("no-accounts", rules(json!({ "read": true, "write": true })))
            .with_exclude(rules(json!({ "accounts": true })));

        let resolved = resolve(&role, &catalog).unwrap();
        assert_eq!(names(&resolved), vec!["r:users", "w:users"]);
    }

    #[test]
    fn test_resource_exclude_shadows_action_exclude() {
        let catalog = catalog();
        // `read` would remove r:accounts, but the accounts clause wins and
        // only names `write`, so r:accounts survives.
        let role = RoleDefinition::new("shadowed", RuleSet::all())
            .with_exclude(rules(json!({ "read": true, "accounts": { "write": true } })));

        let resolved = resolve(&role, &catalog).unwrap();
        assert_eq!(names(&resolved), vec!["r:accounts", "w:users"]);
    }

    #[test]
    fn test_nested_resource_include() {
        let catalog = catalog();
        let role = RoleDefinition::new("account-reader", rules(json!({ "accounts": { "read": true } })));

        let resolved = resolve(&role, &catalog).unwrap();
        assert_eq!(names(&resolved), vec!["r:accounts"]);
    }

    #[test]
    fn test_plain_resource_include() {
        let catalog = catalog();
        let role = RoleDefinition::new("user-admin", rules(json!({ "users": true })));

        let resolved = resolve(&role, &catalog).unwrap();
        assert_eq!(names(&resolved), vec!["r:users", "w:users"]);
    }

    #[test]
    fn test_empty_include_grants_nothing() {
        let resolved = resolve(&RoleDefinition::new("nobody", RuleSet::new()), &catalog()).unwrap();
        assert!(resolved.scopes.is_empty());
    }

    #[test]
    fn test_resolved_scopes_keep_explicit_api() {
        let mut catalog = catalog();
        catalog
            .add(Scope::parse("r:reports", "Read reports").unwrap().with_api("https://reports.example"))
            .unwrap();

        let resolved = resolve(
            &RoleDefinition::new("reporter", RuleSet::new().with_resource("reports")),
            &catalog,
        )
        .unwrap();
        assert_eq!(resolved.scopes.len(), 1);
        assert_eq!(resolved.scopes[0].api.as_deref(), Some("https://reports.example"));
    }

    #[test]
    fn test_invalid_roles_are_rejected() {
        let catalog = catalog();

        let unnamed = RoleDefinition::new("  ", RuleSet::all());
        assert!(matches!(resolve(&unnamed, &catalog), Err(PolicyError::InvalidRole { .. })));

        let wildcard_exclude = RoleDefinition::new("odd", RuleSet::all()).with_exclude(RuleSet::all());
        assert!(matches!(
            resolve(&wildcard_exclude, &catalog),
            Err(PolicyError::InvalidRole { .. })
        ));
    }

    #[test]
    fn test_resolve_all_rejects_duplicate_names() {
        let catalog = catalog();
        let roles = vec![
            RoleDefinition::new("operator", RuleSet::new().with_action(ActionType::Read)),
            RoleDefinition::new("operator", RuleSet::all()),
        ];
        assert_eq!(
            resolve_all(&roles, &catalog).unwrap_err(),
            PolicyError::DuplicateRole("operator".to_string())
        );
    }

    #[test]
    fn test_resolved_permissions_are_subset_of_catalog() {
        let catalog = catalog();
        let roles = vec![
            RoleDefinition::new("a", RuleSet::all()),
            RoleDefinition::new("b", rules(json!({ "ghosts": true, "read": true }))),
        ];
        for role in resolve_all(&roles, &catalog).unwrap() {
            for scope in &role.scopes {
                assert!(catalog.contains(&scope.name));
            }
        }
    }
}

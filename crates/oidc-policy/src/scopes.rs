//! # Scopes
//!
//! A scope is an `(action, resource)` capability identifier written as
//! `<code>:<resource>`, for example `r:accounts`. The scope catalog is the
//! authoritative, ordered list of scopes role definitions may reference.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::actions::ActionType;
use crate::error::{PolicyError, PolicyResult};

/// A single scope in the catalog.
///
/// The `value` uniquely determines the action type and resource name; both
/// are parsed once at construction.
///
/// # Example
///
/// ```
/// use oidc_policy::actions::ActionType;
/// use oidc_policy::scopes::Scope;
///
/// let scope = Scope::parse("w:users", "Manage users").unwrap();
/// assert_eq!(scope.action(), ActionType::Write);
/// assert_eq!(scope.resource(), "users");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawScope", into = "RawScope")]
pub struct Scope {
    value: String,
    description: String,
    api: Option<String>,
    action: ActionType,
    resource: String,
}

impl Scope {
    /// Create a scope for an action type on a resource with a generated description.
    pub fn new(action: ActionType, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self {
            value: format!("{}:{}", action.short_code(), resource),
            description: action.describe(&resource),
            api: None,
            action,
            resource,
        }
    }

    /// Parse a scope from its `<code>:<resource>` value.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidScope`] when the separator is missing or
    /// repeated, the resource is empty, or the short code is unknown.
    pub fn parse(value: &str, description: impl Into<String>) -> PolicyResult<Self> {
        let (code, resource) = value
            .split_once(':')
            .ok_or_else(|| PolicyError::invalid_scope(value, "expected '<code>:<resource>'"))?;

        let action = ActionType::from_short_code(code).ok_or_else(|| {
            PolicyError::invalid_scope(value, format!("unknown action code '{}'", code))
        })?;

        if resource.is_empty() {
            return Err(PolicyError::invalid_scope(value, "empty resource name"));
        }
        if resource.contains(':') {
            return Err(PolicyError::invalid_scope(value, "resource name contains ':'"));
        }

        Ok(Self {
            value: value.to_string(),
            description: description.into(),
            api: None,
            action,
            resource: resource.to_string(),
        })
    }

    /// Attach the identifier of a resource server other than the default API.
    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    /// The scope value, e.g. `r:accounts`. This is also the permission name.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Explicit resource server identifier, if any.
    pub fn api(&self) -> Option<&str> {
        self.api.as_deref()
    }

    /// The action type encoded in the value.
    pub fn action(&self) -> ActionType {
        self.action
    }

    /// The resource name encoded in the value.
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

/// Wire shape of a scope: `{ value, description?, api? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawScope {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api: Option<String>,
}

impl TryFrom<RawScope> for Scope {
    type Error = PolicyError;

    fn try_from(raw: RawScope) -> Result<Self, Self::Error> {
        let mut scope = Scope::parse(&raw.value, String::new())?;
        scope.description = match raw.description {
            Some(description) => description,
            None => scope.action.describe(&scope.resource),
        };
        scope.api = raw.api;
        Ok(scope)
    }
}

impl From<Scope> for RawScope {
    fn from(scope: Scope) -> Self {
        RawScope {
            value: scope.value,
            description: Some(scope.description),
            api: scope.api,
        }
    }
}

/// A catalog entry as written in configuration: either a bare resource name
/// (expanded to read and write scopes) or a pre-built scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CatalogEntry {
    /// Resource name, expanded to `r:<name>` and `w:<name>`.
    Resource(String),
    /// Fully specified scope.
    Scope(Scope),
}

/// Ordered, duplicate-free list of scopes.
///
/// # Example
///
/// ```
/// use oidc_policy::scopes::ScopeCatalog;
///
/// let catalog = ScopeCatalog::from_resources(["accounts", "users"]).unwrap();
/// let values: Vec<&str> = catalog.iter().map(|s| s.value()).collect();
/// assert_eq!(values, vec!["r:accounts", "w:accounts", "r:users", "w:users"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeCatalog {
    scopes: Vec<Scope>,
    #[serde(skip)]
    values: HashSet<String>,
}

impl ScopeCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog by expanding each resource name into a read and a write scope.
    pub fn from_resources<I, S>(resources: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::new();
        for resource in resources {
            catalog.add_resource(resource)?;
        }
        Ok(catalog)
    }

    /// Build a catalog from configuration entries, preserving their order.
    pub fn from_entries<I>(entries: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut catalog = Self::new();
        for entry in entries {
            match entry {
                CatalogEntry::Resource(resource) => catalog.add_resource(resource)?,
                CatalogEntry::Scope(scope) => catalog.add(scope)?,
            }
        }
        Ok(catalog)
    }

    /// Append a scope.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::DuplicateScope`] if the value is already present.
    pub fn add(&mut self, scope: Scope) -> PolicyResult<()> {
        if !self.values.insert(scope.value.clone()) {
            return Err(PolicyError::DuplicateScope(scope.value));
        }
        self.scopes.push(scope);
        Ok(())
    }

    /// Append the read and write scopes for a resource, in that order.
    pub fn add_resource(&mut self, resource: impl Into<String>) -> PolicyResult<()> {
        let resource = resource.into();
        if resource.is_empty() || resource.contains(':') {
            return Err(PolicyError::invalid_scope(
                resource,
                "resource names must be non-empty and contain no ':'",
            ));
        }
        for action in ActionType::all() {
            self.add(Scope::new(action, resource.clone()))?;
        }
        Ok(())
    }

    /// Look up a scope by value.
    pub fn get(&self, value: &str) -> Option<&Scope> {
        if !self.values.contains(value) {
            return None;
        }
        self.scopes.iter().find(|s| s.value == value)
    }

    /// Check whether a scope value is in the catalog.
    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    /// Iterate over scopes in catalog order.
    pub fn iter(&self) -> std::slice::Iter<'_, Scope> {
        self.scopes.iter()
    }

    /// All scopes in catalog order.
    pub fn as_slice(&self) -> &[Scope] {
        &self.scopes
    }

    /// Get the number of scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl<'a> IntoIterator for &'a ScopeCatalog {
    type Item = &'a Scope;
    type IntoIter = std::slice::Iter<'a, Scope>;

    fn into_iter(self) -> Self::IntoIter {
        self.scopes.iter()
    }
}

//! # Permissions
//!
//! Provider-native permission grants, and the set of permission names a
//! token carries. Both sides use the scope value (`r:accounts`) as the
//! permission name, which is the only contract between role resolution and
//! request-time enforcement.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A permission as the identity provider stores it on a role: a scope name
/// granted on a resource server (API).
///
/// # Example
///
/// ```
/// use oidc_policy::permissions::Permission;
///
/// let perm = Permission::new("https://api.example", "r:accounts");
/// assert_eq!(perm.to_string(), "https://api.example#r:accounts");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission {
    /// Identifier of the resource server the scope belongs to.
    pub resource_server_identifier: String,
    /// The scope value.
    pub permission_name: String,
}

impl Permission {
    /// Create a new permission.
    pub fn new(
        resource_server_identifier: impl Into<String>,
        permission_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_server_identifier: resource_server_identifier.into(),
            permission_name: permission_name.into(),
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.resource_server_identifier, self.permission_name)
    }
}

/// A set of permission names, as granted by a token.
///
/// # Example
///
/// ```
/// use oidc_policy::permissions::ScopeSet;
///
/// let granted = ScopeSet::from_delimited("r:things w:things");
/// assert!(granted.has("r:things"));
/// assert!(granted.contains_all(["r:things", "w:things"]));
/// assert!(!granted.contains_all(["r:things", "r:other"]));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopeSet {
    scopes: HashSet<String>,
}

impl ScopeSet {
    /// Create a new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space-delimited scope string. Repeated spaces are ignored.
    pub fn from_delimited(scopes: &str) -> Self {
        scopes.split(' ').filter(|s| !s.is_empty()).collect()
    }

    /// Add a scope to the set.
    pub fn add(&mut self, scope: impl Into<String>) {
        self.scopes.insert(scope.into());
    }

    /// Check if the set contains a scope.
    pub fn has(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Check that every scope in `required` is present.
    pub fn contains_all<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        required.into_iter().all(|scope| self.has(scope.as_ref()))
    }

    /// Check that at least one scope in `candidates` is present.
    pub fn contains_any<I, S>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates.into_iter().any(|scope| self.has(scope.as_ref()))
    }

    /// The scopes from `required` that are not present, in input order.
    pub fn missing<'a, I>(&self, required: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a String>,
    {
        required
            .into_iter()
            .filter(|scope| !self.has(scope))
            .map(String::as_str)
            .collect()
    }

    /// Scopes in sorted order.
    pub fn sorted(&self) -> Vec<&str> {
        let mut scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        scopes.sort_unstable();
        scopes
    }

    /// Get the count of scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = ScopeSet::new();
        for scope in iter {
            set.add(scope);
        }
        set
    }
}

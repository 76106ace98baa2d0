//! Declarative policy document: the scope catalog and the role definitions
//! supplied to one reconciliation run.

use serde::{Deserialize, Serialize};

use crate::error::PolicyResult;
use crate::resolver::resolve_all;
use crate::roles::{ResolvedRole, RoleDefinition};
use crate::scopes::{CatalogEntry, ScopeCatalog};

/// Policy as written in configuration.
///
/// ```json
/// {
///   "scopes": ["accounts", "users", { "value": "r:reports", "description": "Read reports" }],
///   "roles": [
///     { "name": "operator", "description": "Operator Role", "include": { "read": true } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Catalog entries: resource names or pre-built scopes.
    #[serde(default)]
    pub scopes: Vec<CatalogEntry>,

    /// Role definitions.
    #[serde(default)]
    pub roles: Vec<RoleDefinition>,
}

impl PolicyDocument {
    /// Decode a policy document from JSON text.
    pub fn from_json(json: &str) -> PolicyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the validated scope catalog.
    pub fn catalog(&self) -> PolicyResult<ScopeCatalog> {
        ScopeCatalog::from_entries(self.scopes.iter().cloned())
    }

    /// Build the catalog and resolve every role against it.
    pub fn resolve(&self) -> PolicyResult<(ScopeCatalog, Vec<ResolvedRole>)> {
        let catalog = self.catalog()?;
        let roles = resolve_all(&self.roles, &catalog)?;
        Ok((catalog, roles))
    }
}

//! # Rule Sets
//!
//! A rule set selects scopes from the catalog. It is written in configuration
//! as a JSON object and compiled into explicit [`RuleEntry`] values:
//!
//! ```text
//! { "ALL": true }                      -> AllResources
//! { "read": true }                     -> ActionType(read)
//! { "accounts": true }                 -> ResourceAny(accounts)
//! { "accounts": { "write": true } }    -> ResourceAction(accounts, write)
//! ```
//!
//! Keys are classified in that order: the wildcard key first, then action
//! type names, and anything else is a resource name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::actions::ActionType;
use crate::error::{PolicyError, PolicyResult};

/// The wildcard key matching every scope.
pub const WILDCARD_KEY: &str = "ALL";

/// A single compiled rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleEntry {
    /// Matches every scope.
    AllResources,
    /// Matches every scope of an action type.
    ActionType(ActionType),
    /// Matches every scope of a resource.
    ResourceAny(String),
    /// Matches one action type on one resource.
    ResourceAction(String, ActionType),
}

/// How a rule set refers to a particular resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClause {
    /// The resource key is absent.
    Absent,
    /// The resource key is a plain marker.
    Any,
    /// The resource key is a nested rule; `true` when it names the action type.
    Nested(bool),
}

/// A compiled rule set.
///
/// # Example
///
/// ```
/// use oidc_policy::actions::ActionType;
/// use oidc_policy::rules::{ResourceClause, RuleSet};
/// use serde_json::json;
///
/// let rules = RuleSet::from_value(&json!({ "accounts": { "write": true } })).unwrap();
/// assert_eq!(
///     rules.resource_clause("accounts", ActionType::Write),
///     ResourceClause::Nested(true)
/// );
/// assert_eq!(
///     rules.resource_clause("accounts", ActionType::Read),
///     ResourceClause::Nested(false)
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    entries: Vec<RuleEntry>,
}

impl RuleSet {
    /// Create an empty rule set (matches nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// A rule set containing only the wildcard.
    pub fn all() -> Self {
        Self::new().with(RuleEntry::AllResources)
    }

    /// Add an entry, ignoring exact duplicates.
    pub fn with(mut self, entry: RuleEntry) -> Self {
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
        self
    }

    /// Add an action type entry.
    pub fn with_action(self, action: ActionType) -> Self {
        self.with(RuleEntry::ActionType(action))
    }

    /// Add a plain resource entry.
    pub fn with_resource(self, resource: impl Into<String>) -> Self {
        self.with(RuleEntry::ResourceAny(resource.into()))
    }

    /// Add a resource entry refined by an action type.
    pub fn with_resource_action(self, resource: impl Into<String>, action: ActionType) -> Self {
        self.with(RuleEntry::ResourceAction(resource.into(), action))
    }

    /// Compile a rule set from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::MalformedRuleSet`] when the value is not an
    /// object, a marker is anything other than `true`, a nested rule names an
    /// unknown action type, or a nested rule is empty.
    pub fn from_value(value: &Value) -> PolicyResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            PolicyError::MalformedRuleSet(format!("expected an object, found {}", kind_of(value)))
        })?;

        let mut rules = RuleSet::new();
        for (key, entry) in object {
            if key == WILDCARD_KEY {
                expect_marker(key, entry)?;
                rules = rules.with(RuleEntry::AllResources);
            } else if let Some(action) = ActionType::parse(key) {
                expect_marker(key, entry)?;
                rules = rules.with_action(action);
            } else {
                rules = rules.with_resource_value(key, entry)?;
            }
        }
        Ok(rules)
    }

    fn with_resource_value(mut self, resource: &str, value: &Value) -> PolicyResult<Self> {
        match value {
            Value::Object(nested) => {
                if nested.is_empty() {
                    return Err(PolicyError::MalformedRuleSet(format!(
                        "rule for resource '{}' names no action types",
                        resource
                    )));
                }
                for (key, marker) in nested {
                    let action = ActionType::parse(key).ok_or_else(|| {
                        PolicyError::MalformedRuleSet(format!(
                            "unknown action type '{}' under resource '{}'",
                            key, resource
                        ))
                    })?;
                    expect_marker(&format!("{}.{}", resource, key), marker)?;
                    self = self.with_resource_action(resource, action);
                }
                Ok(self)
            }
            other => {
                expect_marker(resource, other)?;
                Ok(self.with_resource(resource))
            }
        }
    }

    /// Render the rule set back into its JSON form.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        let mut nested: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();

        for entry in &self.entries {
            match entry {
                RuleEntry::AllResources => {
                    object.insert(WILDCARD_KEY.to_string(), Value::Bool(true));
                }
                RuleEntry::ActionType(action) => {
                    object.insert(action.as_str().to_string(), Value::Bool(true));
                }
                RuleEntry::ResourceAny(resource) => {
                    object.insert(resource.clone(), Value::Bool(true));
                }
                RuleEntry::ResourceAction(resource, action) => {
                    nested
                        .entry(resource.as_str())
                        .or_default()
                        .insert(action.as_str().to_string(), Value::Bool(true));
                }
            }
        }
        for (resource, actions) in nested {
            object.insert(resource.to_string(), Value::Object(actions));
        }
        Value::Object(object)
    }

    /// Check for the wildcard entry.
    pub fn has_wildcard(&self) -> bool {
        self.entries.contains(&RuleEntry::AllResources)
    }

    /// Check for an action type entry.
    pub fn has_action(&self, action: ActionType) -> bool {
        self.entries.contains(&RuleEntry::ActionType(action))
    }

    /// Describe how this rule set refers to `resource`, relative to `action`.
    ///
    /// A nested rule takes precedence over a plain marker for the same
    /// resource, since the JSON form cannot hold both under one key.
    pub fn resource_clause(&self, resource: &str, action: ActionType) -> ResourceClause {
        let mut clause = ResourceClause::Absent;
        for entry in &self.entries {
            match entry {
                RuleEntry::ResourceAction(r, a) if r == resource => {
                    if *a == action {
                        return ResourceClause::Nested(true);
                    }
                    clause = ResourceClause::Nested(false);
                }
                RuleEntry::ResourceAny(r) if r == resource => {
                    if clause == ResourceClause::Absent {
                        clause = ResourceClause::Any;
                    }
                }
                _ => {}
            }
        }
        clause
    }

    /// Compiled entries.
    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Value> for RuleSet {
    type Error = PolicyError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        RuleSet::from_value(&value)
    }
}

impl From<RuleSet> for Value {
    fn from(rules: RuleSet) -> Self {
        rules.to_value()
    }
}

impl Serialize for RuleSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RuleSet::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn expect_marker(key: &str, value: &Value) -> PolicyResult<()> {
    match value {
        Value::Bool(true) => Ok(()),
        other => Err(PolicyError::MalformedRuleSet(format!(
            "key '{}' must be the marker true, found {}",
            key,
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_classification() {
        let rules = RuleSet::from_value(&json!({
            "ALL": true,
            "read": true,
            "users": true,
            "accounts": { "write": true }
        }))
        .unwrap();

        assert!(rules.has_wildcard());
        assert!(rules.has_action(ActionType::Read));
        assert!(!rules.has_action(ActionType::Write));
        assert!(rules.entries().contains(&RuleEntry::ResourceAny("users".to_string())));
        assert!(rules
            .entries()
            .contains(&RuleEntry::ResourceAction("accounts".to_string(), ActionType::Write)));
        assert_eq!(rules.len(), 4);
    }

    #[test]
    fn test_resource_clause() {
        let rules = RuleSet::new()
            .with_resource("users")
            .with_resource_action("accounts", ActionType::Read);

        assert_eq!(rules.resource_clause("users", ActionType::Write), ResourceClause::Any);
        assert_eq!(
            rules.resource_clause("accounts", ActionType::Read),
            ResourceClause::Nested(true)
        );
        assert_eq!(
            rules.resource_clause("accounts", ActionType::Write),
            ResourceClause::Nested(false)
        );
        assert_eq!(
            rules.resource_clause("reports", ActionType::Read),
            ResourceClause::Absent
        );
    }

    #[test]
    fn test_non_object_rule_set_is_rejected() {
        for value in [json!(true), json!("ALL"), json!(["read"]), json!(null), json!(3)] {
            assert!(matches!(
                RuleSet::from_value(&value),
                Err(PolicyError::MalformedRuleSet(_))
            ));
        }
    }

    #[test]
    fn test_markers_must_be_true() {
        assert!(RuleSet::from_value(&json!({ "ALL": false })).is_err());
        assert!(RuleSet::from_value(&json!({ "read": 1 })).is_err());
        assert!(RuleSet::from_value(&json!({ "users": "yes" })).is_err());
        assert!(RuleSet::from_value(&json!({ "users": { "write": false } })).is_err());
    }

    #[test]
    fn test_nested_rule_validation() {
        let err = RuleSet::from_value(&json!({ "users": { "delete": true } })).unwrap_err();
        assert!(err.to_string().contains("unknown action type 'delete'"));

        let err = RuleSet::from_value(&json!({ "users": {} })).unwrap_err();
        assert!(err.to_string().contains("names no action types"));

        // Action type keys must be markers, never nested rules.
        assert!(RuleSet::from_value(&json!({ "read": { "write": true } })).is_err());
    }

    #[test]
    fn test_value_round_trip_preserves_rules() {
        let original = json!({
            "read": true,
            "users": true,
            "accounts": { "read": true, "write": true }
        });
        let rules = RuleSet::from_value(&original).unwrap();
        let reparsed = RuleSet::from_value(&rules.to_value()).unwrap();

        for entry in rules.entries() {
            assert!(reparsed.entries().contains(entry));
        }
        assert_eq!(rules.len(), reparsed.len());
    }

    #[test]
    fn test_serde_deserialize_reports_malformed_rules() {
        let result: Result<RuleSet, _> = serde_json::from_value(json!(["ALL"]));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Malformed rule set"));
    }
}

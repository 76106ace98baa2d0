//! # Action Types
//!
//! Defines the action types a scope can grant on a resource.
//! Each action type has a short code used inside scope values
//! (`r:accounts`) and a long name used inside role rule sets (`read`).

use serde::{Deserialize, Serialize};

/// Action types that can be granted on a resource.
///
/// - **Read**: short code `r`, name `read`
/// - **Write**: short code `w`, name `write`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Read/view a resource.
    Read,

    /// Create and update a resource.
    Write,
}

impl ActionType {
    /// Get the action type name used as a rule set key.
    ///
    /// # Returns
    ///
    /// A static string representation of the action type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Read => "read",
            ActionType::Write => "write",
        }
    }

    /// Get the short code used as the prefix of a scope value.
    pub fn short_code(&self) -> &'static str {
        match self {
            ActionType::Read => "r",
            ActionType::Write => "w",
        }
    }

    /// Parse an action type from its rule set name.
    ///
    /// # Example
    ///
    /// ```
    /// use oidc_policy::actions::ActionType;
    ///
    /// assert_eq!(ActionType::parse("read"), Some(ActionType::Read));
    /// assert_eq!(ActionType::parse("write"), Some(ActionType::Write));
    /// assert_eq!(ActionType::parse("r"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(ActionType::Read),
            "write" => Some(ActionType::Write),
            _ => None,
        }
    }

    /// Parse an action type from its scope short code.
    ///
    /// # Example
    ///
    /// ```
    /// use oidc_policy::actions::ActionType;
    ///
    /// assert_eq!(ActionType::from_short_code("r"), Some(ActionType::Read));
    /// assert_eq!(ActionType::from_short_code("x"), None);
    /// ```
    pub fn from_short_code(code: &str) -> Option<Self> {
        match code {
            "r" => Some(ActionType::Read),
            "w" => Some(ActionType::Write),
            _ => None,
        }
    }

    /// Get all action types, in the order scopes are expanded.
    pub fn all() -> [Self; 2] {
        [ActionType::Read, ActionType::Write]
    }

    /// Generated description for a scope of this action type on `resource`.
    pub fn describe(&self, resource: &str) -> String {
        match self {
            ActionType::Read => format!("Allows accessing the {} resource", resource),
            ActionType::Write => {
                format!("Allows creating and updating the {} resource.", resource)
            }
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

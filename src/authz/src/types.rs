//! Core access-control types

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Well-known resource names
pub mod resources {
    /// Employee records
    pub const EMPLOYEE: &str = "employee";
    /// Departments
    pub const DEPARTMENT: &str = "department";
    /// Teams
    pub const TEAM: &str = "team";
    /// Matches any resource
    pub const WILDCARD: &str = "*";
}

/// Organizational role held by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Ceo,
    Vp,
    Manager,
    TeamLead,
    Employee,
}

impl Role {
    /// All roles, most senior first
    pub const ALL: [Role; 5] = [
        Role::Ceo,
        Role::Vp,
        Role::Manager,
        Role::TeamLead,
        Role::Employee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ceo => "ceo",
            Role::Vp => "vp",
            Role::Manager => "manager",
            Role::TeamLead => "team_lead",
            Role::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AuthzError::UnknownRole(s.to_string()))
    }
}

/// Action performed on a resource
///
/// `Manage` is the wildcard action: a rule granting it matches every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Manage,
    Approve,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Manage,
        Action::Approve,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
            Action::Approve => "approve",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| AuthzError::UnknownAction(s.to_string()))
    }
}

/// A directly granted permission: a resource (or `*`) and the actions allowed on it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Resource name, or `*` for any resource
    pub resource: String,

    /// Granted actions
    pub actions: BTreeSet<Action>,
}

impl PermissionRule {
    /// Create a new rule
    pub fn new(resource: impl Into<String>, actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            resource: resource.into(),
            actions: actions.into_iter().collect(),
        }
    }

    /// Rule matching every resource and every action
    pub fn wildcard() -> Self {
        Self::new(resources::WILDCARD, [Action::Manage])
    }

    /// Validate the rule definition
    pub fn validate(&self) -> Result<()> {
        if self.resource.trim().is_empty() {
            return Err(AuthzError::InvalidRule(
                "Rule resource cannot be empty".to_string(),
            ));
        }

        if self.actions.is_empty() {
            return Err(AuthzError::InvalidRule(format!(
                "Rule for resource '{}' grants no actions",
                self.resource
            )));
        }

        Ok(())
    }

    pub fn covers_resource(&self, resource: &str) -> bool {
        self.resource == resources::WILDCARD || self.resource == resource
    }

    pub fn covers_action(&self, action: Action) -> bool {
        self.actions.contains(&action) || self.actions.contains(&Action::Manage)
    }

    /// Check whether this rule grants `action` on `resource`
    pub fn matches(&self, resource: &str, action: Action) -> bool {
        self.covers_resource(resource) && self.covers_action(action)
    }
}

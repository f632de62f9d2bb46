//! Permission catalog and role hierarchy
//!
//! Both tables are loaded once at process start and never mutated afterwards.
//! They are bundled into a single [`AccessControlConfig`] value that is shared
//! by reference (usually behind an `Arc`) with the resolver.
//!
//! # TOML format
//!
//! ```toml
//! [grants]
//! ceo = [{ resource = "*", actions = ["manage"] }]
//! employee = [
//!     { resource = "employee", actions = ["read"] },
//!     { resource = "department", actions = ["read"] },
//! ]
//!
//! [hierarchy]
//! ceo = ["vp"]
//! vp = ["manager"]
//! ```

use crate::error::{AuthzError, Result};
use crate::types::{resources, Action, PermissionRule, Role};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Role → directly granted rules
#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    grants: HashMap<Role, Vec<PermissionRule>>,
}

impl PermissionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a rule to a role
    pub fn grant(mut self, role: Role, rule: PermissionRule) -> Self {
        self.grants.entry(role).or_default().push(rule);
        self
    }

    /// Rules granted directly to `role` (not inherited)
    pub fn direct(&self, role: Role) -> &[PermissionRule] {
        self.grants.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Directed graph: role → roles it inherits permissions from
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    edges: HashMap<Role, Vec<Role>>,
}

impl RoleHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `role` inherits from `parent`
    pub fn inherit(mut self, role: Role, parent: Role) -> Self {
        let parents = self.edges.entry(role).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        self
    }

    /// Roles `role` inherits from directly
    pub fn parents(&self, role: Role) -> &[Role] {
        self.edges.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a cycle in the hierarchy, if any
    ///
    /// Three-colour DFS: a back edge to a node still on the stack closes a
    /// cycle. The returned path starts and ends with the same role.
    pub fn detect_cycle(&self) -> Option<Vec<Role>> {
        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state: HashMap<Role, u8> = HashMap::new();
        let mut path = Vec::new();

        for role in Role::ALL {
            if state.get(&role).copied().unwrap_or(0) == 0 {
                if let Some(cycle) = self.visit(role, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn visit(
        &self,
        role: Role,
        state: &mut HashMap<Role, u8>,
        path: &mut Vec<Role>,
    ) -> Option<Vec<Role>> {
        match state.get(&role) {
            Some(1) => {
                let start = path.iter().position(|r| *r == role)?;
                let mut cycle = path[start..].to_vec();
                cycle.push(role);
                return Some(cycle);
            }
            Some(2) => return None,
            _ => {}
        }

        state.insert(role, 1);
        path.push(role);

        for parent in self.parents(role) {
            if let Some(cycle) = self.visit(*parent, state, path) {
                return Some(cycle);
            }
        }

        state.insert(role, 2);
        path.pop();
        None
    }
}

/// Immutable access-control configuration: catalog plus hierarchy
#[derive(Debug, Clone, Default)]
pub struct AccessControlConfig {
    pub catalog: PermissionCatalog,
    pub hierarchy: RoleHierarchy,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    grants: BTreeMap<String, Vec<RawRule>>,
    #[serde(default)]
    hierarchy: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    resource: String,
    actions: Vec<String>,
}

impl AccessControlConfig {
    pub fn new(catalog: PermissionCatalog, hierarchy: RoleHierarchy) -> Self {
        Self { catalog, hierarchy }
    }

    /// The canonical organization configuration
    ///
    /// `ceo → vp → manager → team_lead → employee`; the CEO holds the global
    /// wildcard and employees may read employee and department records.
    pub fn standard() -> Self {
        let catalog = PermissionCatalog::new()
            .grant(Role::Ceo, PermissionRule::wildcard())
            .grant(
                Role::Employee,
                PermissionRule::new(resources::EMPLOYEE, [Action::Read]),
            )
            .grant(
                Role::Employee,
                PermissionRule::new(resources::DEPARTMENT, [Action::Read]),
            );

        let hierarchy = RoleHierarchy::new()
            .inherit(Role::Ceo, Role::Vp)
            .inherit(Role::Vp, Role::Manager)
            .inherit(Role::Manager, Role::TeamLead)
            .inherit(Role::TeamLead, Role::Employee);

        Self::new(catalog, hierarchy)
    }

    /// Parse a configuration from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(source)
            .map_err(|e| {
                AuthzError::Config(format!("Failed to parse access control config: {}", e))
            })?;

        let mut catalog = PermissionCatalog::new();
        for (role_name, rules) in raw.grants {
            let role: Role = role_name.parse()?;
            for raw_rule in rules {
                let actions = raw_rule
                    .actions
                    .iter()
                    .map(|a| a.parse::<Action>())
                    .collect::<Result<Vec<_>>>()?;
                let rule = PermissionRule::new(raw_rule.resource, actions);
                rule.validate()?;
                catalog = catalog.grant(role, rule);
            }
        }

        let mut hierarchy = RoleHierarchy::new();
        for (role_name, parents) in raw.hierarchy {
            let role: Role = role_name.parse()?;
            for parent_name in parents {
                hierarchy = hierarchy.inherit(role, parent_name.parse()?);
            }
        }

        Ok(Self::new(catalog, hierarchy))
    }

    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }
}

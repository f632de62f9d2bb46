//! Effective-permission resolution over the role hierarchy
//!
//! The resolver computes, for a role, the union of its own rules and the
//! rules of every role reachable through the hierarchy. The walk is an
//! iterative breadth-first traversal guarded by a visited set, so a
//! misconfigured cyclic hierarchy still terminates.
//!
//! Results are memoized per role in a [`DashMap`]. Because the configuration
//! is immutable for the lifetime of the resolver, cached entries never need
//! invalidation.
//!
//! # Example
//!
//! ```rust
//! use hrms_authz::{AccessControlConfig, PermissionResolver, Role};
//! use std::sync::Arc;
//!
//! let resolver = PermissionResolver::new(Arc::new(AccessControlConfig::standard()));
//! let rules = resolver.effective_permissions(Role::Manager);
//!
//! // managers inherit the employee read grants
//! assert!(rules.iter().any(|r| r.resource == "employee"));
//! ```

use crate::catalog::AccessControlConfig;
use crate::types::{PermissionRule, Role};
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Computes effective permissions for roles
///
/// Cheap to clone; clones share the configuration and the memo table.
#[derive(Clone)]
pub struct PermissionResolver {
    config: Arc<AccessControlConfig>,
    cache: Arc<DashMap<Role, Arc<[PermissionRule]>>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
}

impl PermissionResolver {
    pub fn new(config: Arc<AccessControlConfig>) -> Self {
        Self {
            config,
            cache: Arc::new(DashMap::new()),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The configuration this resolver was built from
    pub fn config(&self) -> &AccessControlConfig {
        &self.config
    }

    /// All roles whose rules apply to `role`, including `role` itself
    ///
    /// Returned in breadth-first order from `role`.
    pub fn inherited_roles(&self, role: Role) -> Vec<Role> {
        let mut visited: HashSet<Role> = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([role]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current);

            for parent in self.config.hierarchy.parents(current) {
                if !visited.contains(parent) {
                    queue.push_back(*parent);
                }
            }
        }

        order
    }

    /// Own rules of `role` unioned with the rules of every inherited role
    pub fn effective_permissions(&self, role: Role) -> Arc<[PermissionRule]> {
        if let Some(cached) = self.cache.get(&role) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(cached.value());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);

        let mut rules: Vec<PermissionRule> = Vec::new();
        for source in self.inherited_roles(role) {
            for rule in self.config.catalog.direct(source) {
                if !rules.contains(rule) {
                    rules.push(rule.clone());
                }
            }
        }

        trace!(role = %role, rules = rules.len(), "Resolved effective permissions");

        let rules: Arc<[PermissionRule]> = rules.into();
        self.cache.insert(role, Arc::clone(&rules));
        rules
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PermissionCatalog, RoleHierarchy};
    use crate::types::Action;

    fn standard() -> PermissionResolver {
        PermissionResolver::new(Arc::new(AccessControlConfig::standard()))
    }

    #[test]
    fn test_inherited_roles_follow_chain() {
        let resolver = standard();

        assert_eq!(
            resolver.inherited_roles(Role::Vp),
            vec![Role::Vp, Role::Manager, Role::TeamLead, Role::Employee]
        );
        assert_eq!(resolver.inherited_roles(Role::Employee), vec![Role::Employee]);
    }

    #[test]
    fn test_effective_permissions_include_inherited_rules() {
        let resolver = standard();
        let rules = resolver.effective_permissions(Role::TeamLead);

        assert_eq!(rules.len(), 2);
        assert!(rules.iter().any(|r| r.matches("employee", Action::Read)));
        assert!(rules.iter().any(|r| r.matches("department", Action::Read)));
    }

    #[test]
    fn test_ceo_holds_wildcard_and_inherited_rules() {
        let rules = standard().effective_permissions(Role::Ceo);

        assert!(rules.contains(&PermissionRule::wildcard()));
        assert_eq!(rules.len(), 3);
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let catalog = PermissionCatalog::new()
            .grant(Role::Manager, PermissionRule::new("team", [Action::Update]))
            .grant(Role::Employee, PermissionRule::new("employee", [Action::Read]));
        let hierarchy = RoleHierarchy::new()
            .inherit(Role::Manager, Role::Employee)
            .inherit(Role::Employee, Role::Manager);

        let config = AccessControlConfig::new(catalog, hierarchy);
        let resolver = PermissionResolver::new(Arc::new(config));

        assert_eq!(resolver.effective_permissions(Role::Manager).len(), 2);
        assert_eq!(resolver.effective_permissions(Role::Employee).len(), 2);
    }

    #[test]
    fn test_diamond_hierarchy_visits_shared_parent_once() {
        let catalog = PermissionCatalog::new()
            .grant(Role::Employee, PermissionRule::new("employee", [Action::Read]));
        let hierarchy = RoleHierarchy::new()
            .inherit(Role::Vp, Role::Manager)
            .inherit(Role::Vp, Role::TeamLead)
            .inherit(Role::Manager, Role::Employee)
            .inherit(Role::TeamLead, Role::Employee);

        let config = AccessControlConfig::new(catalog, hierarchy);
        let resolver = PermissionResolver::new(Arc::new(config));

        assert_eq!(resolver.inherited_roles(Role::Vp).len(), 4);
        assert_eq!(resolver.effective_permissions(Role::Vp).len(), 1);
    }

    #[test]
    fn test_memoization() {
        let resolver = standard();

        let first = resolver.effective_permissions(Role::Manager);
        let second = resolver.effective_permissions(Role::Manager);

        assert!(Arc::ptr_eq(&first, &second));

        let stats = resolver.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_clones_share_cache() {
        let resolver = standard();
        let clone = resolver.clone();

        resolver.effective_permissions(Role::Vp);
        clone.effective_permissions(Role::Vp);

        assert_eq!(resolver.cache_stats().hits, 1);
    }
}

//! Integration tests for the access-control layer
//!
//! Covers inheritance monotonicity, wildcard behaviour, base-role grants,
//! file-based configuration and concurrent resolution.

use hrms_authz::{
    resources, AccessControlConfig, Action, AuthorizationGate, PermissionCatalog,
    PermissionResolver, PermissionRule, Role, RoleHierarchy,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use tokio::task::JoinSet;

fn standard_gate() -> AuthorizationGate {
    AuthorizationGate::new(PermissionResolver::new(Arc::new(
        AccessControlConfig::standard(),
    )))
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::ALL.to_vec())
}

/// An arbitrary hierarchy over the five roles, cycles included
fn hierarchy_strategy() -> impl Strategy<Value = Vec<(Role, Role)>> {
    prop::collection::vec((role_strategy(), role_strategy()), 0..12)
}

fn build_resolver(edges: &[(Role, Role)]) -> PermissionResolver {
    let mut catalog = PermissionCatalog::new();
    for (i, role) in Role::ALL.into_iter().enumerate() {
        catalog = catalog.grant(role, PermissionRule::new(format!("res{}", i), [Action::Read]));
    }

    let mut hierarchy = RoleHierarchy::new();
    for (child, parent) in edges {
        hierarchy = hierarchy.inherit(*child, *parent);
    }

    PermissionResolver::new(Arc::new(AccessControlConfig::new(catalog, hierarchy)))
}

proptest! {
    #[test]
    fn prop_inheritance_is_monotonic(edges in hierarchy_strategy()) {
        let resolver = build_resolver(&edges);

        for (child, parent) in &edges {
            let child_rules: HashSet<PermissionRule> =
                resolver.effective_permissions(*child).iter().cloned().collect();
            let parent_rules: HashSet<PermissionRule> =
                resolver.effective_permissions(*parent).iter().cloned().collect();

            prop_assert!(child_rules.is_superset(&parent_rules));
        }
    }

    #[test]
    fn prop_top_role_allowed_everywhere(resource in "[a-z_]{0,16}", action in action_strategy()) {
        let gate = standard_gate();
        prop_assert!(gate.check(Role::Ceo, &resource, action));
    }

    #[test]
    fn prop_every_role_keeps_its_own_rules(edges in hierarchy_strategy(), role in role_strategy()) {
        let resolver = build_resolver(&edges);
        let effective = resolver.effective_permissions(role);

        for rule in resolver.config().catalog.direct(role) {
            prop_assert!(effective.contains(rule));
        }
    }
}

#[test]
fn test_standard_chain_is_monotonic() {
    let resolver = PermissionResolver::new(Arc::new(AccessControlConfig::standard()));

    for pair in Role::ALL.windows(2) {
        let senior: HashSet<_> = resolver.effective_permissions(pair[0]).iter().cloned().collect();
        let junior: HashSet<_> = resolver.effective_permissions(pair[1]).iter().cloned().collect();
        assert!(senior.is_superset(&junior), "{} should include {}", pair[0], pair[1]);
    }
}

#[test]
fn test_base_role_grants() {
    let gate = standard_gate();

    assert!(gate.check(Role::Employee, resources::EMPLOYEE, Action::Read));
    assert!(!gate.check(Role::Employee, resources::DEPARTMENT, Action::Create));
}

#[test]
fn test_manage_grant_on_single_resource() {
    let catalog = PermissionCatalog::new()
        .grant(Role::Manager, PermissionRule::new(resources::TEAM, [Action::Manage]));
    let gate = AuthorizationGate::new(PermissionResolver::new(Arc::new(
        AccessControlConfig::new(catalog, RoleHierarchy::new()),
    )));

    assert!(gate.check(Role::Manager, resources::TEAM, Action::Approve));
    assert!(gate.check(Role::Manager, resources::TEAM, Action::Delete));
    assert!(!gate.check(Role::Manager, resources::EMPLOYEE, Action::Read));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[grants]
ceo = [{{ resource = "*", actions = ["manage"] }}]
team_lead = [{{ resource = "team", actions = ["read", "approve"] }}]

[hierarchy]
ceo = ["team_lead"]
"#
    )
    .unwrap();

    let config = AccessControlConfig::load(file.path()).unwrap();
    let gate = AuthorizationGate::new(PermissionResolver::new(Arc::new(config)));

    assert!(gate.check(Role::TeamLead, "team", Action::Approve));
    assert!(!gate.check(Role::TeamLead, "team", Action::Delete));
    assert!(!gate.check(Role::Employee, "employee", Action::Read));
    assert!(gate.check(Role::Ceo, "anything", Action::Delete));
}

#[test]
fn test_load_missing_file_fails() {
    let result = AccessControlConfig::load("/nonexistent/access-control.toml");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_concurrent_checks_agree() {
    let gate = standard_gate();
    let mut tasks = JoinSet::new();

    for i in 0..64 {
        let gate = gate.clone();
        tasks.spawn(async move {
            let role = Role::ALL[i % Role::ALL.len()];
            (
                role,
                gate.check(role, resources::DEPARTMENT, Action::Read),
                gate.check(role, resources::DEPARTMENT, Action::Delete),
            )
        });
    }

    while let Some(result) = tasks.join_next().await {
        let (role, can_read, can_delete) = result.unwrap();
        assert!(can_read);
        assert_eq!(can_delete, role == Role::Ceo);
    }

    let stats = gate.resolver().cache_stats();
    assert_eq!(stats.entries, Role::ALL.len());
    assert!(stats.hits + stats.misses >= 128);
}

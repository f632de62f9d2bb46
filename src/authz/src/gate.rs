//! Allow/deny decisions for (role, resource, action) triples

use crate::resolver::PermissionResolver;
use crate::types::{Action, PermissionRule, Role};
use serde::Serialize;
use tracing::debug;

/// Outcome of an authorization check with the rule that granted it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub allowed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<PermissionRule>,

    pub reason: String,
}

/// Pure authorization decision function built on the resolver
///
/// The gate never constructs error responses: callers turn a `false` into
/// an authorization failure at their own boundary.
#[derive(Clone)]
pub struct AuthorizationGate {
    resolver: PermissionResolver,
}

impl AuthorizationGate {
    pub fn new(resolver: PermissionResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// True iff some effective rule of `role` covers `resource` and `action`
    pub fn check(&self, role: Role, resource: &str, action: Action) -> bool {
        self.explain(role, resource, action).allowed
    }

    /// Like [`check`](Self::check) but reports the first matching rule
    pub fn explain(&self, role: Role, resource: &str, action: Action) -> AccessDecision {
        let rules = self.resolver.effective_permissions(role);

        match rules.iter().find(|rule| rule.matches(resource, action)) {
            Some(rule) => AccessDecision {
                allowed: true,
                matched_rule: Some(rule.clone()),
                reason: format!(
                    "Role '{}' is granted {:?} on '{}'",
                    role, rule.actions, rule.resource
                ),
            },
            None => {
                debug!(role = %role, resource, action = %action, "Permission denied");
                AccessDecision {
                    allowed: false,
                    matched_rule: None,
                    reason: format!(
                        "Role '{}' may not {} '{}'",
                        role, action, resource
                    ),
                }
            }
        }
    }
}

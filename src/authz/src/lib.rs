//! # HRMS Access Control
//!
//! Hierarchical role-permission resolution for the HR backend.
//!
//! ## Features
//!
//! - **Immutable configuration** built once at startup ([`AccessControlConfig`])
//! - **Transitive inheritance** over a general role graph, cycle-safe
//! - **Memoized resolution** with lock-free concurrent access (DashMap)
//! - **Wildcards**: resource `*` and the `manage` action
//!
//! ## Example
//!
//! ```rust
//! use hrms_authz::{AccessControlConfig, Action, AuthorizationGate, PermissionResolver, Role};
//! use std::sync::Arc;
//!
//! let config = Arc::new(AccessControlConfig::standard());
//! let gate = AuthorizationGate::new(PermissionResolver::new(config));
//!
//! assert!(gate.check(Role::Ceo, "department", Action::Create));
//! assert!(!gate.check(Role::Employee, "department", Action::Create));
//! ```

pub mod catalog;
pub mod error;
pub mod gate;
pub mod resolver;
pub mod types;

pub use catalog::{AccessControlConfig, PermissionCatalog, RoleHierarchy};
pub use error::{AuthzError, Result};
pub use gate::{AccessDecision, AuthorizationGate};
pub use resolver::{CacheStats, PermissionResolver};
pub use types::{resources, Action, PermissionRule, Role};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! HRMS organization engine
//!
//! Department lifecycle with transactional head-of-department role
//! synchronization and an immutable snapshot history.
//!
//! # Example
//!
//! ```no_run
//! use hrms_authz::Role;
//! use hrms_org::{EngineConfig, InMemoryOrgStore, NewDepartment, OrgConsistencyEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> hrms_org::Result<()> {
//! let store = Arc::new(InMemoryOrgStore::new());
//! let (head, _user) = store.register_person(Role::Employee).await;
//!
//! let engine = OrgConsistencyEngine::new(EngineConfig::default(), store);
//! let department = engine
//!     .create_department(NewDepartment::new("Engineering", head, 100_000.0))
//!     .await?;
//!
//! let history = engine.list_versions(department.id).await?;
//! assert_eq!(history.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod store;
pub mod version;

pub use engine::{EngineConfig, OrgConsistencyEngine};
pub use error::{OrgError, Result};
pub use metrics::{EngineMetrics, MetricsCollector};
pub use models::{
    Department, DepartmentId, DepartmentPatch, DepartmentVersion, Employee, EmployeeId,
    NewDepartment, TeamId, User, UserId, VersionId, MAX_NAME_LEN,
};
pub use notify::{
    ChannelNotifier, DepartmentEvent, DepartmentEventKind, LogNotifier, Notifier, NotifyError,
    RoleChange,
};
pub use store::{InMemoryOrgStore, OrgStore, UnitOfWork};
#[cfg(feature = "postgres")]
pub use store::PgOrgStore;
pub use version::VersionStore;

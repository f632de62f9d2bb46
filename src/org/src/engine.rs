//! Organizational consistency engine
//!
//! Orchestrates department create/update/delete/revert. Every operation is
//! one unit of work: the department write, its snapshot and any role change
//! of the affected heads commit together or not at all.
//!
//! ```text
//! validate → begin → stage (reads, snapshot, roles, department) → commit
//!                       ↓ error                                     ↓
//!                    rollback                          metrics + notifier
//! ```

use crate::error::{OrgError, Result};
use crate::metrics::MetricsCollector;
use crate::models::{
    Department, DepartmentId, DepartmentPatch, DepartmentVersion, EmployeeId, NewDepartment, User,
    UserId, VersionId,
};
use crate::notify::{DepartmentEvent, DepartmentEventKind, LogNotifier, Notifier, RoleChange};
use crate::store::{OrgStore, UnitOfWork};
use crate::version::VersionStore;
use chrono::Utc;
use hrms_authz::Role;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for one unit of work, commit included
    pub transaction_timeout: Duration,

    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_secs(5),
            enable_metrics: true,
        }
    }
}

/// Result of staging one operation, before commit
struct Staged<T> {
    value: T,
    role_changes: Vec<RoleChange>,
    snapshots: u64,
    /// False when the operation left the store as it was
    changed: bool,
}

impl<T> Staged<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            role_changes: Vec::new(),
            snapshots: 0,
            changed: true,
        }
    }

    fn unchanged(value: T) -> Self {
        Self {
            changed: false,
            ..Self::new(value)
        }
    }
}

/// Department lifecycle with head-of-department role synchronization
pub struct OrgConsistencyEngine {
    store: Arc<dyn OrgStore>,

    /// Receives committed changes on a detached task
    notifier: Arc<dyn Notifier>,

    metrics: Option<Arc<MetricsCollector>>,

    config: EngineConfig,
}

impl OrgConsistencyEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn OrgStore>) -> Self {
        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            timeout_ms = config.transaction_timeout.as_millis() as u64,
            metrics = config.enable_metrics,
            "OrgConsistencyEngine initialized"
        );

        Self {
            store,
            notifier: Arc::new(LogNotifier),
            metrics,
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    /// Create a department, promote its head and record the initial snapshot
    pub async fn create_department(&self, input: NewDepartment) -> Result<Department> {
        input.validate()?;

        let staged = self
            .run("create_department", async {
                let mut uow = self.store.begin().await?;
                let staged = Self::stage_create(uow.as_mut(), &input).await;
                self.settle(uow, staged).await
            })
            .await?;

        info!(department = %staged.value.id, name = %staged.value.name, "Department created");
        self.publish(DepartmentEventKind::Created, &staged.value, staged.role_changes.clone());

        Ok(staged.value)
    }

    /// Apply a partial update, moving manager roles if the head changes
    pub async fn update_department(
        &self,
        id: DepartmentId,
        patch: DepartmentPatch,
    ) -> Result<Department> {
        patch.validate()?;

        let staged = self
            .run("update_department", async {
                let mut uow = self.store.begin().await?;
                let staged = Self::stage_update(uow.as_mut(), id, &patch).await;
                self.settle(uow, staged).await
            })
            .await?;

        info!(department = %id, role_changes = staged.role_changes.len(), "Department updated");
        self.publish(DepartmentEventKind::Updated, &staged.value, staged.role_changes.clone());

        Ok(staged.value)
    }

    /// Hard-delete a department; its history is kept
    pub async fn delete_department(&self, id: DepartmentId) -> Result<Department> {
        let staged = self
            .run("delete_department", async {
                let mut uow = self.store.begin().await?;
                let staged = Self::stage_delete(uow.as_mut(), id).await;
                self.settle(uow, staged).await
            })
            .await?;

        info!(department = %id, "Department deleted");
        self.publish(DepartmentEventKind::Deleted, &staged.value, staged.role_changes.clone());

        Ok(staged.value)
    }

    /// Restore name, head and budget from a snapshot
    ///
    /// Roles are left as they are and the revert itself is not snapshotted.
    pub async fn revert_department(
        &self,
        id: DepartmentId,
        version_id: VersionId,
    ) -> Result<Department> {
        let staged = self
            .run("revert_department", async {
                let mut uow = self.store.begin().await?;
                let staged = Self::stage_revert(uow.as_mut(), id, version_id).await;
                self.settle(uow, staged).await
            })
            .await?;

        if staged.changed {
            info!(department = %id, version = %version_id, "Department reverted");
            self.publish(DepartmentEventKind::Reverted, &staged.value, Vec::new());
        }

        Ok(staged.value)
    }

    /// Snapshots of a department, most recent first
    pub async fn list_versions(&self, id: DepartmentId) -> Result<Vec<DepartmentVersion>> {
        self.run("list_versions", async {
            let mut uow = self.store.begin().await?;
            let versions = VersionStore::new(uow.as_mut()).list(id).await;
            uow.rollback().await?;

            let versions = versions?;
            if versions.is_empty() {
                return Err(OrgError::not_found("Version history", id));
            }
            Ok(versions)
        })
        .await
    }

    pub async fn get_department(&self, id: DepartmentId) -> Result<Department> {
        self.run("get_department", async {
            let mut uow = self.store.begin().await?;
            let department = uow.department(id).await;
            uow.rollback().await?;

            department?.ok_or_else(|| OrgError::not_found("Department", id))
        })
        .await
    }

    /// All live departments; NotFound when there are none
    pub async fn list_departments(&self) -> Result<Vec<Department>> {
        self.run("list_departments", async {
            let mut uow = self.store.begin().await?;
            let departments = uow.departments().await;
            uow.rollback().await?;

            let departments = departments?;
            if departments.is_empty() {
                return Err(OrgError::not_found("Department", "any"));
            }
            Ok(departments)
        })
        .await
    }

    async fn stage_create(
        uow: &mut dyn UnitOfWork,
        input: &NewDepartment,
    ) -> Result<Staged<Department>> {
        let name = input.name.trim();
        if uow.department_by_name(name).await?.is_some() {
            return Err(name_conflict(name));
        }

        let head = Self::resolve_head(uow, input.head_employee_id).await?;

        let now = Utc::now();
        let department = Department {
            id: DepartmentId::new(),
            name: name.to_string(),
            head_employee_id: Some(input.head_employee_id),
            budget: input.budget,
            handling_team_ids: input.handling_team_ids.clone(),
            created_at: now,
            updated_at: now,
        };
        uow.put_department(department.clone()).await?;

        let mut staged = Staged::new(department);
        VersionStore::new(&mut *uow).record(&staged.value).await?;
        staged.snapshots += 1;

        staged
            .role_changes
            .extend(Self::promote_to_manager(uow, head.id).await?);

        Ok(staged)
    }

    async fn stage_update(
        uow: &mut dyn UnitOfWork,
        id: DepartmentId,
        patch: &DepartmentPatch,
    ) -> Result<Staged<Department>> {
        let current = uow
            .department(id)
            .await?
            .ok_or_else(|| OrgError::not_found("Department", id))?;

        if let Some(name) = patch.name.as_deref().map(str::trim) {
            if name != current.name {
                if let Some(other) = uow.department_by_name(name).await? {
                    if other.id != id {
                        return Err(name_conflict(name));
                    }
                }
            }
        }

        VersionStore::new(&mut *uow).record(&current).await?;

        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        updated.updated_at = Utc::now();

        let mut staged = Staged::new(updated);
        staged.snapshots += 1;

        if let Some(new_head) = patch.head_employee_id {
            if current.head_employee_id != Some(new_head) {
                let head = Self::resolve_head(uow, new_head).await?;

                if let Some(previous) = current.head_employee_id {
                    staged
                        .role_changes
                        .extend(Self::demote_from_manager(uow, previous).await?);
                }
                staged
                    .role_changes
                    .extend(Self::promote_to_manager(uow, head.id).await?);
            }
        }

        uow.put_department(staged.value.clone()).await?;

        Ok(staged)
    }

    async fn stage_delete(
        uow: &mut dyn UnitOfWork,
        id: DepartmentId,
    ) -> Result<Staged<Department>> {
        let current = uow
            .department(id)
            .await?
            .ok_or_else(|| OrgError::not_found("Department", id))?;

        VersionStore::new(&mut *uow).record(&current).await?;

        let mut staged = Staged::new(current);
        staged.snapshots += 1;

        if let Some(head) = staged.value.head_employee_id {
            staged
                .role_changes
                .extend(Self::demote_from_manager(uow, head).await?);
        }

        uow.remove_department(id).await?;

        Ok(staged)
    }

    async fn stage_revert(
        uow: &mut dyn UnitOfWork,
        id: DepartmentId,
        version_id: VersionId,
    ) -> Result<Staged<Department>> {
        let version = VersionStore::new(&mut *uow)
            .find(id, version_id)
            .await?
            .ok_or_else(|| OrgError::not_found("Version", version_id))?;

        let current = uow
            .department(id)
            .await?
            .ok_or_else(|| OrgError::not_found("Department", id))?;

        let unchanged = current.name == version.name
            && current.head_employee_id == version.head_employee_id
            && current.budget == version.budget;
        if unchanged {
            debug!(department = %id, version = %version_id, "Revert matches current state");
            return Ok(Staged::unchanged(current));
        }

        if version.name != current.name {
            if let Some(other) = uow.department_by_name(&version.name).await? {
                if other.id != id {
                    return Err(name_conflict(&version.name));
                }
            }
        }

        let mut reverted = current;
        reverted.name = version.name;
        reverted.head_employee_id = version.head_employee_id;
        reverted.budget = version.budget;
        reverted.updated_at = Utc::now();

        uow.put_department(reverted.clone()).await?;

        Ok(Staged::new(reverted))
    }

    /// Employee and user record of a prospective head
    async fn resolve_head(uow: &mut dyn UnitOfWork, employee_id: EmployeeId) -> Result<User> {
        let employee = uow
            .employee(employee_id)
            .await?
            .ok_or_else(|| OrgError::not_found("Employee", employee_id))?;

        uow.user(employee.user_id)
            .await?
            .ok_or_else(|| OrgError::not_found("User", employee.user_id))
    }

    /// Promote only a user whose role is exactly Employee
    async fn promote_to_manager(
        uow: &mut dyn UnitOfWork,
        user_id: UserId,
    ) -> Result<Option<RoleChange>> {
        let Some(user) = uow.user(user_id).await? else {
            return Ok(None);
        };
        if user.role != Role::Employee {
            return Ok(None);
        }

        uow.set_user_role(user.id, Role::Manager).await?;
        debug!(user = %user.id, "Head promoted to manager");

        Ok(Some(RoleChange {
            user_id: user.id,
            employee_id: user.employee_id,
            from: Role::Employee,
            to: Role::Manager,
        }))
    }

    /// Demote only a departing head whose role is exactly Manager
    async fn demote_from_manager(
        uow: &mut dyn UnitOfWork,
        employee_id: EmployeeId,
    ) -> Result<Option<RoleChange>> {
        let Some(employee) = uow.employee(employee_id).await? else {
            debug!(employee = %employee_id, "Departing head has no employee record");
            return Ok(None);
        };
        let Some(user) = uow.user(employee.user_id).await? else {
            debug!(employee = %employee_id, "Departing head has no user record");
            return Ok(None);
        };
        if user.role != Role::Manager {
            return Ok(None);
        }

        uow.set_user_role(user.id, Role::Employee).await?;
        debug!(user = %user.id, "Departing head demoted to employee");

        Ok(Some(RoleChange {
            user_id: user.id,
            employee_id: employee.id,
            from: Role::Manager,
            to: Role::Employee,
        }))
    }

    /// Commit a successfully staged unit, otherwise roll it back
    async fn settle<T: Send>(
        &self,
        uow: Box<dyn UnitOfWork>,
        staged: Result<Staged<T>>,
    ) -> Result<Staged<T>> {
        match staged {
            Ok(staged) => match uow.commit().await {
                Ok(()) => {
                    if let Some(metrics) = &self.metrics {
                        let promotions =
                            staged.role_changes.iter().filter(|c| c.is_promotion()).count() as u64;
                        let demotions = staged.role_changes.len() as u64 - promotions;
                        metrics
                            .record_commit(promotions, demotions, staged.snapshots)
                            .await;
                    }
                    Ok(staged)
                }
                Err(e) => {
                    warn!(error = %e, "Commit failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rollback().await;
                    }
                    Err(e)
                }
            },
            Err(e) => {
                if let Err(rollback_error) = uow.rollback().await {
                    warn!(error = %rollback_error, "Rollback failed");
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_rollback().await;
                }
                Err(e)
            }
        }
    }

    /// Run one operation under the transaction deadline
    ///
    /// On expiry the operation future is dropped, which drops its unit of
    /// work and discards every staged write.
    async fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let timeout = self.config.transaction_timeout;

        let outcome = match tokio::time::timeout(timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(operation, timeout_ms = timeout.as_millis() as u64, "Unit of work timed out");
                if let Some(metrics) = &self.metrics {
                    metrics.record_timeout().await;
                }
                Err(OrgError::Transaction(format!(
                    "{} timed out after {}ms",
                    operation,
                    timeout.as_millis()
                )))
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_latency(start.elapsed()).await;
        }
        if let Err(e) = &outcome {
            debug!(operation, error = %e, "Operation failed");
        }

        outcome
    }

    fn publish(
        &self,
        kind: DepartmentEventKind,
        department: &Department,
        role_changes: Vec<RoleChange>,
    ) {
        let event = DepartmentEvent {
            kind,
            department_id: department.id,
            department_name: department.name.clone(),
            role_changes,
            occurred_at: Utc::now(),
        };
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&event).await {
                warn!(
                    error = %e,
                    kind = event.kind.as_str(),
                    department = %event.department_id,
                    "Notification failed"
                );
            }
        });
    }
}

fn name_conflict(name: &str) -> OrgError {
    OrgError::Conflict(format!("Department '{}' already exists", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryOrgStore;

    async fn engine_with_head(
        role: Role,
    ) -> (OrgConsistencyEngine, Arc<InMemoryOrgStore>, EmployeeId, UserId) {
        let store = Arc::new(InMemoryOrgStore::new());
        let (employee, user) = store.register_person(role).await;
        let engine = OrgConsistencyEngine::new(EngineConfig::default(), store.clone());
        (engine, store, employee, user)
    }

    #[tokio::test]
    async fn test_create_promotes_base_head() {
        let (engine, store, head, user) = engine_with_head(Role::Employee).await;

        let dept = engine
            .create_department(NewDepartment::new("Engineering", head, 100_000.0))
            .await
            .unwrap();

        assert_eq!(dept.head_employee_id, Some(head));
        assert_eq!(store.user(user).await.unwrap().role, Role::Manager);
        assert_eq!(store.versions_of(dept.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_leaves_senior_head_alone() {
        let (engine, store, head, user) = engine_with_head(Role::Vp).await;

        engine
            .create_department(NewDepartment::new("Strategy", head, 1.0))
            .await
            .unwrap();

        assert_eq!(store.user(user).await.unwrap().role, Role::Vp);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input_before_storage() {
        let (engine, store, head, _) = engine_with_head(Role::Employee).await;
        store.fail_next_commit();

        let err = engine
            .create_department(NewDepartment::new("  ", head, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, OrgError::Validation(_)));

        // the injected fault was not consumed by the rejected call
        let err = engine
            .create_department(NewDepartment::new("Ops", head, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, OrgError::Transaction(_)));
    }

    #[tokio::test]
    async fn test_update_without_head_change_keeps_roles() {
        let (engine, store, head, user) = engine_with_head(Role::Employee).await;
        let dept = engine
            .create_department(NewDepartment::new("Finance", head, 10.0))
            .await
            .unwrap();

        let patch = DepartmentPatch {
            budget: Some(20.0),
            head_employee_id: Some(head),
            ..Default::default()
        };
        let updated = engine.update_department(dept.id, patch).await.unwrap();

        assert_eq!(updated.budget, 20.0);
        assert_eq!(store.user(user).await.unwrap().role, Role::Manager);
        assert_eq!(store.versions_of(dept.id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_department_is_not_found() {
        let (engine, _, _, _) = engine_with_head(Role::Employee).await;
        let patch = DepartmentPatch {
            budget: Some(1.0),
            ..Default::default()
        };

        let err = engine
            .update_department(DepartmentId::new(), patch)
            .await
            .unwrap_err();

        assert!(matches!(err, OrgError::NotFound { entity: "Department", .. }));
    }

    #[tokio::test]
    async fn test_empty_update_rejected_before_lookup() {
        let (engine, _, _, _) = engine_with_head(Role::Employee).await;

        let err = engine
            .update_department(DepartmentId::new(), DepartmentPatch::default())
            .await
            .unwrap_err();

        assert_eq!(err, OrgError::validation("No update data provided"));
    }

    #[tokio::test]
    async fn test_metrics_track_role_changes() {
        let (engine, store, first, _) = engine_with_head(Role::Employee).await;
        let (second, _) = store.register_person(Role::Employee).await;

        let dept = engine
            .create_department(NewDepartment::new("Sales", first, 10.0))
            .await
            .unwrap();
        engine
            .update_department(
                dept.id,
                DepartmentPatch {
                    head_employee_id: Some(second),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let metrics = engine.metrics().unwrap().get_metrics().await;
        assert_eq!(metrics.commits, 2);
        assert_eq!(metrics.promotions, 2);
        assert_eq!(metrics.demotions, 1);
        assert_eq!(metrics.snapshots, 2);
    }

    #[tokio::test]
    async fn test_metrics_can_be_disabled() {
        let store = Arc::new(InMemoryOrgStore::new());
        let config = EngineConfig {
            enable_metrics: false,
            ..Default::default()
        };
        let engine = OrgConsistencyEngine::new(config, store);

        assert!(engine.metrics().is_none());
    }
}

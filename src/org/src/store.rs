//! Unit-of-work storage seam
//!
//! Every engine operation runs inside one [`UnitOfWork`]: reads observe the
//! unit's own staged writes, and nothing becomes visible to other units
//! until [`UnitOfWork::commit`] succeeds. Dropping a unit without committing
//! discards everything staged in it.

use crate::error::{OrgError, Result};
use crate::models::{
    Department, DepartmentId, DepartmentVersion, Employee, EmployeeId, User, UserId,
};
use async_trait::async_trait;
use hrms_authz::Role;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PgOrgStore;

/// One atomic unit of reads and staged writes
#[async_trait]
pub trait UnitOfWork: Send {
    /// Get a live department by ID
    async fn department(&mut self, id: DepartmentId) -> Result<Option<Department>>;

    /// Get a live department by exact name
    async fn department_by_name(&mut self, name: &str) -> Result<Option<Department>>;

    /// All live departments, oldest first
    async fn departments(&mut self) -> Result<Vec<Department>>;

    async fn employee(&mut self, id: EmployeeId) -> Result<Option<Employee>>;

    async fn user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Snapshots recorded for a department, in no particular order
    async fn versions(&mut self, department: DepartmentId) -> Result<Vec<DepartmentVersion>>;

    /// Stage an insert or full replacement of a department
    async fn put_department(&mut self, department: Department) -> Result<()>;

    /// Stage a hard delete
    async fn remove_department(&mut self, id: DepartmentId) -> Result<()>;

    /// Stage a new snapshot
    async fn append_version(&mut self, version: DepartmentVersion) -> Result<()>;

    /// Stage a role change; fails NotFound if the user does not exist
    async fn set_user_role(&mut self, id: UserId, role: Role) -> Result<()>;

    /// Make every staged write visible at once
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every staged write
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Factory for units of work
#[async_trait]
pub trait OrgStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

#[derive(Debug, Default)]
struct OrgState {
    departments: HashMap<DepartmentId, Department>,
    versions: Vec<DepartmentVersion>,
    employees: HashMap<EmployeeId, Employee>,
    users: HashMap<UserId, User>,
}

/// Failures injected into the next commits, for exercising rollback paths
#[derive(Debug, Default)]
struct FaultPlan {
    fail_next_commit: bool,
    commit_delay: Option<Duration>,
}

/// In-memory store
///
/// A commit applies all staged writes under a single write lock. Department
/// names are checked for uniqueness at commit time, like a unique index.
#[derive(Clone, Default)]
pub struct InMemoryOrgStore {
    state: Arc<RwLock<OrgState>>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl InMemoryOrgStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an employee/user pair as the authentication boundary would
    pub async fn register_person(&self, role: Role) -> (EmployeeId, UserId) {
        let employee_id = EmployeeId::new();
        let user_id = UserId::new();

        let mut state = self.state.write().await;
        state.employees.insert(
            employee_id,
            Employee {
                id: employee_id,
                user_id,
            },
        );
        state.users.insert(
            user_id,
            User {
                id: user_id,
                role,
                employee_id,
                is_active: true,
            },
        );

        (employee_id, user_id)
    }

    pub async fn insert_employee(&self, employee: Employee) {
        self.state.write().await.employees.insert(employee.id, employee);
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Committed user record
    pub async fn user(&self, id: UserId) -> Option<User> {
        self.state.read().await.users.get(&id).cloned()
    }

    /// Committed department record
    pub async fn department(&self, id: DepartmentId) -> Option<Department> {
        self.state.read().await.departments.get(&id).cloned()
    }

    /// Committed snapshots of a department, in insertion order
    pub async fn versions_of(&self, id: DepartmentId) -> Vec<DepartmentVersion> {
        self.state
            .read()
            .await
            .versions
            .iter()
            .filter(|v| v.original_id == id)
            .cloned()
            .collect()
    }

    /// Make the next commit fail with a transaction error
    pub fn fail_next_commit(&self) {
        self.faults.lock().fail_next_commit = true;
    }

    /// Delay every commit by `delay` before it takes the write lock
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        self.faults.lock().commit_delay = delay;
    }
}

#[async_trait]
impl OrgStore for InMemoryOrgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(InMemoryUnitOfWork {
            state: Arc::clone(&self.state),
            faults: Arc::clone(&self.faults),
            departments: HashMap::new(),
            versions: Vec::new(),
            roles: HashMap::new(),
        }))
    }
}

/// Staged writes layered over the committed state
struct InMemoryUnitOfWork {
    state: Arc<RwLock<OrgState>>,
    faults: Arc<Mutex<FaultPlan>>,
    // None marks a staged delete
    departments: HashMap<DepartmentId, Option<Department>>,
    versions: Vec<DepartmentVersion>,
    roles: HashMap<UserId, Role>,
}

impl InMemoryUnitOfWork {
    fn merged_departments(&self, state: &OrgState) -> Vec<Department> {
        let committed = state
            .departments
            .values()
            .filter(|d| !self.departments.contains_key(&d.id));
        let staged = self.departments.values().flatten();

        committed.chain(staged).cloned().collect()
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn department(&mut self, id: DepartmentId) -> Result<Option<Department>> {
        if let Some(staged) = self.departments.get(&id) {
            return Ok(staged.clone());
        }
        Ok(self.state.read().await.departments.get(&id).cloned())
    }

    async fn department_by_name(&mut self, name: &str) -> Result<Option<Department>> {
        let state = self.state.read().await;
        Ok(self
            .merged_departments(&state)
            .into_iter()
            .find(|d| d.name == name))
    }

    async fn departments(&mut self) -> Result<Vec<Department>> {
        let state = self.state.read().await;
        let mut all = self.merged_departments(&state);
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(all)
    }

    async fn employee(&mut self, id: EmployeeId) -> Result<Option<Employee>> {
        Ok(self.state.read().await.employees.get(&id).cloned())
    }

    async fn user(&mut self, id: UserId) -> Result<Option<User>> {
        let user = self.state.read().await.users.get(&id).cloned();
        Ok(user.map(|mut user| {
            if let Some(role) = self.roles.get(&id) {
                user.role = *role;
            }
            user
        }))
    }

    async fn versions(&mut self, department: DepartmentId) -> Result<Vec<DepartmentVersion>> {
        let state = self.state.read().await;
        Ok(state
            .versions
            .iter()
            .chain(self.versions.iter())
            .filter(|v| v.original_id == department)
            .cloned()
            .collect())
    }

    async fn put_department(&mut self, department: Department) -> Result<()> {
        self.departments.insert(department.id, Some(department));
        Ok(())
    }

    async fn remove_department(&mut self, id: DepartmentId) -> Result<()> {
        self.departments.insert(id, None);
        Ok(())
    }

    async fn append_version(&mut self, version: DepartmentVersion) -> Result<()> {
        self.versions.push(version);
        Ok(())
    }

    async fn set_user_role(&mut self, id: UserId, role: Role) -> Result<()> {
        if !self.state.read().await.users.contains_key(&id) {
            return Err(OrgError::not_found("User", id));
        }
        self.roles.insert(id, role);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let delay = {
            let mut faults = self.faults.lock();
            if faults.fail_next_commit {
                faults.fail_next_commit = false;
                return Err(OrgError::Transaction("Commit rejected by storage".to_string()));
            }
            faults.commit_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;

        let mut departments = state.departments.clone();
        for (id, staged) in &self.departments {
            match staged {
                Some(department) => {
                    departments.insert(*id, department.clone());
                }
                None => {
                    departments.remove(id);
                }
            }
        }

        let mut names = HashSet::new();
        for department in departments.values() {
            if !names.insert(department.name.as_str()) {
                return Err(OrgError::Conflict(format!(
                    "Department '{}' already exists",
                    department.name
                )));
            }
        }

        if let Some(missing) = self.roles.keys().find(|id| !state.users.contains_key(id)) {
            return Err(OrgError::not_found("User", missing));
        }

        state.departments = departments;
        state.versions.extend(self.versions.iter().cloned());
        for (id, role) in &self.roles {
            if let Some(user) = state.users.get_mut(id) {
                user.role = *role;
            }
        }

        debug!(
            departments = self.departments.len(),
            versions = self.versions.len(),
            roles = self.roles.len(),
            "Unit of work committed"
        );

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!(
            departments = self.departments.len(),
            versions = self.versions.len(),
            roles = self.roles.len(),
            "Unit of work rolled back"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn department(name: &str) -> Department {
        let now = Utc::now();
        Department {
            id: DepartmentId::new(),
            name: name.to_string(),
            head_employee_id: None,
            budget: 1.0,
            handling_team_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let store = InMemoryOrgStore::new();
        let dept = department("Finance");

        let mut uow = store.begin().await.unwrap();
        uow.put_department(dept.clone()).await.unwrap();

        assert_eq!(uow.department(dept.id).await.unwrap(), Some(dept.clone()));
        assert!(store.department(dept.id).await.is_none());

        uow.commit().await.unwrap();
        assert_eq!(store.department(dept.id).await, Some(dept));
    }

    #[tokio::test]
    async fn test_dropped_unit_discards_writes() {
        let store = InMemoryOrgStore::new();
        let (_, user_id) = store.register_person(Role::Employee).await;
        let dept = department("Legal");

        {
            let mut uow = store.begin().await.unwrap();
            uow.put_department(dept.clone()).await.unwrap();
            uow.set_user_role(user_id, Role::Manager).await.unwrap();
        }

        assert!(store.department(dept.id).await.is_none());
        assert_eq!(store.user(user_id).await.unwrap().role, Role::Employee);
    }

    #[tokio::test]
    async fn test_reads_see_staged_role_and_delete() {
        let store = InMemoryOrgStore::new();
        let (_, user_id) = store.register_person(Role::Employee).await;
        let dept = department("Ops");

        let mut uow = store.begin().await.unwrap();
        uow.put_department(dept.clone()).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.set_user_role(user_id, Role::Manager).await.unwrap();
        uow.remove_department(dept.id).await.unwrap();

        assert_eq!(uow.user(user_id).await.unwrap().unwrap().role, Role::Manager);
        assert!(uow.department(dept.id).await.unwrap().is_none());
        assert!(uow.department_by_name("Ops").await.unwrap().is_none());
        assert!(uow.departments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_role_of_unknown_user_fails() {
        let store = InMemoryOrgStore::new();
        let mut uow = store.begin().await.unwrap();

        let err = uow.set_user_role(UserId::new(), Role::Manager).await.unwrap_err();
        assert!(matches!(err, OrgError::NotFound { entity: "User", .. }));
    }

    #[tokio::test]
    async fn test_commit_enforces_unique_names() {
        let store = InMemoryOrgStore::new();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.put_department(department("Research")).await.unwrap();
        second.put_department(department("Research")).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();

        assert!(matches!(err, OrgError::Conflict(_)));
        assert_eq!(store.state.read().await.departments.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_commit_failure_applies_nothing() {
        let store = InMemoryOrgStore::new();
        let dept = department("Support");
        store.fail_next_commit();

        let mut uow = store.begin().await.unwrap();
        uow.put_department(dept.clone()).await.unwrap();
        let err = uow.commit().await.unwrap_err();

        assert!(matches!(err, OrgError::Transaction(_)));
        assert!(store.department(dept.id).await.is_none());

        // the fault is consumed by one commit
        let mut uow = store.begin().await.unwrap();
        uow.put_department(dept.clone()).await.unwrap();
        uow.commit().await.unwrap();
        assert!(store.department(dept.id).await.is_some());
    }
}

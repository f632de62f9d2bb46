//! PostgreSQL unit-of-work implementation
//!
//! Each unit of work owns one database transaction. The unique index on
//! `departments.name` backs the name-uniqueness check made by the engine.

use crate::error::{OrgError, Result};
use crate::models::{
    Department, DepartmentId, DepartmentVersion, Employee, EmployeeId, TeamId, User, UserId,
    VersionId,
};
use crate::store::{OrgStore, UnitOfWork};
use async_trait::async_trait;
use hrms_authz::Role;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

const DEPARTMENT_COLUMNS: &str =
    "id, name, head_employee_id, budget, handling_team_ids, created_at, updated_at";

fn storage_error(context: &str, e: sqlx::Error) -> OrgError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return OrgError::Conflict(format!("{}: {}", context, db.message()));
        }
    }
    OrgError::Transaction(format!("{}: {}", context, e))
}

fn department_from_row(row: &PgRow) -> Result<Department> {
    let decode = |e| storage_error("Failed to decode department", e);
    let team_ids: Vec<Uuid> = row.try_get("handling_team_ids").map_err(decode)?;

    Ok(Department {
        id: DepartmentId(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        head_employee_id: row
            .try_get::<Option<Uuid>, _>("head_employee_id")
            .map_err(decode)?
            .map(EmployeeId),
        budget: row.try_get("budget").map_err(decode)?,
        handling_team_ids: team_ids.into_iter().map(TeamId).collect(),
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn version_from_row(row: &PgRow) -> Result<DepartmentVersion> {
    let decode = |e| storage_error("Failed to decode department version", e);

    Ok(DepartmentVersion {
        id: VersionId(row.try_get("id").map_err(decode)?),
        original_id: DepartmentId(row.try_get("original_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        head_employee_id: row
            .try_get::<Option<Uuid>, _>("head_employee_id")
            .map_err(decode)?
            .map(EmployeeId),
        budget: row.try_get("budget").map_err(decode)?,
        versioned_at: row.try_get("versioned_at").map_err(decode)?,
    })
}

/// PostgreSQL-backed store with connection pooling
pub struct PgOrgStore {
    pool: PgPool,
}

impl PgOrgStore {
    /// Connect to the database at `database_url`
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await
            .map_err(|e| storage_error("Failed to connect to database", e))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrgError::Transaction(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrgStore for PgOrgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error("Failed to begin transaction", e))?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn department(&mut self, id: DepartmentId) -> Result<Option<Department>> {
        let query = format!("SELECT {} FROM departments WHERE id = $1", DEPARTMENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to get department", e))?;

        row.as_ref().map(department_from_row).transpose()
    }

    async fn department_by_name(&mut self, name: &str) -> Result<Option<Department>> {
        let query = format!("SELECT {} FROM departments WHERE name = $1", DEPARTMENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to get department by name", e))?;

        row.as_ref().map(department_from_row).transpose()
    }

    async fn departments(&mut self) -> Result<Vec<Department>> {
        let query = format!(
            "SELECT {} FROM departments ORDER BY created_at, name",
            DEPARTMENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to list departments", e))?;

        rows.iter().map(department_from_row).collect()
    }

    async fn employee(&mut self, id: EmployeeId) -> Result<Option<Employee>> {
        let row = sqlx::query("SELECT id, user_id FROM employees WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to get employee", e))?;

        row.map(|row| {
            let decode = |e| storage_error("Failed to decode employee", e);
            Ok(Employee {
                id: EmployeeId(row.try_get("id").map_err(decode)?),
                user_id: UserId(row.try_get("user_id").map_err(decode)?),
            })
        })
        .transpose()
    }

    async fn user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, role, employee_id, is_active FROM users WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to get user", e))?;

        row.map(|row| {
            let decode = |e| storage_error("Failed to decode user", e);
            let role: String = row.try_get("role").map_err(decode)?;
            let role = role
                .parse::<Role>()
                .map_err(|e| OrgError::Transaction(format!("Corrupt user role: {}", e)))?;

            Ok(User {
                id: UserId(row.try_get("id").map_err(decode)?),
                role,
                employee_id: EmployeeId(row.try_get("employee_id").map_err(decode)?),
                is_active: row.try_get("is_active").map_err(decode)?,
            })
        })
        .transpose()
    }

    async fn versions(&mut self, department: DepartmentId) -> Result<Vec<DepartmentVersion>> {
        let rows = sqlx::query(
            r#"
            SELECT id, original_id, name, head_employee_id, budget, versioned_at
            FROM department_versions
            WHERE original_id = $1
            "#,
        )
        .bind(department.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to list department versions", e))?;

        rows.iter().map(version_from_row).collect()
    }

    async fn put_department(&mut self, department: Department) -> Result<()> {
        let team_ids: Vec<Uuid> = department.handling_team_ids.iter().map(|t| t.0).collect();

        sqlx::query(
            r#"
            INSERT INTO departments
                (id, name, head_employee_id, budget, handling_team_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                head_employee_id = EXCLUDED.head_employee_id,
                budget = EXCLUDED.budget,
                handling_team_ids = EXCLUDED.handling_team_ids,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(department.id.0)
        .bind(&department.name)
        .bind(department.head_employee_id.map(|e| e.0))
        .bind(department.budget)
        .bind(&team_ids)
        .bind(department.created_at)
        .bind(department.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to write department", e))?;

        Ok(())
    }

    async fn remove_department(&mut self, id: DepartmentId) -> Result<()> {
        sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to delete department", e))?;

        Ok(())
    }

    async fn append_version(&mut self, version: DepartmentVersion) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO department_versions
                (id, original_id, name, head_employee_id, budget, versioned_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(version.id.0)
        .bind(version.original_id.0)
        .bind(&version.name)
        .bind(version.head_employee_id.map(|e| e.0))
        .bind(version.budget)
        .bind(version.versioned_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| storage_error("Failed to write department version", e))?;

        Ok(())
    }

    async fn set_user_role(&mut self, id: UserId, role: Role) -> Result<()> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(role.as_str())
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| storage_error("Failed to update user role", e))?;

        if result.rows_affected() == 0 {
            return Err(OrgError::not_found("User", id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| storage_error("Failed to commit transaction", e))?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| storage_error("Failed to roll back transaction", e))?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

//! Department snapshot history

use crate::error::Result;
use crate::models::{Department, DepartmentId, DepartmentVersion, VersionId};
use crate::store::UnitOfWork;
use chrono::{Duration, SubsecRound, Utc};
use tracing::trace;

/// Records and reads snapshots inside a unit of work
///
/// `versioned_at` is truncated to microseconds and kept strictly increasing
/// per department, so most-recent-first order is total even when two
/// snapshots land within the same clock tick.
pub struct VersionStore<'a> {
    uow: &'a mut dyn UnitOfWork,
}

impl<'a> VersionStore<'a> {
    pub fn new(uow: &'a mut dyn UnitOfWork) -> Self {
        Self { uow }
    }

    /// Snapshot the current fields of `department`
    pub async fn record(&mut self, department: &Department) -> Result<DepartmentVersion> {
        let now = Utc::now().trunc_subsecs(6);
        let versioned_at = match self.latest(department.id).await? {
            Some(previous) if previous.versioned_at >= now => {
                previous.versioned_at + Duration::microseconds(1)
            }
            _ => now,
        };

        let version = DepartmentVersion {
            id: VersionId::new(),
            original_id: department.id,
            name: department.name.clone(),
            head_employee_id: department.head_employee_id,
            budget: department.budget,
            versioned_at,
        };

        self.uow.append_version(version.clone()).await?;
        trace!(department = %department.id, version = %version.id, "Snapshot recorded");

        Ok(version)
    }

    /// All snapshots of a department, most recent first
    pub async fn list(&mut self, department: DepartmentId) -> Result<Vec<DepartmentVersion>> {
        let mut versions = self.uow.versions(department).await?;
        sort_most_recent_first(&mut versions);
        Ok(versions)
    }

    pub async fn latest(&mut self, department: DepartmentId) -> Result<Option<DepartmentVersion>> {
        Ok(self.list(department).await?.into_iter().next())
    }

    /// A snapshot belonging to `department`
    pub async fn find(
        &mut self,
        department: DepartmentId,
        version: VersionId,
    ) -> Result<Option<DepartmentVersion>> {
        Ok(self
            .uow
            .versions(department)
            .await?
            .into_iter()
            .find(|v| v.id == version))
    }
}

pub fn sort_most_recent_first(versions: &mut [DepartmentVersion]) {
    versions.sort_by(|a, b| b.versioned_at.cmp(&a.versioned_at));
}

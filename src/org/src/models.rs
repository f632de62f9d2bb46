//! Organization domain models

use crate::error::{OrgError, Result};
use chrono::{DateTime, Utc};
use hrms_authz::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum department name length
pub const MAX_NAME_LEN: usize = 100;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = OrgError;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| OrgError::Validation(format!("Invalid {} ID: {}", $label, s)))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Department identifier
    DepartmentId,
    "department"
);
entity_id!(
    /// Department version (snapshot) identifier
    VersionId,
    "version"
);
entity_id!(
    /// Employee identifier
    EmployeeId,
    "employee"
);
entity_id!(
    /// User (login account) identifier
    UserId,
    "user"
);
entity_id!(
    /// Team identifier
    TeamId,
    "team"
);

/// Login account owned by the authentication boundary
///
/// `role` is the only field the engine ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub role: Role,
    pub employee_id: EmployeeId,
    pub is_active: bool,
}

/// Employee record, read-only to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub user_id: UserId,
}

/// A live department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub head_employee_id: Option<EmployeeId>,
    pub budget: f64,
    #[serde(default)]
    pub handling_team_ids: Vec<TeamId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable copy of a department's mutable fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentVersion {
    pub id: VersionId,
    pub original_id: DepartmentId,
    pub name: String,
    pub head_employee_id: Option<EmployeeId>,
    pub budget: f64,
    pub versioned_at: DateTime<Utc>,
}

fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(OrgError::validation("Department name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(OrgError::validation(format!(
            "Department name cannot be more than {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_budget(budget: f64) -> Result<()> {
    if !budget.is_finite() || budget < 0.0 {
        return Err(OrgError::validation(format!(
            "Budget must be a non-negative number, got {}",
            budget
        )));
    }
    Ok(())
}

/// Input for creating a department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
    pub name: String,
    pub head_employee_id: EmployeeId,
    pub budget: f64,
    #[serde(default)]
    pub handling_team_ids: Vec<TeamId>,
}

impl NewDepartment {
    pub fn new(name: impl Into<String>, head_employee_id: EmployeeId, budget: f64) -> Self {
        Self {
            name: name.into(),
            head_employee_id,
            budget,
            handling_team_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_budget(self.budget)
    }
}

/// Partial update of a department; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_employee_id: Option<EmployeeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handling_team_ids: Option<Vec<TeamId>>,
}

impl DepartmentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.head_employee_id.is_none()
            && self.budget.is_none()
            && self.handling_team_ids.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(OrgError::validation("No update data provided"));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(budget) = self.budget {
            validate_budget(budget)?;
        }
        Ok(())
    }

    /// Apply the present fields to `department`
    pub fn apply_to(&self, department: &mut Department) {
        if let Some(name) = &self.name {
            department.name = name.trim().to_string();
        }
        if let Some(head) = self.head_employee_id {
            department.head_employee_id = Some(head);
        }
        if let Some(budget) = self.budget {
            department.budget = budget;
        }
        if let Some(teams) = &self.handling_team_ids {
            department.handling_team_ids = teams.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn department() -> Department {
        let now = Utc::now();
        Department {
            id: DepartmentId::new(),
            name: "Engineering".to_string(),
            head_employee_id: Some(EmployeeId::new()),
            budget: 100_000.0,
            handling_team_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_id_parsing() {
        let id = DepartmentId::new();
        assert_eq!(id.to_string().parse::<DepartmentId>().unwrap(), id);

        let err = "not-a-uuid".parse::<DepartmentId>().unwrap_err();
        assert!(matches!(err, OrgError::Validation(msg) if msg.contains("department")));
    }

    #[test]
    fn test_id_serializes_as_plain_uuid() {
        let id = EmployeeId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }

    #[test]
    fn test_new_department_validation() {
        let head = EmployeeId::new();

        assert!(NewDepartment::new("Engineering", head, 10.0).validate().is_ok());
        assert!(NewDepartment::new("   ", head, 10.0).validate().is_err());
        assert!(NewDepartment::new("x".repeat(101), head, 10.0).validate().is_err());
        assert!(NewDepartment::new("Sales", head, -1.0).validate().is_err());
        assert!(NewDepartment::new("Sales", head, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_empty_patch_rejected() {
        let patch = DepartmentPatch::default();
        assert!(patch.is_empty());
        assert_eq!(
            patch.validate().unwrap_err(),
            OrgError::Validation("No update data provided".to_string())
        );
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut dept = department();
        let head = dept.head_employee_id;

        let patch = DepartmentPatch {
            budget: Some(5.0),
            name: Some("  Platform ".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut dept);

        assert_eq!(dept.name, "Platform");
        assert_eq!(dept.budget, 5.0);
        assert_eq!(dept.head_employee_id, head);
    }

    #[test]
    fn test_department_wire_format() {
        let dept = department();
        let value = serde_json::to_value(&dept).unwrap();

        assert!(value.get("headEmployeeId").is_some());
        assert!(value.get("handlingTeamIds").is_some());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_patch_deserializes_partial_json() {
        let patch: DepartmentPatch = serde_json::from_str(r#"{"budget": 42}"#).unwrap();
        assert_eq!(patch.budget, Some(42.0));
        assert!(patch.name.is_none());
    }
}

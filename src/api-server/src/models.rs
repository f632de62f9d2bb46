use chrono::{DateTime, Utc};
use hrms_authz::{AccessDecision, PermissionRule};
use hrms_org::{Department, DepartmentPatch, DepartmentVersion, EmployeeId, NewDepartment, TeamId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Response envelope shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Department creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    /// Employee who heads the department
    pub head_employee_id: Uuid,

    #[validate(range(min = 0.0))]
    pub budget: f64,

    #[serde(default)]
    pub handling_team_ids: Vec<Uuid>,
}

impl From<CreateDepartmentRequest> for NewDepartment {
    fn from(req: CreateDepartmentRequest) -> Self {
        NewDepartment {
            name: req.name,
            head_employee_id: EmployeeId(req.head_employee_id),
            budget: req.budget,
            handling_team_ids: req.handling_team_ids.into_iter().map(TeamId).collect(),
        }
    }
}

/// Partial department update; omitted fields are unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepartmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    pub head_employee_id: Option<Uuid>,

    #[validate(range(min = 0.0))]
    pub budget: Option<f64>,

    pub handling_team_ids: Option<Vec<Uuid>>,
}

impl From<UpdateDepartmentRequest> for DepartmentPatch {
    fn from(req: UpdateDepartmentRequest) -> Self {
        DepartmentPatch {
            name: req.name,
            head_employee_id: req.head_employee_id.map(EmployeeId),
            budget: req.budget,
            handling_team_ids: req
                .handling_team_ids
                .map(|teams| teams.into_iter().map(TeamId).collect()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentResponse {
    pub id: Uuid,
    pub name: String,
    pub head_employee_id: Option<Uuid>,
    pub budget: f64,
    pub handling_team_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Department> for DepartmentResponse {
    fn from(d: Department) -> Self {
        Self {
            id: d.id.0,
            name: d.name,
            head_employee_id: d.head_employee_id.map(|e| e.0),
            budget: d.budget,
            handling_team_ids: d.handling_team_ids.into_iter().map(|t| t.0).collect(),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

/// Snapshot of a department's fields before a mutation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub id: Uuid,
    pub original_id: Uuid,
    pub name: String,
    pub head_employee_id: Option<Uuid>,
    pub budget: f64,
    pub versioned_at: DateTime<Utc>,
}

impl From<DepartmentVersion> for VersionResponse {
    fn from(v: DepartmentVersion) -> Self {
        Self {
            id: v.id.0,
            original_id: v.original_id.0,
            name: v.name,
            head_employee_id: v.head_employee_id.map(|e| e.0),
            budget: v.budget,
            versioned_at: v.versioned_at,
        }
    }
}

/// Authorization check request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AuthzCheckRequest {
    /// Role name, e.g. `team_lead`
    #[validate(length(min = 1, max = 50))]
    pub role: String,

    /// Resource name, e.g. `department`
    #[validate(length(min = 1, max = 100))]
    pub resource: String,

    /// Action name, e.g. `create`
    #[validate(length(min = 1, max = 50))]
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuleResponse {
    pub resource: String,
    pub actions: Vec<String>,
}

impl From<&PermissionRule> for RuleResponse {
    fn from(rule: &PermissionRule) -> Self {
        Self {
            resource: rule.resource.clone(),
            actions: rule.actions.iter().map(|a| a.as_str().to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthzCheckResponse {
    pub allowed: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<RuleResponse>,
}

impl From<AccessDecision> for AuthzCheckResponse {
    fn from(decision: AccessDecision) -> Self {
        Self {
            allowed: decision.allowed,
            reason: decision.reason,
            matched_rule: decision.matched_rule.as_ref().map(RuleResponse::from),
        }
    }
}

/// Effective permissions of a role after inheritance
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissionsResponse {
    pub role: String,
    pub inherited_roles: Vec<String>,
    pub permissions: Vec<RuleResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_envelope_omits_data() {
        let value = serde_json::to_value(ApiResponse::<()>::failure("nope")).unwrap();
        assert_eq!(value, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn test_create_request_validation() {
        let req = CreateDepartmentRequest {
            name: String::new(),
            head_employee_id: Uuid::new_v4(),
            budget: -5.0,
            handling_team_ids: vec![],
        };

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("budget"));
    }

    #[test]
    fn test_update_request_maps_to_patch() {
        let head = Uuid::new_v4();
        let req: UpdateDepartmentRequest =
            serde_json::from_value(serde_json::json!({"headEmployeeId": head})).unwrap();

        let patch = DepartmentPatch::from(req);
        assert_eq!(patch.head_employee_id, Some(EmployeeId(head)));
        assert!(patch.name.is_none());
    }
}

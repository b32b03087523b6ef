//! Request and response bodies
//!
//! Registry types are returned as-is; request bodies get their own structs so
//! that field lengths can be validated before they reach the registry.

use permreg_registry::{ConstraintKind, NewPbu, NewRole, PbuUpdate, RoleInheritanceEdge, RoleUpdate};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Role creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    /// `{APP}.{MODULE}.{ROLE_FUNCTION}`
    #[validate(length(min = 1, max = 255))]
    pub role_id: String,

    #[validate(length(min = 1, max = 255))]
    pub display_name: String,

    #[serde(default)]
    pub app_code: Option<String>,
    #[serde(default)]
    pub module_code: Option<String>,
    #[serde(default)]
    pub role_function: Option<String>,

    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub tenant_customizable: Option<bool>,
}

impl From<CreateRoleRequest> for NewRole {
    fn from(req: CreateRoleRequest) -> Self {
        NewRole {
            role_id: req.role_id,
            display_name: req.display_name,
            app_code: req.app_code,
            module_code: req.module_code,
            role_function: req.role_function,
            is_active: req.is_active.unwrap_or(true),
            tenant_customizable: req.tenant_customizable.unwrap_or(false),
        }
    }
}

/// Role update request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 255))]
    pub display_name: Option<String>,
    pub is_active: Option<bool>,
    pub tenant_customizable: Option<bool>,
    pub expected_version: Option<u64>,
}

impl From<UpdateRoleRequest> for RoleUpdate {
    fn from(req: UpdateRoleRequest) -> Self {
        RoleUpdate {
            display_name: req.display_name,
            is_active: req.is_active,
            tenant_customizable: req.tenant_customizable,
            expected_version: req.expected_version,
        }
    }
}

/// Inheritance edge creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEdgeRequest {
    #[validate(length(min = 1, max = 255))]
    pub parent_role_id: String,

    #[validate(length(min = 1, max = 255))]
    pub child_role_id: String,

    #[validate(length(max = 255))]
    #[serde(default)]
    pub approved_by: Option<String>,
}

/// PBU creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePbuRequest {
    /// `PBU_{RESOURCE}_{ACTION}_{SCOPE}`
    #[validate(length(min = 1, max = 255))]
    pub pbu_id: String,

    #[validate(length(min = 1, max = 255))]
    pub display_name: String,

    #[validate(length(min = 1, max = 1024))]
    pub api_endpoint: String,

    #[validate(length(min = 1, max = 100))]
    pub action_code: String,

    #[validate(length(min = 1, max = 100))]
    pub scope_code: String,

    #[serde(default)]
    pub is_active: Option<bool>,
}

impl From<CreatePbuRequest> for NewPbu {
    fn from(req: CreatePbuRequest) -> Self {
        NewPbu {
            pbu_id: req.pbu_id,
            display_name: req.display_name,
            api_endpoint: req.api_endpoint,
            action_code: req.action_code,
            scope_code: req.scope_code,
            is_active: req.is_active.unwrap_or(true),
        }
    }
}

/// PBU update request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePbuRequest {
    #[validate(length(min = 1, max = 255))]
    pub display_name: Option<String>,
    #[validate(length(min = 1, max = 1024))]
    pub api_endpoint: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub action_code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub scope_code: Option<String>,
    pub is_active: Option<bool>,
    pub expected_version: Option<u64>,
}

impl From<UpdatePbuRequest> for PbuUpdate {
    fn from(req: UpdatePbuRequest) -> Self {
        PbuUpdate {
            display_name: req.display_name,
            api_endpoint: req.api_endpoint,
            action_code: req.action_code,
            scope_code: req.scope_code,
            is_active: req.is_active,
            expected_version: req.expected_version,
        }
    }
}

/// Association or override creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    #[validate(length(min = 1, max = 255))]
    #[serde(alias = "constraintId", alias = "behaviorId")]
    pub target_id: String,
}

/// Targets linked to one owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinksResponse {
    pub owner_id: String,
    pub kind: ConstraintKind,
    pub target_ids: Vec<String>,
}

/// Direct inheritance edges of a role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgesResponse {
    pub role_id: String,
    pub edges: Vec<RoleInheritanceEdge>,
}

/// Transitive relatives of a role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedRolesResponse {
    pub role_id: String,
    pub role_ids: Vec<String>,
}

/// Generic list wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub backend: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_request_aliases() {
        let req: LinkRequest = serde_json::from_str(r#"{"constraintId": "GC_DEPT"}"#).unwrap();
        assert_eq!(req.target_id, "GC_DEPT");

        let req: LinkRequest = serde_json::from_str(r#"{"behaviorId": "CB_HOURS"}"#).unwrap();
        assert_eq!(req.target_id, "CB_HOURS");
    }

    #[test]
    fn test_create_role_defaults() {
        let req: CreateRoleRequest =
            serde_json::from_str(r#"{"roleId": "HR.LEAVE.VIEWER", "displayName": "Viewer"}"#)
                .unwrap();
        assert!(req.validate().is_ok());

        let role: NewRole = req.into();
        assert!(role.is_active);
        assert!(!role.tenant_customizable);
    }

    #[test]
    fn test_empty_display_name_invalid() {
        let req = UpdateRoleRequest {
            display_name: Some(String::new()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}

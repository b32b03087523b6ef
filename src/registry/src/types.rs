//! Core registry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role identifier, `{APP}.{MODULE}.{ROLE_FUNCTION}`
pub type RoleId = String;

/// Permission bundle unit identifier, `PBU_{RESOURCE}_{ACTION}_{SCOPE}`
pub type PbuId = String;

/// Registered role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub role_id: RoleId,
    pub display_name: String,
    pub app_code: String,
    pub module_code: String,
    pub role_function: String,
    pub is_active: bool,

    /// Longest path from a root role. Written only by the hierarchy engine.
    pub inheritance_depth: u32,

    pub tenant_customizable: bool,

    /// Optimistic concurrency token, bumped on every write
    pub version: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Directed parent → child inheritance edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInheritanceEdge {
    pub parent_role_id: RoleId,
    pub child_role_id: RoleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub approval_date: DateTime<Utc>,
}

impl RoleInheritanceEdge {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent_role_id: parent.into(),
            child_role_id: child.into(),
            approved_by: None,
            approval_date: Utc::now(),
        }
    }

    pub fn with_approver(mut self, approved_by: Option<String>) -> Self {
        self.approved_by = approved_by;
        self
    }

    /// `(parent, child)` composite key
    pub fn key(&self) -> (&str, &str) {
        (&self.parent_role_id, &self.child_role_id)
    }
}

/// Role creation input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub role_id: RoleId,
    pub display_name: String,

    /// Must match the segments of `role_id` when given
    #[serde(default)]
    pub app_code: Option<String>,
    #[serde(default)]
    pub module_code: Option<String>,
    #[serde(default)]
    pub role_function: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub tenant_customizable: bool,
}

impl NewRole {
    pub fn new(role_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            display_name: display_name.into(),
            app_code: None,
            module_code: None,
            role_function: None,
            is_active: true,
            tenant_customizable: false,
        }
    }
}

/// Partial role update. The identifier and depth are immutable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    pub display_name: Option<String>,
    pub is_active: Option<bool>,
    pub tenant_customizable: Option<bool>,

    /// Reject the write with `Conflict` unless the stored version matches
    pub expected_version: Option<u64>,
}

/// Named operation, e.g. `READ`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Named resource-access boundary, e.g. `OWN`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Row-level attribute rule attachable to a PBU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralConstraint {
    pub constraint_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,

    /// JSON-encoded rule; syntax is checked, semantics are not interpreted
    pub rule: String,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Field-level attribute rule attachable to a PBU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConstraint {
    pub constraint_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,

    /// Dotted path of the guarded field, e.g. `invoice.amount`
    pub field_path: String,

    /// JSON-encoded rule
    pub rule: String,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Condition-evaluated permission modifier attachable to a PBU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualBehavior {
    pub behavior_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,

    /// JSON-encoded activation condition
    pub condition: String,

    /// Optional JSON-encoded effect applied when the condition holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Atomic grantable permission tied to one action and one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionBundleUnit {
    pub pbu_id: PbuId,
    pub display_name: String,
    pub api_endpoint: String,
    pub action_code: String,
    pub scope_code: String,
    pub is_active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// PBU creation input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPbu {
    pub pbu_id: PbuId,
    pub display_name: String,
    pub api_endpoint: String,
    pub action_code: String,
    pub scope_code: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial PBU update. The identifier is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbuUpdate {
    pub display_name: Option<String>,
    pub api_endpoint: Option<String>,
    pub action_code: Option<String>,
    pub scope_code: Option<String>,
    pub is_active: Option<bool>,
    pub expected_version: Option<u64>,
}

/// Kind of constraint or behavior a PBU association or role override links to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    General,
    Field,
    Behavior,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 3] = [
        ConstraintKind::General,
        ConstraintKind::Field,
        ConstraintKind::Behavior,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::General => "general",
            ConstraintKind::Field => "field",
            ConstraintKind::Behavior => "behavior",
        }
    }

    /// URL segment used by the REST surface
    pub fn path_segment(&self) -> &'static str {
        match self {
            ConstraintKind::General => "general-constraints",
            ConstraintKind::Field => "field-constraints",
            ConstraintKind::Behavior => "behaviors",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path_segment() == segment)
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner side of a link record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOwner {
    /// PBU-level association
    Pbu,
    /// Role-level override
    Role,
}

impl LinkOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkOwner::Pbu => "pbu",
            LinkOwner::Role => "role",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pbu" => Some(LinkOwner::Pbu),
            "role" => Some(LinkOwner::Role),
            _ => None,
        }
    }
}

impl fmt::Display for LinkOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key of an association or override row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey {
    pub owner: LinkOwner,
    pub kind: ConstraintKind,
    pub owner_id: String,
    pub target_id: String,
}

impl LinkKey {
    pub fn new(
        owner: LinkOwner,
        kind: ConstraintKind,
        owner_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            kind,
            owner_id: owner_id.into(),
            target_id: target_id.into(),
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} {}",
            self.owner, self.owner_id, self.kind, self.target_id
        )
    }
}

/// Role list filter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleFilter {
    pub app_code: Option<String>,
    pub module_code: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

impl RoleFilter {
    pub fn matches(&self, role: &Role) -> bool {
        self.app_code.as_ref().map_or(true, |a| &role.app_code == a)
            && self.module_code.as_ref().map_or(true, |m| &role.module_code == m)
            && (!self.active_only || role.is_active)
    }
}

/// PBU list filter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbuFilter {
    pub action_code: Option<String>,
    pub scope_code: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

impl PbuFilter {
    pub fn matches(&self, pbu: &PermissionBundleUnit) -> bool {
        self.action_code.as_ref().map_or(true, |a| &pbu.action_code == a)
            && self.scope_code.as_ref().map_or(true, |s| &pbu.scope_code == s)
            && (!self.active_only || pbu.is_active)
    }
}

pub(crate) fn default_true() -> bool {
    true
}

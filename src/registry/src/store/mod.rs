//! Registry persistence
//!
//! The store exposes atomic primitives only. Validation and graph planning
//! live in the services; the store guarantees that each call is one
//! transaction and that graph commits are compare-and-swap on the graph
//! revision.

use crate::types::{
    ConstraintKind, LinkKey, LinkOwner, PbuFilter, PbuUpdate, PermissionBundleUnit, Role,
    RoleFilter, RoleId, RoleInheritanceEdge, RoleUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryRegistryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresRegistryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Optimistic concurrency check failed
    #[error("stale write: {0}")]
    Stale(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Flat keyed catalogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Action,
    Scope,
    GeneralConstraint,
    FieldConstraint,
    ContextualBehavior,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Action => "action",
            CatalogKind::Scope => "scope",
            CatalogKind::GeneralConstraint => "general_constraint",
            CatalogKind::FieldConstraint => "field_constraint",
            CatalogKind::ContextualBehavior => "contextual_behavior",
        }
    }

    /// Catalog holding the link targets of a constraint kind
    pub fn for_constraint(kind: ConstraintKind) -> Self {
        match kind {
            ConstraintKind::General => CatalogKind::GeneralConstraint,
            ConstraintKind::Field => CatalogKind::FieldConstraint,
            ConstraintKind::Behavior => CatalogKind::ContextualBehavior,
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consistent view of the inheritance graph at one revision
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub revision: u64,
    pub edges: Vec<RoleInheritanceEdge>,
    /// Stored depth of every existing role
    pub depths: HashMap<RoleId, u32>,
}

impl GraphSnapshot {
    pub fn role_exists(&self, role_id: &str) -> bool {
        self.depths.contains_key(role_id)
    }

    pub fn has_edge(&self, parent: &str, child: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.parent_role_id == parent && e.child_role_id == child)
    }
}

/// Structural part of a graph commit
#[derive(Debug, Clone)]
pub enum GraphMutation {
    InsertEdge(RoleInheritanceEdge),
    RemoveEdge { parent: RoleId, child: RoleId },
    /// Remove a role and every edge incident to it
    DeleteRole(RoleId),
}

/// A planned graph commit
#[derive(Debug, Clone)]
pub struct GraphChange {
    /// Revision the plan was computed against
    pub expected_revision: u64,
    pub mutation: GraphMutation,
    /// New depths for roles whose depth changed
    pub depth_updates: Vec<(RoleId, u32)>,
    pub at: DateTime<Utc>,
}

/// Registry persistence trait
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Short backend name for health output
    fn backend_name(&self) -> &'static str;

    // Catalogs

    async fn insert_catalog(&self, kind: CatalogKind, key: &str, record: Value) -> StoreResult<()>;
    async fn update_catalog(&self, kind: CatalogKind, key: &str, record: Value) -> StoreResult<()>;
    async fn get_catalog(&self, kind: CatalogKind, key: &str) -> StoreResult<Option<Value>>;
    async fn list_catalog(&self, kind: CatalogKind) -> StoreResult<Vec<Value>>;
    async fn delete_catalog(&self, kind: CatalogKind, key: &str) -> StoreResult<()>;

    // Roles

    async fn insert_role(&self, role: Role) -> StoreResult<()>;
    async fn get_role(&self, role_id: &str) -> StoreResult<Option<Role>>;
    async fn list_roles(&self, filter: &RoleFilter) -> StoreResult<Vec<Role>>;
    /// Apply a partial update; depth is never touched here
    async fn update_role(
        &self,
        role_id: &str,
        update: &RoleUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<Role>;

    // Inheritance graph

    async fn graph_snapshot(&self) -> StoreResult<GraphSnapshot>;
    /// Apply a planned change if the graph revision still matches.
    /// Returns the new revision, or `StoreError::Stale`.
    async fn commit_graph(&self, change: GraphChange) -> StoreResult<u64>;
    async fn edges_from(&self, parent: &str) -> StoreResult<Vec<RoleInheritanceEdge>>;
    async fn edges_to(&self, child: &str) -> StoreResult<Vec<RoleInheritanceEdge>>;

    // Permission bundle units

    async fn insert_pbu(&self, pbu: PermissionBundleUnit) -> StoreResult<()>;
    async fn get_pbu(&self, pbu_id: &str) -> StoreResult<Option<PermissionBundleUnit>>;
    async fn list_pbus(&self, filter: &PbuFilter) -> StoreResult<Vec<PermissionBundleUnit>>;
    async fn update_pbu(
        &self,
        pbu_id: &str,
        update: &PbuUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<PermissionBundleUnit>;
    async fn delete_pbu(&self, pbu_id: &str) -> StoreResult<()>;

    // Associations and overrides

    /// Insert a link; `Conflict` if the composite key exists
    async fn insert_link(&self, key: &LinkKey) -> StoreResult<()>;
    /// Remove a link; `NotFound` if absent
    async fn remove_link(&self, key: &LinkKey) -> StoreResult<()>;
    async fn list_links(
        &self,
        owner: LinkOwner,
        kind: ConstraintKind,
        owner_id: &str,
    ) -> StoreResult<Vec<String>>;
}

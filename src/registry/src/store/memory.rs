//! In-memory registry store
//!
//! All state sits behind one `RwLock`; every mutating call holds the write
//! guard for its full duration, which makes each call atomic and serializes
//! graph commits.

use super::{CatalogKind, GraphChange, GraphMutation, GraphSnapshot, RegistryStore, StoreError, StoreResult};
use crate::types::{
    ConstraintKind, LinkKey, LinkOwner, PbuFilter, PbuId, PbuUpdate, PermissionBundleUnit, Role,
    RoleFilter, RoleId, RoleInheritanceEdge, RoleUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct RegistryState {
    catalogs: BTreeMap<(CatalogKind, String), Value>,
    roles: BTreeMap<RoleId, Role>,
    edges: BTreeMap<(RoleId, RoleId), RoleInheritanceEdge>,
    graph_revision: u64,
    pbus: BTreeMap<PbuId, PermissionBundleUnit>,
    links: BTreeSet<LinkKey>,
}

/// In-memory registry store implementation
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistryStore {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryRegistryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_catalog(&self, kind: CatalogKind, key: &str, record: Value) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let map_key = (kind, key.to_string());
        if state.catalogs.contains_key(&map_key) {
            return Err(StoreError::Conflict(format!("{} '{}' already exists", kind, key)));
        }
        state.catalogs.insert(map_key, record);
        Ok(())
    }

    async fn update_catalog(&self, kind: CatalogKind, key: &str, record: Value) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.catalogs.get_mut(&(kind, key.to_string())) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("{} '{}'", kind, key))),
        }
    }

    async fn get_catalog(&self, kind: CatalogKind, key: &str) -> StoreResult<Option<Value>> {
        let state = self.state.read().await;
        Ok(state.catalogs.get(&(kind, key.to_string())).cloned())
    }

    async fn list_catalog(&self, kind: CatalogKind) -> StoreResult<Vec<Value>> {
        let state = self.state.read().await;
        Ok(state
            .catalogs
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn delete_catalog(&self, kind: CatalogKind, key: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .catalogs
            .remove(&(kind, key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{} '{}'", kind, key)))
    }

    async fn insert_role(&self, role: Role) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.roles.contains_key(&role.role_id) {
            return Err(StoreError::Conflict(format!(
                "role '{}' already exists",
                role.role_id
            )));
        }
        state.roles.insert(role.role_id.clone(), role);
        Ok(())
    }

    async fn get_role(&self, role_id: &str) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.get(role_id).cloned())
    }

    async fn list_roles(&self, filter: &RoleFilter) -> StoreResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn update_role(
        &self,
        role_id: &str,
        update: &RoleUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        let role = state
            .roles
            .get_mut(role_id)
            .ok_or_else(|| StoreError::NotFound(format!("role '{}'", role_id)))?;

        if let Some(expected) = update.expected_version {
            if role.version != expected {
                return Err(StoreError::Stale(format!(
                    "role '{}' is at version {}, expected {}",
                    role_id, role.version, expected
                )));
            }
        }

        if let Some(name) = &update.display_name {
            role.display_name = name.clone();
        }
        if let Some(active) = update.is_active {
            role.is_active = active;
        }
        if let Some(customizable) = update.tenant_customizable {
            role.tenant_customizable = customizable;
        }
        role.version += 1;
        role.updated_at = at;
        Ok(role.clone())
    }

    async fn graph_snapshot(&self) -> StoreResult<GraphSnapshot> {
        let state = self.state.read().await;
        Ok(GraphSnapshot {
            revision: state.graph_revision,
            edges: state.edges.values().cloned().collect(),
            depths: state
                .roles
                .values()
                .map(|r| (r.role_id.clone(), r.inheritance_depth))
                .collect(),
        })
    }

    async fn commit_graph(&self, change: GraphChange) -> StoreResult<u64> {
        let mut state = self.state.write().await;

        if state.graph_revision != change.expected_revision {
            return Err(StoreError::Stale(format!(
                "graph is at revision {}, plan was computed at {}",
                state.graph_revision, change.expected_revision
            )));
        }

        // Check everything before touching state
        match &change.mutation {
            GraphMutation::InsertEdge(edge) => {
                for id in [&edge.parent_role_id, &edge.child_role_id] {
                    if !state.roles.contains_key(id) {
                        return Err(StoreError::NotFound(format!("role '{}'", id)));
                    }
                }
                let key = (edge.parent_role_id.clone(), edge.child_role_id.clone());
                if state.edges.contains_key(&key) {
                    return Err(StoreError::Conflict(format!(
                        "edge {} -> {} already exists",
                        key.0, key.1
                    )));
                }
            }
            GraphMutation::RemoveEdge { parent, child } => {
                if !state.edges.contains_key(&(parent.clone(), child.clone())) {
                    return Err(StoreError::NotFound(format!("edge {} -> {}", parent, child)));
                }
            }
            GraphMutation::DeleteRole(role_id) => {
                if !state.roles.contains_key(role_id) {
                    return Err(StoreError::NotFound(format!("role '{}'", role_id)));
                }
            }
        }

        match change.mutation {
            GraphMutation::InsertEdge(edge) => {
                let key = (edge.parent_role_id.clone(), edge.child_role_id.clone());
                state.edges.insert(key, edge);
            }
            GraphMutation::RemoveEdge { parent, child } => {
                state.edges.remove(&(parent, child));
            }
            GraphMutation::DeleteRole(role_id) => {
                state.roles.remove(&role_id);
                state
                    .edges
                    .retain(|(p, c), _| p != &role_id && c != &role_id);
            }
        }

        for (role_id, depth) in change.depth_updates {
            if let Some(role) = state.roles.get_mut(&role_id) {
                role.inheritance_depth = depth;
                role.version += 1;
                role.updated_at = change.at;
            }
        }

        state.graph_revision += 1;
        Ok(state.graph_revision)
    }

    async fn edges_from(&self, parent: &str) -> StoreResult<Vec<RoleInheritanceEdge>> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .values()
            .filter(|e| e.parent_role_id == parent)
            .cloned()
            .collect())
    }

    async fn edges_to(&self, child: &str) -> StoreResult<Vec<RoleInheritanceEdge>> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .values()
            .filter(|e| e.child_role_id == child)
            .cloned()
            .collect())
    }

    async fn insert_pbu(&self, pbu: PermissionBundleUnit) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.pbus.contains_key(&pbu.pbu_id) {
            return Err(StoreError::Conflict(format!(
                "PBU '{}' already exists",
                pbu.pbu_id
            )));
        }
        state.pbus.insert(pbu.pbu_id.clone(), pbu);
        Ok(())
    }

    async fn get_pbu(&self, pbu_id: &str) -> StoreResult<Option<PermissionBundleUnit>> {
        let state = self.state.read().await;
        Ok(state.pbus.get(pbu_id).cloned())
    }

    async fn list_pbus(&self, filter: &PbuFilter) -> StoreResult<Vec<PermissionBundleUnit>> {
        let state = self.state.read().await;
        Ok(state
            .pbus
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn update_pbu(
        &self,
        pbu_id: &str,
        update: &PbuUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<PermissionBundleUnit> {
        let mut state = self.state.write().await;
        let pbu = state
            .pbus
            .get_mut(pbu_id)
            .ok_or_else(|| StoreError::NotFound(format!("PBU '{}'", pbu_id)))?;

        if let Some(expected) = update.expected_version {
            if pbu.version != expected {
                return Err(StoreError::Stale(format!(
                    "PBU '{}' is at version {}, expected {}",
                    pbu_id, pbu.version, expected
                )));
            }
        }

        if let Some(v) = &update.display_name {
            pbu.display_name = v.clone();
        }
        if let Some(v) = &update.api_endpoint {
            pbu.api_endpoint = v.clone();
        }
        if let Some(v) = &update.action_code {
            pbu.action_code = v.clone();
        }
        if let Some(v) = &update.scope_code {
            pbu.scope_code = v.clone();
        }
        if let Some(v) = update.is_active {
            pbu.is_active = v;
        }
        pbu.version += 1;
        pbu.updated_at = at;
        Ok(pbu.clone())
    }

    async fn delete_pbu(&self, pbu_id: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .pbus
            .remove(pbu_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("PBU '{}'", pbu_id)))
    }

    async fn insert_link(&self, key: &LinkKey) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.links.insert(key.clone()) {
            return Err(StoreError::Conflict(format!("link {} already exists", key)));
        }
        Ok(())
    }

    async fn remove_link(&self, key: &LinkKey) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.links.remove(key) {
            return Err(StoreError::NotFound(format!("link {}", key)));
        }
        Ok(())
    }

    async fn list_links(
        &self,
        owner: LinkOwner,
        kind: ConstraintKind,
        owner_id: &str,
    ) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .links
            .iter()
            .filter(|k| k.owner == owner && k.kind == kind && k.owner_id == owner_id)
            .map(|k| k.target_id.clone())
            .collect())
    }
}

//! Role inheritance graph engine
//!
//! Sole writer of edges and of `Role::inheritance_depth`. Every mutation
//! follows the same protocol:
//!
//! 1. Read a [`GraphSnapshot`] (edges, stored depths, revision)
//! 2. Plan the change purely: validation, cycle check, depth recomputation
//! 3. Commit with compare-and-swap on the snapshot revision
//! 4. On a stale revision, start over from a fresh snapshot
//!
//! Depth is recomputed for every role reachable from the change, not only the
//! immediate child, so descendants never keep a depth derived from an old
//! parent depth.

use super::graph::{find_cycle_path, GraphError, InheritanceGraph};
use crate::config::{RegistryConfig, MAX_DEPTH};
use crate::error::{RegistryError, Result};
use crate::metrics::RegistryMetrics;
use crate::store::{GraphChange, GraphMutation, GraphSnapshot, RegistryStore, StoreError};
use crate::types::{RoleId, RoleInheritanceEdge};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Role inheritance graph engine
#[derive(Clone)]
pub struct HierarchyEngine {
    store: Arc<dyn RegistryStore>,
    max_attempts: u32,
    metrics: RegistryMetrics,
}

impl HierarchyEngine {
    pub fn new(store: Arc<dyn RegistryStore>, config: &RegistryConfig, metrics: RegistryMetrics) -> Self {
        Self {
            store,
            max_attempts: config.graph_max_retries.max(1),
            metrics,
        }
    }

    /// Create a `parent → child` inheritance edge
    ///
    /// # Errors
    ///
    /// - `BadRequest` for a self-loop or when any depth would exceed the limit
    /// - `NotFound` when either role is missing
    /// - `Conflict` for a duplicate edge or one that would close a cycle
    #[instrument(skip(self), fields(parent = %parent_id, child = %child_id))]
    pub async fn create_edge(
        &self,
        parent_id: &str,
        child_id: &str,
        approved_by: Option<String>,
    ) -> Result<RoleInheritanceEdge> {
        let result = self.create_edge_inner(parent_id, child_id, approved_by).await;
        self.metrics.record("create_edge", &result);
        result
    }

    async fn create_edge_inner(
        &self,
        parent_id: &str,
        child_id: &str,
        approved_by: Option<String>,
    ) -> Result<RoleInheritanceEdge> {
        if parent_id == child_id {
            return Err(RegistryError::bad_request(format!(
                "role '{}' cannot inherit from itself",
                parent_id
            )));
        }

        let edge = RoleInheritanceEdge::new(parent_id, child_id).with_approver(approved_by);
        let depth_updates = self
            .commit_with_retry(|snapshot| plan_edge_insert(snapshot, &edge))
            .await?;

        info!(
            parent = %parent_id,
            child = %child_id,
            depth_changes = depth_updates.len(),
            "role inheritance edge created"
        );
        Ok(edge)
    }

    /// Remove a `parent → child` inheritance edge
    #[instrument(skip(self), fields(parent = %parent_id, child = %child_id))]
    pub async fn delete_edge(&self, parent_id: &str, child_id: &str) -> Result<()> {
        let result = self
            .commit_with_retry(|snapshot| plan_edge_removal(snapshot, parent_id, child_id))
            .await
            .map(|depth_updates| {
                info!(
                    parent = %parent_id,
                    child = %child_id,
                    depth_changes = depth_updates.len(),
                    "role inheritance edge removed"
                );
            });
        self.metrics.record("delete_edge", &result);
        result
    }

    /// Delete a role together with its incident edges
    ///
    /// Former descendants get their depth recomputed in the same commit.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, role_id: &str) -> Result<()> {
        let result = self
            .commit_with_retry(|snapshot| plan_role_removal(snapshot, role_id))
            .await
            .map(|depth_updates| {
                info!(
                    role_id,
                    depth_changes = depth_updates.len(),
                    "role deleted"
                );
            });
        self.metrics.record("delete_role", &result);
        result
    }

    /// Direct children of a role
    pub async fn get_children(&self, parent_id: &str) -> Result<Vec<RoleInheritanceEdge>> {
        Ok(self.store.edges_from(parent_id).await?)
    }

    /// Direct parents of a role
    pub async fn get_parents(&self, child_id: &str) -> Result<Vec<RoleInheritanceEdge>> {
        Ok(self.store.edges_to(child_id).await?)
    }

    /// Every role the given role transitively inherits from
    pub async fn ancestors(&self, role_id: &str) -> Result<BTreeSet<RoleId>> {
        let snapshot = self.existing_snapshot(role_id).await?;
        Ok(InheritanceGraph::from_edges(&snapshot.edges).ancestors(role_id))
    }

    /// Every role that transitively inherits from the given role
    pub async fn descendants(&self, role_id: &str) -> Result<BTreeSet<RoleId>> {
        let snapshot = self.existing_snapshot(role_id).await?;
        Ok(InheritanceGraph::from_edges(&snapshot.edges).descendants(role_id))
    }

    async fn existing_snapshot(&self, role_id: &str) -> Result<GraphSnapshot> {
        let snapshot = self.store.graph_snapshot().await?;
        if !snapshot.role_exists(role_id) {
            return Err(RegistryError::not_found(format!("role '{}'", role_id)));
        }
        Ok(snapshot)
    }

    /// Plan against a fresh snapshot and commit, retrying on a stale revision
    ///
    /// Returns the depth updates of the committed plan.
    async fn commit_with_retry<F>(&self, plan: F) -> Result<Vec<(RoleId, u32)>>
    where
        F: Fn(&GraphSnapshot) -> Result<(GraphMutation, Vec<(RoleId, u32)>)>,
    {
        for attempt in 1..=self.max_attempts {
            let snapshot = self.store.graph_snapshot().await?;
            let (mutation, depth_updates) = plan(&snapshot)?;

            let change = GraphChange {
                expected_revision: snapshot.revision,
                mutation,
                depth_updates: depth_updates.clone(),
                at: Utc::now(),
            };

            match self.store.commit_graph(change).await {
                Ok(revision) => {
                    debug!(revision, attempt, "graph change committed");
                    return Ok(depth_updates);
                }
                Err(StoreError::Stale(reason)) => {
                    self.metrics.graph_commit_retries_total.inc();
                    debug!(attempt, %reason, "graph changed concurrently, replanning");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RegistryError::conflict(format!(
            "inheritance graph kept changing concurrently; gave up after {} attempts",
            self.max_attempts
        )))
    }
}

/// Plan an edge insertion against a snapshot
pub(crate) fn plan_edge_insert(
    snapshot: &GraphSnapshot,
    edge: &RoleInheritanceEdge,
) -> Result<(GraphMutation, Vec<(RoleId, u32)>)> {
    let (parent, child) = edge.key();

    if parent == child {
        return Err(RegistryError::bad_request(format!(
            "role '{}' cannot inherit from itself",
            parent
        )));
    }
    for id in [parent, child] {
        if !snapshot.role_exists(id) {
            return Err(RegistryError::not_found(format!("role '{}'", id)));
        }
    }
    if snapshot.has_edge(parent, child) {
        return Err(RegistryError::conflict(format!(
            "role '{}' already inherits from '{}'",
            child, parent
        )));
    }
    if let Some(cycle) = find_cycle_path(&snapshot.edges, parent, child) {
        return Err(RegistryError::conflict(format!(
            "edge {} -> {} would create an inheritance cycle: {}",
            parent,
            child,
            cycle.join(" -> ")
        )));
    }

    let mut graph = InheritanceGraph::from_edges(&snapshot.edges);
    graph.add_edge(parent, child);
    let depth_updates = depth_changes(snapshot, &graph)?;

    if let Some((role, depth)) = depth_updates.iter().find(|(_, d)| *d > MAX_DEPTH) {
        return Err(RegistryError::bad_request(format!(
            "edge {} -> {} would give role '{}' inheritance depth {} (maximum {})",
            parent, child, role, depth, MAX_DEPTH
        )));
    }

    Ok((GraphMutation::InsertEdge(edge.clone()), depth_updates))
}

/// Plan an edge removal against a snapshot
pub(crate) fn plan_edge_removal(
    snapshot: &GraphSnapshot,
    parent: &str,
    child: &str,
) -> Result<(GraphMutation, Vec<(RoleId, u32)>)> {
    let mut graph = InheritanceGraph::from_edges(&snapshot.edges);
    if !graph.remove_edge(parent, child) {
        return Err(RegistryError::not_found(format!(
            "inheritance edge {} -> {}",
            parent, child
        )));
    }

    let depth_updates = depth_changes(snapshot, &graph)?;
    Ok((
        GraphMutation::RemoveEdge {
            parent: parent.to_string(),
            child: child.to_string(),
        },
        depth_updates,
    ))
}

/// Plan a role deletion against a snapshot
pub(crate) fn plan_role_removal(
    snapshot: &GraphSnapshot,
    role_id: &str,
) -> Result<(GraphMutation, Vec<(RoleId, u32)>)> {
    if !snapshot.role_exists(role_id) {
        return Err(RegistryError::not_found(format!("role '{}'", role_id)));
    }

    let mut graph = InheritanceGraph::from_edges(&snapshot.edges);
    graph.remove_node(role_id);

    let remaining = GraphSnapshot {
        revision: snapshot.revision,
        edges: Vec::new(),
        depths: snapshot
            .depths
            .iter()
            .filter(|(id, _)| id.as_str() != role_id)
            .map(|(id, d)| (id.clone(), *d))
            .collect(),
    };
    let depth_updates = depth_changes(&remaining, &graph)?;
    Ok((GraphMutation::DeleteRole(role_id.to_string()), depth_updates))
}

/// Roles whose depth under `graph` differs from the stored depth, sorted by id
fn depth_changes(snapshot: &GraphSnapshot, graph: &InheritanceGraph) -> Result<Vec<(RoleId, u32)>> {
    let depths: HashMap<String, u32> = graph
        .compute_depths(snapshot.depths.keys().map(String::as_str))
        .map_err(|e| match e {
            GraphError::CircularDependency(path) => RegistryError::conflict(format!(
                "inheritance graph contains a cycle: {}",
                path
            )),
        })?;

    let mut changes: Vec<(RoleId, u32)> = depths
        .into_iter()
        .filter(|(id, depth)| snapshot.depths.get(id).map_or(false, |stored| stored != depth))
        .collect();
    changes.sort();
    Ok(changes)
}

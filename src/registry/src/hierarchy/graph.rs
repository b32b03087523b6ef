//! Role inheritance graph
//!
//! Pure adjacency structure built fresh from persisted edges for every
//! operation. Nothing in this module touches the store, so cycle detection and
//! depth computation can be planned before any side effect happens.
//!
//! - Cycle detection: DFS from the candidate child looking for the candidate
//!   parent on the post-insertion graph
//! - Depth: longest path from a root, computed over a Kahn topological order

use crate::types::RoleInheritanceEdge;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Graph-related errors
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// The edge set contains a cycle
    #[error("Circular inheritance detected: {0}")]
    CircularDependency(String),
}

/// Directed parent → child adjacency over role ids
#[derive(Debug, Clone, Default)]
pub struct InheritanceGraph {
    children: HashMap<String, Vec<String>>,
    parents: HashMap<String, Vec<String>>,
}

impl InheritanceGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from `(parent, child)` pairs
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::new();
        for (parent, child) in pairs {
            graph.add_edge(parent, child);
        }
        graph
    }

    /// Build the graph from persisted edges
    pub fn from_edges(edges: &[RoleInheritanceEdge]) -> Self {
        Self::from_pairs(edges.iter().map(|e| e.key()))
    }

    /// Add an edge; duplicates are ignored
    pub fn add_edge(&mut self, parent: &str, child: &str) {
        let kids = self.children.entry(parent.to_string()).or_default();
        if kids.iter().any(|c| c == child) {
            return;
        }
        kids.push(child.to_string());
        self.parents
            .entry(child.to_string())
            .or_default()
            .push(parent.to_string());
    }

    /// Remove an edge; returns whether it was present
    pub fn remove_edge(&mut self, parent: &str, child: &str) -> bool {
        let removed = match self.children.get_mut(parent) {
            Some(kids) => {
                let before = kids.len();
                kids.retain(|c| c != child);
                before != kids.len()
            }
            None => false,
        };
        if removed {
            if let Some(ps) = self.parents.get_mut(child) {
                ps.retain(|p| p != parent);
            }
        }
        removed
    }

    /// Remove a node and every incident edge
    pub fn remove_node(&mut self, node: &str) {
        if let Some(kids) = self.children.remove(node) {
            for kid in kids {
                if let Some(ps) = self.parents.get_mut(&kid) {
                    ps.retain(|p| p != node);
                }
            }
        }
        if let Some(ps) = self.parents.remove(node) {
            for p in ps {
                if let Some(kids) = self.children.get_mut(&p) {
                    kids.retain(|c| c != node);
                }
            }
        }
    }

    pub fn has_edge(&self, parent: &str, child: &str) -> bool {
        self.children
            .get(parent)
            .map_or(false, |kids| kids.iter().any(|c| c == child))
    }

    /// Direct children of a role
    pub fn children(&self, node: &str) -> &[String] {
        self.children.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct parents of a role
    pub fn parents(&self, node: &str) -> &[String] {
        self.parents.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first search for a path `from → … → to` following child links
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();
        if self.dfs_path(from, to, &mut visited, &mut path) {
            Some(path.into_iter().map(str::to_string).collect())
        } else {
            None
        }
    }

    fn dfs_path<'a>(
        &'a self,
        node: &'a str,
        target: &str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> bool {
        if !visited.insert(node) {
            return false;
        }
        path.push(node);
        if node == target {
            return true;
        }
        for kid in self.children(node) {
            if self.dfs_path(kid, target, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Whether `to` is reachable from `from` (a node reaches itself)
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        self.find_path(from, to).is_some()
    }

    /// All transitive children of a role, excluding the role itself
    pub fn descendants(&self, node: &str) -> BTreeSet<String> {
        Self::walk(node, |n| self.children(n))
    }

    /// All transitive parents of a role, excluding the role itself
    pub fn ancestors(&self, node: &str) -> BTreeSet<String> {
        Self::walk(node, |n| self.parents(n))
    }

    fn walk<'a, F>(start: &str, next: F) -> BTreeSet<String>
    where
        F: Fn(&str) -> &'a [String],
    {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<String> = next(start).iter().cloned().collect();
        while let Some(current) = queue.pop_front() {
            if current == start || !seen.insert(current.clone()) {
                continue;
            }
            queue.extend(next(&current).iter().cloned());
        }
        seen
    }

    /// Topological order over `nodes` plus every node mentioned by an edge
    ///
    /// Kahn's algorithm: repeatedly emit nodes whose parents have all been
    /// emitted. Leftover nodes mean a cycle, reported with a DFS path.
    pub fn topological_order<'a, I>(&self, nodes: I) -> Result<Vec<String>, GraphError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut all: BTreeSet<&str> = nodes.into_iter().collect();
        for (parent, kids) in &self.children {
            all.insert(parent.as_str());
            all.extend(kids.iter().map(String::as_str));
        }

        let mut in_degree: HashMap<&str, usize> = all
            .iter()
            .map(|n| (*n, self.parents(n).len()))
            .collect();

        let mut queue: VecDeque<&str> = all
            .iter()
            .copied()
            .filter(|n| in_degree.get(n).copied() == Some(0))
            .collect();

        let mut sorted = Vec::with_capacity(all.len());
        while let Some(current) = queue.pop_front() {
            sorted.push(current.to_string());
            for kid in self.children(current) {
                if let Some(degree) = in_degree.get_mut(kid.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(kid.as_str());
                    }
                }
            }
        }

        if sorted.len() != all.len() {
            let emitted: HashSet<&str> = sorted.iter().map(String::as_str).collect();
            let stuck = all.iter().copied().find(|n| !emitted.contains(n));
            let detail = stuck
                .and_then(|n| self.cycle_through(n))
                .map(|cycle| cycle.join(" -> "))
                .unwrap_or_else(|| "unknown cycle".to_string());
            return Err(GraphError::CircularDependency(detail));
        }

        Ok(sorted)
    }

    /// A cycle starting and ending at `node`, if any
    fn cycle_through(&self, node: &str) -> Option<Vec<String>> {
        self.children(node).iter().find_map(|kid| {
            self.find_path(kid, node).map(|mut path| {
                path.insert(0, node.to_string());
                path
            })
        })
    }

    /// Depth of every node: 0 for roots, otherwise 1 + max parent depth
    pub fn compute_depths<'a, I>(&self, nodes: I) -> Result<HashMap<String, u32>, GraphError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let order = self.topological_order(nodes)?;
        let mut depths: HashMap<String, u32> = HashMap::with_capacity(order.len());
        for node in order {
            let depth = self
                .parents(&node)
                .iter()
                .filter_map(|p| depths.get(p))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depths.insert(node, depth);
        }
        Ok(depths)
    }

    /// Longest path from a root to `node`
    ///
    /// Assumes the graph is acyclic.
    pub fn depth_of(&self, node: &str) -> u32 {
        let mut memo: HashMap<&str, u32> = HashMap::new();
        self.depth_memo(node, &mut memo, &mut HashSet::new())
    }

    fn depth_memo<'a>(
        &'a self,
        node: &'a str,
        memo: &mut HashMap<&'a str, u32>,
        on_stack: &mut HashSet<&'a str>,
    ) -> u32 {
        if let Some(d) = memo.get(node) {
            return *d;
        }
        // Guard against malformed input; a back edge contributes nothing
        if !on_stack.insert(node) {
            return 0;
        }
        let depth = self
            .parents(node)
            .iter()
            .map(|p| self.depth_memo(p, memo, on_stack) + 1)
            .max()
            .unwrap_or(0);
        on_stack.remove(node);
        memo.insert(node, depth);
        depth
    }
}

/// Whether adding `parent → child` to `edges` would close a cycle
///
/// Runs against the post-insertion graph so the candidate edge itself is part
/// of the search.
pub fn would_create_cycle(edges: &[RoleInheritanceEdge], parent: &str, child: &str) -> bool {
    find_cycle_path(edges, parent, child).is_some()
}

/// The cycle the candidate edge would close, as `child → … → parent → child`
pub fn find_cycle_path(
    edges: &[RoleInheritanceEdge],
    parent: &str,
    child: &str,
) -> Option<Vec<String>> {
    let mut graph = InheritanceGraph::from_edges(edges);
    graph.add_edge(parent, child);
    graph.find_path(child, parent).map(|mut path| {
        path.push(child.to_string());
        path
    })
}

/// Inheritance depth of `role_id` under `edges`
pub fn compute_depth(edges: &[RoleInheritanceEdge], role_id: &str) -> u32 {
    InheritanceGraph::from_edges(edges).depth_of(role_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<RoleInheritanceEdge> {
        pairs
            .iter()
            .map(|(p, c)| RoleInheritanceEdge::new(*p, *c))
            .collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = InheritanceGraph::new();
        assert_eq!(graph.topological_order(std::iter::empty()).unwrap(), Vec::<String>::new());
        assert_eq!(graph.depth_of("A.B.C"), 0);
    }

    #[test]
    fn test_linear_depths() {
        let e = edges(&[("a", "b"), ("b", "c"), ("c", "d")]);
        assert_eq!(compute_depth(&e, "a"), 0);
        assert_eq!(compute_depth(&e, "b"), 1);
        assert_eq!(compute_depth(&e, "d"), 3);
    }

    #[test]
    fn test_diamond_takes_longest_path() {
        // a -> b -> d, a -> d, x -> d
        let e = edges(&[("a", "b"), ("b", "d"), ("a", "d"), ("x", "d")]);
        let graph = InheritanceGraph::from_edges(&e);
        let depths = graph.compute_depths(["lonely"]).unwrap();
        assert_eq!(depths["d"], 2);
        assert_eq!(depths["x"], 0);
        assert_eq!(depths["lonely"], 0);
    }

    #[test]
    fn test_self_loop_is_cycle() {
        assert!(would_create_cycle(&[], "a", "a"));
    }

    #[test]
    fn test_two_role_cycle() {
        let e = edges(&[("a", "b")]);
        assert!(would_create_cycle(&e, "b", "a"));
        assert!(!would_create_cycle(&e, "a", "c"));
    }

    #[test]
    fn test_cycle_path_reporting() {
        let e = edges(&[("a", "b"), ("b", "c"), ("c", "d")]);
        let path = find_cycle_path(&e, "d", "a").unwrap();
        assert_eq!(path, vec!["a", "b", "c", "d", "a"]);
    }

    #[test]
    fn test_parallel_branches_not_cycle() {
        let e = edges(&[("a", "b"), ("a", "c"), ("b", "d")]);
        assert!(!would_create_cycle(&e, "c", "d"));
    }

    #[test]
    fn test_topological_order_detects_cycle() {
        let graph = InheritanceGraph::from_pairs([("a", "b"), ("b", "c"), ("c", "a")]);
        match graph.topological_order(std::iter::empty()) {
            Err(GraphError::CircularDependency(msg)) => {
                assert!(msg.contains('a') && msg.contains('b') && msg.contains('c'));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_edge_and_node() {
        let mut graph = InheritanceGraph::from_pairs([("a", "b"), ("b", "c"), ("x", "b")]);
        assert!(graph.remove_edge("a", "b"));
        assert!(!graph.remove_edge("a", "b"));
        assert_eq!(graph.parents("b"), &["x".to_string()]);

        graph.remove_node("b");
        assert!(graph.children("x").is_empty());
        assert!(graph.parents("c").is_empty());
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let graph = InheritanceGraph::from_pairs([("a", "b"), ("b", "c"), ("a", "c"), ("c", "d")]);
        let desc: Vec<_> = graph.descendants("a").into_iter().collect();
        assert_eq!(desc, vec!["b", "c", "d"]);
        let anc: Vec<_> = graph.ancestors("d").into_iter().collect();
        assert_eq!(anc, vec!["a", "b", "c"]);
        assert!(graph.descendants("d").is_empty());
    }
}

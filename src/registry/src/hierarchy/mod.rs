//! Role inheritance hierarchy
//!
//! Maintains the directed acyclic graph of parent → child role edges and the
//! derived `inheritance_depth` of every role.
//!
//! # Features
//!
//! - **Cycle Rejection**: DFS on the post-insertion graph, with the offending
//!   path in the error
//! - **Depth Limit**: longest path from a root, capped at [`MAX_DEPTH`]
//! - **Full Propagation**: every role whose depth changes is rewritten in the
//!   same commit as the edge
//! - **Optimistic Commits**: plans are validated against a revisioned snapshot
//!   and retried when a concurrent writer got there first
//!
//! # Example
//!
//! ```rust
//! use permreg_registry::{NewRole, PermissionRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = PermissionRegistry::in_memory()?;
//! registry.roles().create(NewRole::new("HR.LEAVE.VIEWER", "Viewer")).await?;
//! registry.roles().create(NewRole::new("HR.LEAVE.APPROVER", "Approver")).await?;
//!
//! registry
//!     .hierarchy()
//!     .create_edge("HR.LEAVE.VIEWER", "HR.LEAVE.APPROVER", None)
//!     .await?;
//!
//! let approver = registry.roles().get("HR.LEAVE.APPROVER").await?;
//! assert_eq!(approver.inheritance_depth, 1);
//! # Ok(())
//! # }
//! ```
//!
//! [`MAX_DEPTH`]: crate::config::MAX_DEPTH

pub mod engine;
pub mod graph;


pub use engine::HierarchyEngine;
pub use graph::{compute_depth, find_cycle_path, would_create_cycle, GraphError, InheritanceGraph};

//! # Permission Registry
//!
//! Authoritative registry of roles, permission bundle units (PBUs) and the
//! constraint/behavior records attached to them.
//!
//! ## Features
//!
//! - **Role Inheritance**: directed acyclic graph with cycle rejection and a
//!   depth limit, maintained under optimistic concurrency
//! - **Naming Rules**: `{APP}.{MODULE}.{ROLE_FUNCTION}` roles and
//!   `PBU_{RESOURCE}_{ACTION}_{SCOPE}` PBUs
//! - **Catalogs**: actions, scopes, general/field constraints and contextual
//!   behaviors with JSON payload validation
//! - **Associations & Overrides**: PBU-level and role-level links to
//!   constraints and behaviors with set semantics
//! - **Pluggable Storage**: in-memory and PostgreSQL (`postgres` feature)
//!
//! ## Example
//!
//! ```rust
//! use permreg_registry::{ConstraintKind, NewRole, PermissionRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = PermissionRegistry::in_memory()?;
//!
//! registry.roles().create(NewRole::new("FIN.AP.CLERK", "AP Clerk")).await?;
//! registry.roles().create(NewRole::new("FIN.AP.SUPERVISOR", "AP Supervisor")).await?;
//! registry
//!     .hierarchy()
//!     .create_edge("FIN.AP.CLERK", "FIN.AP.SUPERVISOR", Some("controller".into()))
//!     .await?;
//!
//! let overrides = registry
//!     .overrides()
//!     .list(ConstraintKind::General, "FIN.AP.SUPERVISOR")
//!     .await?;
//! assert!(overrides.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod directory;
pub mod error;
pub mod hierarchy;
pub mod links;
pub mod metrics;
pub mod naming;
pub mod pbu;
pub mod registry;
pub mod role;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use catalog::{CatalogRecord, CatalogService};
pub use config::{RegistryConfig, MAX_DEPTH};
pub use directory::{
    AllowAllDirectory, ApplicationDirectory, DirectoryError, DirectoryFailurePolicy,
    HttpApplicationDirectory, StaticApplicationDirectory,
};
pub use error::{RegistryError, Result};
pub use hierarchy::HierarchyEngine;
pub use links::{AssociationResolver, ConstraintSet, ConstraintView, OverrideResolver};
pub use metrics::RegistryMetrics;
pub use pbu::PbuManager;
pub use registry::PermissionRegistry;
pub use role::RoleService;
pub use store::{CatalogKind, InMemoryRegistryStore, RegistryStore};
#[cfg(feature = "postgres")]
pub use store::PostgresRegistryStore;
pub use types::{
    Action, ConstraintKind, ContextualBehavior, FieldConstraint, GeneralConstraint, LinkOwner,
    NewPbu, NewRole, PbuFilter, PbuUpdate, PermissionBundleUnit, Role, RoleFilter,
    RoleInheritanceEdge, RoleUpdate, Scope,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

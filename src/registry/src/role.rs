//! Role management
//!
//! Creation validates the identifier, checks that its segments agree with the
//! supplied codes, and asks the application directory whether the
//! application and module are active. Depth is never set here; new roles
//! start as roots and only the hierarchy engine moves them.

use crate::directory::{DirectoryGate, DirectoryVerdict};
use crate::error::{RegistryError, Result};
use crate::hierarchy::HierarchyEngine;
use crate::metrics::RegistryMetrics;
use crate::naming::parse_role_id;
use crate::store::RegistryStore;
use crate::types::{NewRole, Role, RoleFilter, RoleUpdate};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// Role lifecycle operations
#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn RegistryStore>,
    directory: DirectoryGate,
    hierarchy: HierarchyEngine,
    metrics: RegistryMetrics,
}

impl RoleService {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        directory: DirectoryGate,
        hierarchy: HierarchyEngine,
        metrics: RegistryMetrics,
    ) -> Self {
        Self {
            store,
            directory,
            hierarchy,
            metrics,
        }
    }

    /// Register a new role at depth 0
    ///
    /// # Errors
    ///
    /// - `BadRequest` for a malformed id, segments that disagree with the
    ///   supplied codes, or an application/module the directory reports inactive
    /// - `Conflict` if the id is taken
    /// - `Internal` if the directory is unreachable under fail-closed
    #[instrument(skip(self, input), fields(role_id = %input.role_id))]
    pub async fn create(&self, input: NewRole) -> Result<Role> {
        let result = self.create_inner(input).await;
        self.metrics.record("create_role", &result);
        result
    }

    async fn create_inner(&self, input: NewRole) -> Result<Role> {
        let parts = parse_role_id(&input.role_id)?;
        let app_code = matching_segment("appCode", input.app_code.as_deref(), parts.app_code)?;
        let module_code =
            matching_segment("moduleCode", input.module_code.as_deref(), parts.module_code)?;
        let role_function = matching_segment(
            "roleFunction",
            input.role_function.as_deref(),
            parts.role_function,
        )?;
        if input.display_name.trim().is_empty() {
            return Err(RegistryError::bad_request("displayName must not be empty"));
        }

        if self.store.get_role(&input.role_id).await?.is_some() {
            return Err(RegistryError::conflict(format!(
                "role '{}' already exists",
                input.role_id
            )));
        }

        self.check_directory(&app_code, &module_code).await?;

        let now = Utc::now();
        let role = Role {
            role_id: input.role_id,
            display_name: input.display_name,
            app_code,
            module_code,
            role_function,
            is_active: input.is_active,
            inheritance_depth: 0,
            tenant_customizable: input.tenant_customizable,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_role(role.clone()).await?;

        info!(
            role_id = %role.role_id,
            app_code = %role.app_code,
            module_code = %role.module_code,
            "role created"
        );
        Ok(role)
    }

    /// Update display name and flags
    ///
    /// The directory is consulted again since the application or module may
    /// have been retired since creation.
    #[instrument(skip(self, update))]
    pub async fn update(&self, role_id: &str, update: RoleUpdate) -> Result<Role> {
        let result = self.update_inner(role_id, update).await;
        self.metrics.record("update_role", &result);
        result
    }

    async fn update_inner(&self, role_id: &str, update: RoleUpdate) -> Result<Role> {
        let current = self.get(role_id).await?;
        if let Some(name) = &update.display_name {
            if name.trim().is_empty() {
                return Err(RegistryError::bad_request("displayName must not be empty"));
            }
        }

        self.check_directory(&current.app_code, &current.module_code)
            .await?;

        let role = self.store.update_role(role_id, &update, Utc::now()).await?;
        info!(role_id, version = role.version, "role updated");
        Ok(role)
    }

    /// Delete a role and its inheritance edges
    pub async fn delete(&self, role_id: &str) -> Result<()> {
        self.hierarchy.delete_role(role_id).await
    }

    pub async fn get(&self, role_id: &str) -> Result<Role> {
        self.store
            .get_role(role_id)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("role '{}'", role_id)))
    }

    pub async fn list(&self, filter: &RoleFilter) -> Result<Vec<Role>> {
        Ok(self.store.list_roles(filter).await?)
    }

    async fn check_directory(&self, app_code: &str, module_code: &str) -> Result<()> {
        match self.directory.check(app_code, module_code).await? {
            DirectoryVerdict::Allowed | DirectoryVerdict::FailedOpen(_) => Ok(()),
            DirectoryVerdict::Rejected(reason) => Err(RegistryError::bad_request(reason)),
        }
    }
}

/// Use the id segment, rejecting a supplied value that disagrees with it
fn matching_segment(field: &str, supplied: Option<&str>, segment: &str) -> Result<String> {
    match supplied {
        Some(value) if value != segment => Err(RegistryError::bad_request(format!(
            "{} '{}' does not match role id segment '{}'",
            field, value, segment
        ))),
        _ => Ok(segment.to_string()),
    }
}

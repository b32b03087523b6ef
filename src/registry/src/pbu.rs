//! Permission bundle unit management

use crate::catalog::CatalogService;
use crate::error::{RegistryError, Result};
use crate::metrics::RegistryMetrics;
use crate::naming::validate_pbu_id;
use crate::store::RegistryStore;
use crate::types::{NewPbu, PbuFilter, PbuUpdate, PermissionBundleUnit};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// Creates, updates and removes PBUs
#[derive(Clone)]
pub struct PbuManager {
    store: Arc<dyn RegistryStore>,
    catalogs: CatalogService,
    metrics: RegistryMetrics,
}

impl PbuManager {
    pub fn new(store: Arc<dyn RegistryStore>, catalogs: CatalogService, metrics: RegistryMetrics) -> Self {
        Self {
            store,
            catalogs,
            metrics,
        }
    }

    /// Create a PBU
    ///
    /// # Errors
    ///
    /// - `BadRequest` if the id is malformed or the action/scope is not an
    ///   active catalog entry
    /// - `Conflict` if the id is taken
    #[instrument(skip(self, input), fields(pbu_id = %input.pbu_id))]
    pub async fn create(&self, input: NewPbu) -> Result<PermissionBundleUnit> {
        let result = self.create_inner(input).await;
        self.metrics.record("create_pbu", &result);
        result
    }

    async fn create_inner(&self, input: NewPbu) -> Result<PermissionBundleUnit> {
        validate_pbu_id(&input.pbu_id)?;
        if input.display_name.trim().is_empty() {
            return Err(RegistryError::bad_request("displayName must not be empty"));
        }
        if self.store.get_pbu(&input.pbu_id).await?.is_some() {
            return Err(RegistryError::conflict(format!(
                "PBU '{}' already exists",
                input.pbu_id
            )));
        }
        self.require_active_refs(&input.action_code, &input.scope_code)
            .await?;

        let now = Utc::now();
        let pbu = PermissionBundleUnit {
            pbu_id: input.pbu_id,
            display_name: input.display_name,
            api_endpoint: input.api_endpoint,
            action_code: input.action_code,
            scope_code: input.scope_code,
            is_active: input.is_active,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_pbu(pbu.clone()).await?;

        info!(
            pbu_id = %pbu.pbu_id,
            action = %pbu.action_code,
            scope = %pbu.scope_code,
            "PBU created"
        );
        Ok(pbu)
    }

    /// Update a PBU's mutable fields
    ///
    /// The effective action and scope are re-validated even when unchanged.
    #[instrument(skip(self, update))]
    pub async fn update(&self, pbu_id: &str, update: PbuUpdate) -> Result<PermissionBundleUnit> {
        let result = self.update_inner(pbu_id, update).await;
        self.metrics.record("update_pbu", &result);
        result
    }

    async fn update_inner(&self, pbu_id: &str, update: PbuUpdate) -> Result<PermissionBundleUnit> {
        let current = self.get(pbu_id).await?;

        if let Some(name) = &update.display_name {
            if name.trim().is_empty() {
                return Err(RegistryError::bad_request("displayName must not be empty"));
            }
        }
        let action = update.action_code.as_deref().unwrap_or(&current.action_code);
        let scope = update.scope_code.as_deref().unwrap_or(&current.scope_code);
        self.require_active_refs(action, scope).await?;

        let pbu = self.store.update_pbu(pbu_id, &update, Utc::now()).await?;
        info!(pbu_id, version = pbu.version, "PBU updated");
        Ok(pbu)
    }

    /// Remove a PBU; its associations are left in place
    #[instrument(skip(self))]
    pub async fn delete(&self, pbu_id: &str) -> Result<()> {
        let result = self
            .store
            .delete_pbu(pbu_id)
            .await
            .map_err(RegistryError::from);
        if result.is_ok() {
            info!(pbu_id, "PBU deleted");
        }
        self.metrics.record("delete_pbu", &result);
        result
    }

    pub async fn get(&self, pbu_id: &str) -> Result<PermissionBundleUnit> {
        self.store
            .get_pbu(pbu_id)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("PBU '{}'", pbu_id)))
    }

    pub async fn list(&self, filter: &PbuFilter) -> Result<Vec<PermissionBundleUnit>> {
        Ok(self.store.list_pbus(filter).await?)
    }

    async fn require_active_refs(&self, action_code: &str, scope_code: &str) -> Result<()> {
        if !self.catalogs.is_active_action(action_code).await? {
            return Err(RegistryError::bad_request(format!(
                "action '{}' is not an active action",
                action_code
            )));
        }
        if !self.catalogs.is_active_scope(scope_code).await? {
            return Err(RegistryError::bad_request(format!(
                "scope '{}' is not an active scope",
                scope_code
            )));
        }
        Ok(())
    }
}

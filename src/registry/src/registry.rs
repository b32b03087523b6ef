//! Registry facade wiring the services over one store

use crate::catalog::CatalogService;
use crate::config::RegistryConfig;
use crate::directory::{AllowAllDirectory, ApplicationDirectory, DirectoryGate};
use crate::error::Result;
use crate::hierarchy::HierarchyEngine;
use crate::links::{AssociationResolver, ConstraintSet, ConstraintView, OverrideResolver};
use crate::metrics::RegistryMetrics;
use crate::pbu::PbuManager;
use crate::role::RoleService;
use crate::store::{InMemoryRegistryStore, RegistryStore};
use crate::types::ConstraintKind;
use std::sync::Arc;

/// Permission registry
///
/// Cheap to clone; every service shares the same store and metrics.
#[derive(Clone)]
pub struct PermissionRegistry {
    store: Arc<dyn RegistryStore>,
    config: RegistryConfig,
    metrics: RegistryMetrics,
    catalogs: CatalogService,
    roles: RoleService,
    hierarchy: HierarchyEngine,
    pbus: PbuManager,
    associations: AssociationResolver,
    overrides: OverrideResolver,
}

impl PermissionRegistry {
    /// Create a registry with fresh metrics
    pub fn new(
        store: Arc<dyn RegistryStore>,
        directory: Arc<dyn ApplicationDirectory>,
        config: RegistryConfig,
    ) -> Result<Self> {
        Ok(Self::with_metrics(store, directory, config, RegistryMetrics::new()?))
    }

    pub fn with_metrics(
        store: Arc<dyn RegistryStore>,
        directory: Arc<dyn ApplicationDirectory>,
        config: RegistryConfig,
        metrics: RegistryMetrics,
    ) -> Self {
        let catalogs = CatalogService::new(store.clone(), metrics.clone());
        let hierarchy = HierarchyEngine::new(store.clone(), &config, metrics.clone());
        let gate = DirectoryGate::new(directory, config.directory_failure_policy, metrics.clone());

        Self {
            roles: RoleService::new(store.clone(), gate, hierarchy.clone(), metrics.clone()),
            pbus: PbuManager::new(store.clone(), catalogs.clone(), metrics.clone()),
            associations: AssociationResolver::new(store.clone(), metrics.clone()),
            overrides: OverrideResolver::new(store.clone(), metrics.clone()),
            catalogs,
            hierarchy,
            store,
            config,
            metrics,
        }
    }

    /// In-memory registry with no application directory
    pub fn in_memory() -> Result<Self> {
        Self::new(
            Arc::new(InMemoryRegistryStore::new()),
            Arc::new(AllowAllDirectory),
            RegistryConfig::default(),
        )
    }

    pub fn catalogs(&self) -> &CatalogService {
        &self.catalogs
    }

    pub fn roles(&self) -> &RoleService {
        &self.roles
    }

    pub fn hierarchy(&self) -> &HierarchyEngine {
        &self.hierarchy
    }

    pub fn pbus(&self) -> &PbuManager {
        &self.pbus
    }

    pub fn associations(&self) -> &AssociationResolver {
        &self.associations
    }

    pub fn overrides(&self) -> &OverrideResolver {
        &self.overrides
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// PBU associations next to role overrides for every kind
    ///
    /// Both the role and the PBU must exist.
    pub async fn constraint_view(&self, role_id: &str, pbu_id: &str) -> Result<ConstraintView> {
        self.roles.get(role_id).await?;
        self.pbus.get(pbu_id).await?;

        let mut constraints = Vec::with_capacity(ConstraintKind::ALL.len());
        for kind in ConstraintKind::ALL {
            constraints.push(ConstraintSet {
                kind,
                pbu_associations: self.associations.list(kind, pbu_id).await?,
                role_overrides: self.overrides.list(kind, role_id).await?,
            });
        }

        Ok(ConstraintView {
            role_id: role_id.to_string(),
            pbu_id: pbu_id.to_string(),
            constraints,
        })
    }
}

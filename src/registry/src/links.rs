//! PBU associations and role overrides
//!
//! Both are sets of `(owner, target)` pairs per [`ConstraintKind`]. A single
//! [`LinkResolver`] implements the contract for either owner side; the
//! [`AssociationResolver`] and [`OverrideResolver`] wrappers fix the side.

use crate::error::{RegistryError, Result};
use crate::metrics::RegistryMetrics;
use crate::store::{CatalogKind, RegistryStore};
use crate::types::{ConstraintKind, LinkKey, LinkOwner};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Link operations for one owner side
#[derive(Clone)]
pub struct LinkResolver {
    store: Arc<dyn RegistryStore>,
    owner: LinkOwner,
    metrics: RegistryMetrics,
}

impl LinkResolver {
    pub fn new(store: Arc<dyn RegistryStore>, owner: LinkOwner, metrics: RegistryMetrics) -> Self {
        Self {
            store,
            owner,
            metrics,
        }
    }

    pub fn owner(&self) -> LinkOwner {
        self.owner
    }

    /// Link `owner_id` to `target_id`
    ///
    /// `NotFound` if either side is missing, `Conflict` if already linked.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn link(&self, kind: ConstraintKind, owner_id: &str, target_id: &str) -> Result<()> {
        let result = self.link_inner(kind, owner_id, target_id).await;
        self.metrics.record(&self.operation("link", kind), &result);
        result
    }

    async fn link_inner(&self, kind: ConstraintKind, owner_id: &str, target_id: &str) -> Result<()> {
        if !self.owner_exists(owner_id).await? {
            return Err(RegistryError::not_found(format!(
                "{} '{}'",
                self.owner_label(),
                owner_id
            )));
        }

        let catalog = CatalogKind::for_constraint(kind);
        if self.store.get_catalog(catalog, target_id).await?.is_none() {
            return Err(RegistryError::not_found(format!("{} '{}'", catalog, target_id)));
        }

        let key = LinkKey::new(self.owner, kind, owner_id, target_id);
        self.store.insert_link(&key).await?;
        info!(link = %key, "link created");
        Ok(())
    }

    /// Targets linked to `owner_id`; empty when the owner does not exist
    pub async fn list(&self, kind: ConstraintKind, owner_id: &str) -> Result<Vec<String>> {
        Ok(self.store.list_links(self.owner, kind, owner_id).await?)
    }

    /// Remove a link; `NotFound` if the pair is absent
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn unlink(&self, kind: ConstraintKind, owner_id: &str, target_id: &str) -> Result<()> {
        let key = LinkKey::new(self.owner, kind, owner_id, target_id);
        let result = self
            .store
            .remove_link(&key)
            .await
            .map_err(RegistryError::from);
        if result.is_ok() {
            info!(link = %key, "link removed");
        }
        self.metrics.record(&self.operation("unlink", kind), &result);
        result
    }

    async fn owner_exists(&self, owner_id: &str) -> Result<bool> {
        let exists = match self.owner {
            LinkOwner::Pbu => self.store.get_pbu(owner_id).await?.is_some(),
            LinkOwner::Role => self.store.get_role(owner_id).await?.is_some(),
        };
        Ok(exists)
    }

    fn owner_label(&self) -> &'static str {
        match self.owner {
            LinkOwner::Pbu => "PBU",
            LinkOwner::Role => "role",
        }
    }

    fn operation(&self, verb: &str, kind: ConstraintKind) -> String {
        format!("{}_{}_{}", verb, self.owner, kind)
    }
}

/// PBU-level constraint and behavior associations
#[derive(Clone)]
pub struct AssociationResolver {
    links: LinkResolver,
}

impl AssociationResolver {
    pub fn new(store: Arc<dyn RegistryStore>, metrics: RegistryMetrics) -> Self {
        Self {
            links: LinkResolver::new(store, LinkOwner::Pbu, metrics),
        }
    }

    pub async fn associate(&self, kind: ConstraintKind, pbu_id: &str, target_id: &str) -> Result<()> {
        self.links.link(kind, pbu_id, target_id).await
    }

    pub async fn list(&self, kind: ConstraintKind, pbu_id: &str) -> Result<Vec<String>> {
        self.links.list(kind, pbu_id).await
    }

    pub async fn remove(&self, kind: ConstraintKind, pbu_id: &str, target_id: &str) -> Result<()> {
        self.links.unlink(kind, pbu_id, target_id).await
    }
}

/// Role-level constraint and behavior overrides
#[derive(Clone)]
pub struct OverrideResolver {
    links: LinkResolver,
}

impl OverrideResolver {
    pub fn new(store: Arc<dyn RegistryStore>, metrics: RegistryMetrics) -> Self {
        Self {
            links: LinkResolver::new(store, LinkOwner::Role, metrics),
        }
    }

    pub async fn add_override(&self, kind: ConstraintKind, role_id: &str, target_id: &str) -> Result<()> {
        self.links.link(kind, role_id, target_id).await
    }

    pub async fn list(&self, kind: ConstraintKind, role_id: &str) -> Result<Vec<String>> {
        self.links.list(kind, role_id).await
    }

    pub async fn remove(&self, kind: ConstraintKind, role_id: &str, target_id: &str) -> Result<()> {
        self.links.unlink(kind, role_id, target_id).await
    }
}

/// PBU associations and role overrides of one kind, uncombined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSet {
    pub kind: ConstraintKind,
    pub pbu_associations: Vec<String>,
    pub role_overrides: Vec<String>,
}

/// Everything attached to a (role, PBU) pair, per kind
///
/// How overrides combine with associations is left to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintView {
    pub role_id: String,
    pub pbu_id: String,
    pub constraints: Vec<ConstraintSet>,
}

impl ConstraintView {
    pub fn for_kind(&self, kind: ConstraintKind) -> Option<&ConstraintSet> {
        self.constraints.iter().find(|s| s.kind == kind)
    }
}

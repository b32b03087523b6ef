//! Catalog stores
//!
//! Actions, scopes, constraints and behaviors are flat keyed records. The
//! store keeps them as JSON documents per [`CatalogKind`]; this module gives
//! them a typed surface and validates them on the way in.

use crate::error::{RegistryError, Result};
use crate::metrics::RegistryMetrics;
use crate::store::{CatalogKind, RegistryStore};
use crate::types::{Action, ContextualBehavior, FieldConstraint, GeneralConstraint, Scope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// A record stored in one of the catalogs
pub trait CatalogRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: CatalogKind;

    fn key(&self) -> &str;

    fn is_active(&self) -> bool;

    /// Check the record before it is written
    fn validate(&self) -> Result<()> {
        require_non_empty("key", self.key())
    }
}

impl CatalogRecord for Action {
    const KIND: CatalogKind = CatalogKind::Action;

    fn key(&self) -> &str {
        &self.code
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn validate(&self) -> Result<()> {
        require_code(&self.code)?;
        require_non_empty("displayName", &self.display_name)
    }
}

impl CatalogRecord for Scope {
    const KIND: CatalogKind = CatalogKind::Scope;

    fn key(&self) -> &str {
        &self.code
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn validate(&self) -> Result<()> {
        require_code(&self.code)?;
        require_non_empty("displayName", &self.display_name)
    }
}

impl CatalogRecord for GeneralConstraint {
    const KIND: CatalogKind = CatalogKind::GeneralConstraint;

    fn key(&self) -> &str {
        &self.constraint_id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("constraintId", &self.constraint_id)?;
        require_json("rule", &self.rule)
    }
}

impl CatalogRecord for FieldConstraint {
    const KIND: CatalogKind = CatalogKind::FieldConstraint;

    fn key(&self) -> &str {
        &self.constraint_id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("constraintId", &self.constraint_id)?;
        require_non_empty("fieldPath", &self.field_path)?;
        require_json("rule", &self.rule)
    }
}

impl CatalogRecord for ContextualBehavior {
    const KIND: CatalogKind = CatalogKind::ContextualBehavior;

    fn key(&self) -> &str {
        &self.behavior_id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("behaviorId", &self.behavior_id)?;
        require_json("condition", &self.condition)?;
        match &self.effect {
            Some(effect) => require_json("effect", effect),
            None => Ok(()),
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::bad_request(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Action and scope codes are upper-case identifiers, e.g. `READ`, `OWN`
fn require_code(code: &str) -> Result<()> {
    require_non_empty("code", code)?;
    let valid = code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(RegistryError::bad_request(format!(
            "invalid code '{}': expected upper-case letters, digits and underscores",
            code
        )));
    }
    Ok(())
}

/// Payloads are opaque but must be well-formed JSON
fn require_json(field: &str, payload: &str) -> Result<()> {
    serde_json::from_str::<serde_json::Value>(payload)
        .map(|_| ())
        .map_err(|e| RegistryError::bad_request(format!("{} is not valid JSON: {}", field, e)))
}

/// Typed access to the catalogs
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn RegistryStore>,
    metrics: RegistryMetrics,
}

impl CatalogService {
    pub fn new(store: Arc<dyn RegistryStore>, metrics: RegistryMetrics) -> Self {
        Self { store, metrics }
    }

    /// Create a record; `Conflict` if the key is taken
    #[instrument(skip(self, record), fields(kind = %T::KIND, key = %record.key()))]
    pub async fn create<T: CatalogRecord>(&self, record: T) -> Result<T> {
        let result = self.create_inner(record).await;
        self.metrics.record(&format!("create_{}", T::KIND), &result);
        result
    }

    async fn create_inner<T: CatalogRecord>(&self, record: T) -> Result<T> {
        record.validate()?;
        let value = serde_json::to_value(&record)?;
        self.store.insert_catalog(T::KIND, record.key(), value).await?;
        info!(kind = %T::KIND, key = %record.key(), "catalog entry created");
        Ok(record)
    }

    /// Fetch a record; `NotFound` if absent
    pub async fn get<T: CatalogRecord>(&self, key: &str) -> Result<T> {
        self.find(key)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("{} '{}'", T::KIND, key)))
    }

    pub async fn find<T: CatalogRecord>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get_catalog(T::KIND, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn list<T: CatalogRecord>(&self) -> Result<Vec<T>> {
        self.store
            .list_catalog(T::KIND)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(RegistryError::from))
            .collect()
    }

    /// Replace a record; the key in the path wins over the body
    #[instrument(skip(self, record), fields(kind = %T::KIND))]
    pub async fn update<T: CatalogRecord>(&self, key: &str, record: T) -> Result<T> {
        let result = self.update_inner(key, record).await;
        self.metrics.record(&format!("update_{}", T::KIND), &result);
        result
    }

    async fn update_inner<T: CatalogRecord>(&self, key: &str, record: T) -> Result<T> {
        if record.key() != key {
            return Err(RegistryError::bad_request(format!(
                "{} key '{}' does not match '{}'",
                T::KIND,
                record.key(),
                key
            )));
        }
        record.validate()?;
        let value = serde_json::to_value(&record)?;
        self.store.update_catalog(T::KIND, key, value).await?;
        info!(kind = %T::KIND, key, "catalog entry updated");
        Ok(record)
    }

    /// Delete a record; links referencing it are left in place
    #[instrument(skip(self))]
    pub async fn delete(&self, kind: CatalogKind, key: &str) -> Result<()> {
        let result = self
            .store
            .delete_catalog(kind, key)
            .await
            .map_err(RegistryError::from);
        if result.is_ok() {
            info!(%kind, key, "catalog entry deleted");
        }
        self.metrics.record(&format!("delete_{}", kind), &result);
        result
    }

    /// Whether a record exists, regardless of its active flag
    pub async fn exists(&self, kind: CatalogKind, key: &str) -> Result<bool> {
        Ok(self.store.get_catalog(kind, key).await?.is_some())
    }

    pub async fn is_active_action(&self, code: &str) -> Result<bool> {
        Ok(self
            .find::<Action>(code)
            .await?
            .map_or(false, |a| a.is_active()))
    }

    pub async fn is_active_scope(&self, code: &str) -> Result<bool> {
        Ok(self
            .find::<Scope>(code)
            .await?
            .map_or(false, |s| s.is_active()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRegistryStore;

    fn service() -> CatalogService {
        CatalogService::new(
            Arc::new(InMemoryRegistryStore::new()),
            RegistryMetrics::new().unwrap(),
        )
    }

    fn action(code: &str, active: bool) -> Action {
        Action {
            code: code.to_string(),
            display_name: code.to_lowercase(),
            description: String::new(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_action_lifecycle() {
        let catalogs = service();

        catalogs.create(action("READ", true)).await.unwrap();
        assert!(catalogs.is_active_action("READ").await.unwrap());

        let dup = catalogs.create(action("READ", true)).await;
        assert!(matches!(dup, Err(RegistryError::Conflict(_))));

        catalogs.update("READ", action("READ", false)).await.unwrap();
        assert!(!catalogs.is_active_action("READ").await.unwrap());
        assert!(catalogs.exists(CatalogKind::Action, "READ").await.unwrap());

        catalogs.delete(CatalogKind::Action, "READ").await.unwrap();
        let missing = catalogs.get::<Action>("READ").await;
        assert!(matches!(missing, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_scope_is_inactive() {
        let catalogs = service();
        assert!(!catalogs.is_active_scope("OWN").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_code_rejected() {
        let catalogs = service();
        let err = catalogs.create(action("read", true)).await.unwrap_err();
        assert!(matches!(err, RegistryError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_malformed_rule_rejected() {
        let catalogs = service();
        let constraint = GeneralConstraint {
            constraint_id: "GC_OWN_DEPT".to_string(),
            display_name: "Own department".to_string(),
            description: String::new(),
            rule: "{\"field\": \"dept\"".to_string(),
            is_active: true,
        };

        let err = catalogs.create(constraint).await.unwrap_err();
        assert!(matches!(err, RegistryError::BadRequest(_)));
        assert!(catalogs.list::<GeneralConstraint>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_behavior_effect_checked() {
        let catalogs = service();
        let mut behavior = ContextualBehavior {
            behavior_id: "CB_BUSINESS_HOURS".to_string(),
            display_name: "Business hours".to_string(),
            description: String::new(),
            condition: r#"{"hours": [9, 17]}"#.to_string(),
            effect: Some("deny".to_string()),
            is_active: true,
        };

        assert!(catalogs.create(behavior.clone()).await.is_err());

        behavior.effect = Some(r#"{"effect": "deny"}"#.to_string());
        catalogs.create(behavior).await.unwrap();
        assert_eq!(catalogs.list::<ContextualBehavior>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_key_mismatch() {
        let catalogs = service();
        catalogs.create(action("READ", true)).await.unwrap();

        let err = catalogs.update("READ", action("WRITE", true)).await.unwrap_err();
        assert!(matches!(err, RegistryError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let catalogs = service();
        let err = catalogs.update("READ", action("READ", true)).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }
}

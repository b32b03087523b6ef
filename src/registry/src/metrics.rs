//! Prometheus metrics for registry mutations
//!
//! Metrics are registered against a registry owned by the caller so that
//! several registries (e.g. one per test) never collide.

use crate::error::{RegistryError, Result};
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry metrics handle; cheap to clone
#[derive(Clone)]
pub struct RegistryMetrics {
    registry: Registry,

    /// Mutations by operation and outcome code
    pub mutations_total: IntCounterVec,

    /// Graph commits retried after losing an optimistic race
    pub graph_commit_retries_total: IntCounter,

    /// Directory lookups by outcome (active, inactive, error)
    pub directory_lookups_total: IntCounterVec,

    /// Role writes that proceeded because the directory was unreachable
    pub directory_fail_open_total: IntCounter,
}

impl RegistryMetrics {
    /// Create metrics registered on a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create metrics registered on the given registry
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let mutations_total = register_int_counter_vec_with_registry!(
            Opts::new("permreg_mutations_total", "Registry mutations by operation and outcome"),
            &["operation", "outcome"],
            registry
        )
        .map_err(metrics_error)?;

        let graph_commit_retries_total = register_int_counter_with_registry!(
            Opts::new(
                "permreg_graph_commit_retries_total",
                "Inheritance graph commits retried after a concurrent change"
            ),
            registry
        )
        .map_err(metrics_error)?;

        let directory_lookups_total = register_int_counter_vec_with_registry!(
            Opts::new(
                "permreg_directory_lookups_total",
                "Application directory lookups by outcome"
            ),
            &["outcome"],
            registry
        )
        .map_err(metrics_error)?;

        let directory_fail_open_total = register_int_counter_with_registry!(
            Opts::new(
                "permreg_directory_fail_open_total",
                "Role writes allowed while the application directory was unreachable"
            ),
            registry
        )
        .map_err(metrics_error)?;

        Ok(Self {
            registry,
            mutations_total,
            graph_commit_retries_total,
            directory_lookups_total,
            directory_fail_open_total,
        })
    }

    /// Count a mutation outcome
    pub fn record<T>(&self, operation: &str, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        self.mutations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| RegistryError::internal(e.to_string()))
    }
}

impl std::fmt::Debug for RegistryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryMetrics").finish_non_exhaustive()
    }
}

fn metrics_error(err: prometheus::Error) -> RegistryError {
    RegistryError::internal(format!("metrics: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_encode() {
        let metrics = RegistryMetrics::new().unwrap();
        metrics.record::<()>("create_edge", &Ok(()));
        metrics.record::<()>("create_edge", &Err(RegistryError::conflict("dup")));

        assert_eq!(
            metrics
                .mutations_total
                .with_label_values(&["create_edge", "CONFLICT"])
                .get(),
            1
        );

        let text = metrics.encode().unwrap();
        assert!(text.contains("permreg_mutations_total"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        RegistryMetrics::with_registry(registry.clone()).unwrap();
        assert!(RegistryMetrics::with_registry(registry).is_err());
    }
}

//! Registry configuration

use crate::directory::DirectoryFailurePolicy;

/// Hard ceiling on inheritance depth; not configurable
pub const MAX_DEPTH: u32 = 3;

/// Default number of attempts for an optimistic graph commit
pub const DEFAULT_GRAPH_MAX_RETRIES: u32 = 5;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Attempts for a graph mutation before giving up with `Conflict`
    pub graph_max_retries: u32,

    /// What to do when the application directory cannot be reached
    pub directory_failure_policy: DirectoryFailurePolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            graph_max_retries: DEFAULT_GRAPH_MAX_RETRIES,
            directory_failure_policy: DirectoryFailurePolicy::FailOpen,
        }
    }
}

impl RegistryConfig {
    pub fn with_graph_max_retries(mut self, retries: u32) -> Self {
        self.graph_max_retries = retries.max(1);
        self
    }

    pub fn with_directory_failure_policy(mut self, policy: DirectoryFailurePolicy) -> Self {
        self.directory_failure_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.graph_max_retries, 5);
        assert_eq!(config.directory_failure_policy, DirectoryFailurePolicy::FailOpen);
    }

    #[test]
    fn test_retries_floor_at_one() {
        let config = RegistryConfig::default().with_graph_max_retries(0);
        assert_eq!(config.graph_max_retries, 1);
    }
}

use permreg_registry::{PermissionRegistry, RegistryError};
use std::time::Instant;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: PermissionRegistry,

    /// Server start time for uptime calculation
    pub start_time: Instant,

    pub version: String,
}

impl AppState {
    pub fn new(registry: PermissionRegistry) -> Self {
        Self {
            registry,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// State over a fresh in-memory registry
    pub fn in_memory() -> Result<Self, RegistryError> {
        Ok(Self::new(PermissionRegistry::in_memory()?))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

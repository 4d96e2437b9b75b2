//! Audit store configuration, loaded from the `[audit]` section of the
//! layered config or `ACTON_AUDIT_*` environment overrides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Days to retain audit records before compaction (default 90).
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// How often the retention sweep runs, in hours (default 24).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_hours: u32,

    /// Capacity of the in-process signal bus channel feeding the store.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            cleanup_interval_hours: default_cleanup_interval(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

fn default_cleanup_interval() -> u32 {
    24
}

fn default_bus_capacity() -> usize {
    1024
}

//! Per-database settings.

use serde::Deserialize;
use sqlconduit_pool::{AutoCommit, PoolConfig};

/// Configuration for a [`Database`](crate::Database).
///
/// Deserializable from any serde format; missing fields take their
/// defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Logical name, used when registering the database by name
    pub name: Option<String>,
    /// Log every statement at `debug` with the connection serial
    pub debug: bool,
    /// Also log query results at `trace`
    pub debug_output: bool,
    /// Keep hydrated instances in per-table caches
    pub cache: bool,
    /// Policy applied when releasing a connection outside a transaction
    pub auto_commit: AutoCommit,
    pub pool: PoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: None,
            debug: false,
            debug_output: false,
            cache: true,
            auto_commit: AutoCommit::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn debug_output(mut self, on: bool) -> Self {
        self.debug_output = on;
        self
    }

    pub fn cache(mut self, on: bool) -> Self {
        self.cache = on;
        self
    }

    pub fn auto_commit(mut self, mode: AutoCommit) -> Self {
        self.auto_commit = mode;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

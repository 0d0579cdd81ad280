//! The SQLite dialect and its `sqlite:` URI factory.

use crate::config::SqliteConfig;
use crate::connection::SqliteConnection;
use sqlconduit_core::{
    ColumnDef, Dialect, DriverConnection, EntityDescriptor, ParsedUri, Result, Value,
};
use sqlconduit_session::{ConnectionFactory, ConnectionRegistry, Database, DatabaseConfig};
use std::sync::Arc;

/// URI schemes served by [`SqliteFactory`].
pub const SCHEMES: &[&str] = &["sqlite"];

/// SQLite SQL fragments plus the settings new connections are opened with.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect {
    config: SqliteConfig,
}

impl SqliteDialect {
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn connect(&self) -> Result<Box<dyn DriverConnection>> {
        Ok(Box::new(SqliteConnection::open(&self.config)?))
    }

    fn limit_offset(&self, start: u64, end: Option<u64>) -> Result<String> {
        Ok(match (start, end) {
            (0, Some(end)) => format!("LIMIT {end}"),
            (start, None) => format!("LIMIT -1 OFFSET {start}"),
            (start, Some(end)) => format!("LIMIT {} OFFSET {start}", end.saturating_sub(start)),
        })
    }

    fn create_column(&self, column: &ColumnDef) -> Result<String> {
        let mut sql = format!("{} {}", column.db_name, column.sql_type);
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        Ok(sql)
    }

    fn create_id_column(&self, entity: &EntityDescriptor) -> Result<String> {
        Ok(format!("{} INTEGER PRIMARY KEY", entity.id_name))
    }

    fn join_sql_type(&self) -> Result<String> {
        Ok("INT NOT NULL".to_string())
    }

    fn table_exists(&self, conn: &mut dyn DriverConnection, table: &str) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = {}",
            self.sql_literal(&Value::from(table))
        );
        Ok(conn.query_one(&sql)?.is_some())
    }
}

/// Builds a [`Database`] for each `sqlite:` URI.
#[derive(Debug, Clone, Default)]
pub struct SqliteFactory {
    database: DatabaseConfig,
    busy_timeout_ms: Option<u32>,
}

impl SqliteFactory {
    /// A factory giving every database it builds the settings in `database`.
    pub fn new(database: DatabaseConfig) -> Self {
        Self {
            database,
            busy_timeout_ms: None,
        }
    }

    /// Override the busy timeout of every connection opened.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }

    /// Register this factory for [`SCHEMES`].
    pub fn register(self, registry: &ConnectionRegistry) -> Result<()> {
        registry.register(SCHEMES.iter().copied(), Arc::new(self))
    }
}

impl ConnectionFactory for SqliteFactory {
    fn connection_from_uri(&self, uri: &ParsedUri) -> Result<Arc<Database>> {
        let mut config = SqliteConfig::from_uri(uri)?;
        if let Some(ms) = self.busy_timeout_ms {
            config = config.busy_timeout(ms);
        }
        tracing::debug!(uri = %uri, path = %config.path, "Building SQLite database");
        let dialect = Arc::new(SqliteDialect::new(config));
        let db = Database::new(dialect, self.database.clone()).with_uri(uri.clone());
        Ok(Arc::new(db))
    }
}

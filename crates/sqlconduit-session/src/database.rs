//! The shared core behind direct queries and transactions.

use crate::config::DatabaseConfig;
use crate::queryable::Queryable;
use crate::stream::ResultCursorStream;
use crate::transaction::Transaction;
use sqlconduit_core::{CacheSet, Dialect, Hydrate, ParsedUri, Result};
use sqlconduit_pool::{AutoCommit, ConnectionPool, PhysicalConnection, PoolStats};
use sqlconduit_query::{SelectSpec, build_select};
use std::fmt;
use std::sync::Arc;

/// A logical database: one dialect, one connection pool, and one
/// process-wide instance cache.
///
/// Statements issued directly on a `Database` borrow a pooled connection
/// for the duration of the call and release it with the configured
/// auto-commit policy. Use [`transaction`](Database::transaction) to pin
/// one connection across several statements.
pub struct Database {
    dialect: Arc<dyn Dialect>,
    pool: ConnectionPool,
    cache: CacheSet,
    config: DatabaseConfig,
    uri: Option<ParsedUri>,
}

impl Database {
    pub fn new(dialect: Arc<dyn Dialect>, config: DatabaseConfig) -> Self {
        let pool = ConnectionPool::new(Arc::clone(&dialect), config.pool.clone());
        tracing::info!(
            dialect = dialect.name(),
            name = config.name.as_deref().unwrap_or(""),
            auto_commit = %config.auto_commit,
            "Database created"
        );
        Self {
            cache: CacheSet::new(config.cache),
            dialect,
            pool,
            config,
            uri: None,
        }
    }

    /// Remember the URI this database was opened from.
    pub fn with_uri(mut self, uri: ParsedUri) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The URI this database was opened from, re-rendered.
    pub fn uri(&self) -> Option<String> {
        self.uri.as_ref().map(ToString::to_string)
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Begin a transaction pinned to one pooled connection.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    /// Log a statement when `debug` is on.
    pub(crate) fn log_statement(&self, conn: u64, kind: &str, sql: &str) {
        if self.config.debug {
            tracing::debug!(conn, kind, sql, "Statement");
        }
    }

    /// Log a statement's result when `debug_output` is on.
    pub(crate) fn log_result(&self, conn: u64, kind: &str, result: &dyn fmt::Debug) {
        if self.config.debug_output {
            tracing::trace!(conn, kind, result = ?result, "Result");
        }
    }

    pub(crate) fn log_release(&self, conn: u64) {
        if !self.dialect.supports_transactions() {
            return;
        }
        let (kind, sql) = match self.config.auto_commit {
            AutoCommit::Commit => ("auto", "COMMIT"),
            AutoCommit::Rollback => ("auto", "ROLLBACK"),
            AutoCommit::Exception => ("auto/exception", "ROLLBACK"),
        };
        self.log_statement(conn, kind, sql);
    }
}

impl Queryable for Database {
    fn database(&self) -> &Database {
        self
    }

    fn cache(&self) -> &CacheSet {
        &self.cache
    }

    fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PhysicalConnection) -> Result<T>,
    {
        self.pool
            .run_with_connection(self.config.auto_commit, |conn| {
                let outcome = f(conn);
                self.log_release(conn.serial());
                outcome
            })
    }

    fn iter_select<M: Hydrate>(&self, spec: &SelectSpec<'_>) -> Result<ResultCursorStream<'_, M>> {
        let sql = build_select(spec, self.dialect())?;
        let mut conn = self.pool.get()?;
        self.log_statement(conn.serial(), "Select", &sql);
        let cursor = conn.open_cursor(&sql)?;
        Ok(ResultCursorStream::pooled(
            self,
            &self.cache,
            cursor,
            conn.detach(),
            spec.options.lazy_columns,
        ))
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect.name())
            .field("name", &self.config.name)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

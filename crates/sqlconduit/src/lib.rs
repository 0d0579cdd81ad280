//! SQLConduit - pooled, transaction-aware database connections with
//! cache-consistent rollback.
//!
//! SQLConduit sits between an object-mapping layer and a database client:
//!
//! - A registry resolving `scheme://...` URIs and logical names to databases
//! - A growing connection pool with a configurable auto-commit policy
//! - Transaction scopes pinned to one connection, expiring their cached
//!   instances on rollback
//! - Lazy result streams that return their connection when done or dropped
//! - Dialect-neutral SELECT assembly with per-backend LIMIT/OFFSET syntax
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlconduit::prelude::*;
//!
//! let registry = sqlconduit::default_registry(DatabaseConfig::new())?;
//! let db = registry.resolve("sqlite:/:memory:")?;
//!
//! db.create_table(Person::descriptor())?;
//! let id = db.query_insert_id("person", "id", None, &["name"], &[Value::from("Ann")])?;
//!
//! let tx = db.transaction()?;
//! let ann: Arc<Person> = tx.get(id)?.expect("inserted above");
//! tx.rollback()?; // `ann` is now expired
//!
//! let spec = SelectSpec::new(Person::descriptor())
//!     .options(SelectOptions::new().order_by(["-name"]).slice(None, Some(10))?);
//! for person in db.iter_select::<Person>(&spec)? {
//!     println!("{:?}", person?);
//! }
//! ```

pub use sqlconduit_core::{
    Cached, CacheSet, ColumnDef, ConfigErrorKind, Dialect, DriverConnection, DriverErrorKind,
    EntityDescriptor, Error, Hydrate, ParsedUri, PrimaryKey, Result, Row, RowCursor, SubCache,
    Value, ansi_literal, error,
};
pub use sqlconduit_pool::{
    AutoCommit, ConnectionPool, PhysicalConnection, PoolConfig, PoolMode, PoolStats,
    PooledConnection,
};
pub use sqlconduit_query::{
    All, Clause, Compare, CompareOp, JoinTable, OrderTerm, SelectOptions, SelectSpec, SqlConstant,
    SqlExpr, all, build_count, build_select, builder,
};
pub use sqlconduit_session::{
    ConnectionFactory, ConnectionRegistry, Database, DatabaseConfig, Queryable,
    ResultCursorStream, StreamState, Transaction, TxState,
};

/// The SQLite dialect.
pub mod sqlite {
    pub use sqlconduit_sqlite::*;
}

/// The MySQL dialect.
pub mod mysql {
    pub use sqlconduit_mysql::*;
}

/// A registry with the bundled dialects registered.
///
/// `sqlite:` URIs work out of the box. `mysql:` URIs resolve to an
/// `Unsupported` error until a registry is built with a
/// [`MysqlFactory`](mysql::MysqlFactory) that carries a connector.
pub fn default_registry(config: DatabaseConfig) -> Result<ConnectionRegistry> {
    let registry = ConnectionRegistry::new();
    sqlite::SqliteFactory::new(config.clone()).register(&registry)?;
    mysql::MysqlFactory::new(config).register(&registry)?;
    tracing::debug!("Default registry ready");
    Ok(registry)
}

/// Everything needed for everyday use.
pub mod prelude {
    pub use crate::{
        AutoCommit, Cached, ColumnDef, ConnectionRegistry, Database, DatabaseConfig,
        EntityDescriptor, Error, Hydrate, JoinTable, OrderTerm, PoolConfig, PoolMode, Queryable,
        Result, Row, SelectOptions, SelectSpec, StreamState, Transaction, TxState, Value,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_bundled_schemes() {
        let registry = default_registry(DatabaseConfig::new()).unwrap();
        let db = registry.resolve("sqlite:/:memory:").unwrap();
        assert_eq!(db.dialect().name(), "sqlite");

        let err = registry.resolve("mysql://bob@dbhost/mydb").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::Unsupported));

        let err = registry.resolve("postgres://dbhost/mydb").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownScheme));
    }
}

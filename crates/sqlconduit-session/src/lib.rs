//! Databases, transactions and identifier resolution for SQLConduit.
//!
//! `sqlconduit-session` is the layer applications talk to:
//!
//! - [`Database`]: a dialect, a demand-grown connection pool and a
//!   process-wide instance cache.
//! - [`Queryable`]: the statement and select surface shared by
//!   `Database` and [`Transaction`].
//! - [`Transaction`]: one pinned connection, a private cache, and
//!   rollback that expires everything hydrated under it.
//! - [`ResultCursorStream`]: lazy, row-at-a-time hydration of a select.
//! - [`ConnectionRegistry`]: URI scheme factories, named instances and
//!   memoized resolution.
//!
//! # Example
//!
//! ```ignore
//! let registry = ConnectionRegistry::new();
//! registry.register(["sqlite"], Arc::new(SqliteFactory::default()))?;
//! let db = registry.resolve("sqlite:/:memory:")?;
//!
//! let tx = db.transaction()?;
//! tx.query("INSERT INTO person (name) VALUES ('Ann')")?;
//! for person in tx.iter_select::<Person>(&SelectSpec::new(Person::descriptor()))? {
//!     println!("{}", person?.name());
//! }
//! tx.commit()?;
//! ```

pub mod config;
pub mod database;
pub mod queryable;
pub mod registry;
pub mod stream;
pub mod transaction;

pub use config::DatabaseConfig;
pub use database::Database;
pub use queryable::Queryable;
pub use registry::{ConnectionFactory, ConnectionRegistry};
pub use stream::{ResultCursorStream, StreamState};
pub use transaction::{Transaction, TxState};

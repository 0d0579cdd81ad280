//! SQLite dialect for SQLConduit.
//!
//! Connections go through `libsqlite3-sys` with a bundled SQLite, so no
//! system library is needed.
//!
//! - [`SqliteConnection`] / [`SqliteCursor`]: the driver handle and its cursors
//! - [`SqliteDialect`]: LIMIT/OFFSET syntax, column DDL, `sqlite_master` lookups
//! - [`SqliteFactory`]: builds databases from `sqlite:` URIs
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlconduit_session::{ConnectionRegistry, Queryable};
//! use sqlconduit_sqlite::SqliteFactory;
//!
//! let registry = ConnectionRegistry::new();
//! SqliteFactory::default().register(&registry)?;
//! let db = registry.resolve("sqlite:///tmp/app.db")?;
//! db.query("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)")?;
//! ```
//!
//! # Thread Safety
//!
//! Handles are opened in serialized mode and guarded by a mutex shared
//! with every cursor they open, so a connection and its cursors may move
//! between threads.

// FFI bindings require unsafe code.
#![allow(unsafe_code)]

pub mod config;
pub mod connection;
pub mod dialect;
pub mod types;

pub use config::{OpenFlags, SqliteConfig};
pub use connection::{SqliteConnection, SqliteCursor};
pub use dialect::{SCHEMES, SqliteDialect, SqliteFactory};

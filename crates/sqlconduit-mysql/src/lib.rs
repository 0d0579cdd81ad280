//! MySQL dialect for SQLConduit.
//!
//! Provides the MySQL flavor of LIMIT/OFFSET, column DDL, literal quoting
//! and `SHOW TABLES` lookups. The native client is pluggable: hand a
//! [`MysqlConnector`] to [`MysqlDialect::connector`] or
//! [`MysqlFactory::connector`]. Without one, `connect` fails with
//! `Error::Unimplemented`.

pub mod config;
pub mod dialect;

pub use config::MysqlConfig;
pub use dialect::{MysqlConnector, MysqlDialect, MysqlFactory, SCHEMES};

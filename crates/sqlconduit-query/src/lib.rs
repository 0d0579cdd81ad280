//! SQL assembly for SQLConduit.
//!
//! `sqlconduit-query` turns declarative read descriptions into SQL text and
//! provides the small DML/DDL statement builders used by the session layer.
//! It is pure: nothing here touches a connection. Backend-specific fragments
//! (LIMIT/OFFSET syntax, column DDL, literal quoting) come from the
//! [`Dialect`](sqlconduit_core::Dialect) passed in.
//!
//! - [`SelectSpec`] / [`SelectOptions`]: what to read
//! - [`build_select`], [`apply_where_order_limit`], [`build_count`]: SELECT text
//! - [`Clause`], [`SqlExpr`], [`OrderTerm`]: filter and ordering pieces
//! - [`builder`]: INSERT/UPDATE/DELETE and CREATE/DROP helpers

pub mod builder;
pub mod clause;
pub mod expr;
pub mod select;

pub use builder::JoinTable;
pub use clause::{Clause, OrderTerm};
pub use expr::{All, Compare, CompareOp, SqlConstant, SqlExpr, all};
pub use select::{SelectOptions, SelectSpec, apply_where_order_limit, build_count, build_select};

#[cfg(test)]
pub(crate) mod testing {
    use sqlconduit_core::{ColumnDef, Dialect, DriverConnection, Error, Result};

    /// SQL-only dialect with SQLite-style LIMIT/OFFSET.
    pub(crate) struct Ansi;

    impl Dialect for Ansi {
        fn name(&self) -> &'static str {
            "ansi"
        }

        fn connect(&self) -> Result<Box<dyn DriverConnection>> {
            Err(Error::unimplemented(self.name(), "connect"))
        }

        fn limit_offset(&self, start: u64, end: Option<u64>) -> Result<String> {
            Ok(match (start, end) {
                (0, Some(end)) => format!("LIMIT {end}"),
                (start, None) => format!("LIMIT -1 OFFSET {start}"),
                (start, Some(end)) => format!("LIMIT {} OFFSET {start}", end - start),
            })
        }

        fn create_column(&self, column: &ColumnDef) -> Result<String> {
            let mut sql = format!("{} {}", column.db_name, column.sql_type);
            if column.not_null {
                sql.push_str(" NOT NULL");
            }
            Ok(sql)
        }

        fn create_id_column(&self, entity: &sqlconduit_core::EntityDescriptor) -> Result<String> {
            Ok(format!("{} INTEGER PRIMARY KEY", entity.id_name))
        }

        fn join_sql_type(&self) -> Result<String> {
            Ok("INT NOT NULL".to_string())
        }
    }
}

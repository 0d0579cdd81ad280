//! Driver and dialect abstractions.
//!
//! - [`DriverConnection`] - a live, driver-native database handle
//! - [`RowCursor`] - a forward-only cursor opened on a handle
//! - [`Dialect`] - per-backend connection construction and SQL fragments
//!
//! All calls are synchronous and block on the underlying client.

use crate::Result;
use crate::error::Error;
use crate::model::{ColumnDef, EntityDescriptor};
use crate::row::Row;
use crate::value::Value;
use std::fmt::Write as _;

/// A forward-only cursor over the rows of one executed statement.
///
/// Cursors own whatever driver state they need, so they may outlive the
/// borrow of the connection that opened them. They must still be dropped
/// before that connection is committed, rolled back, or returned to a pool.
pub trait RowCursor: Send {
    /// Fetch the next row, or `None` once the result set is exhausted.
    fn fetch_one(&mut self) -> Result<Option<Row>>;
}

/// A live connection owned by a pool.
///
/// Implementations follow DB-API transaction semantics: a transaction is
/// implicitly open until [`commit`](DriverConnection::commit) or
/// [`rollback`](DriverConnection::rollback) ends it.
pub trait DriverConnection: Send {
    /// Execute a statement and return the number of rows affected.
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Execute a query and open a cursor over its rows.
    fn open_cursor(&mut self, sql: &str) -> Result<Box<dyn RowCursor>>;

    /// Execute a query and return all rows.
    fn query_all(&mut self, sql: &str) -> Result<Vec<Row>> {
        let mut cursor = self.open_cursor(sql)?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.fetch_one()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a query and return its first row, if any.
    fn query_one(&mut self, sql: &str) -> Result<Option<Row>> {
        self.open_cursor(sql)?.fetch_one()
    }

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Switch driver-level auto-commit on or off.
    fn set_auto_commit(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    /// The key generated by the most recent insert on this handle.
    fn last_insert_id(&mut self) -> Result<Value> {
        Err(Error::unimplemented("driver", "last_insert_id"))
    }
}

/// A backend-specific implementation of connection construction and
/// SQL-fragment formatting.
///
/// Only [`name`](Dialect::name) and [`connect`](Dialect::connect) are
/// mandatory. Hooks without a generic implementation fail with
/// [`Error::Unimplemented`] until a dialect supplies them.
pub trait Dialect: Send + Sync {
    /// Short backend name, also used as the default URI scheme.
    fn name(&self) -> &'static str;

    /// Whether connections honor COMMIT/ROLLBACK.
    fn supports_transactions(&self) -> bool {
        true
    }

    /// Open a new physical connection.
    fn connect(&self) -> Result<Box<dyn DriverConnection>>;

    /// Format the clause restricting a result set to rows `start..end`.
    ///
    /// Called only when `start > 0` or `end` is present.
    fn limit_offset(&self, _start: u64, _end: Option<u64>) -> Result<String> {
        Err(Error::unimplemented(self.name(), "limit_offset"))
    }

    /// Column DDL for one declared column.
    fn create_column(&self, _column: &ColumnDef) -> Result<String> {
        Err(Error::unimplemented(self.name(), "create_column"))
    }

    /// DDL line for the primary key column of an entity.
    fn create_id_column(&self, _entity: &EntityDescriptor) -> Result<String> {
        Err(Error::unimplemented(self.name(), "create_id_column"))
    }

    /// Column type used for both sides of an intermediate join table.
    fn join_sql_type(&self) -> Result<String> {
        Err(Error::unimplemented(self.name(), "join_sql_type"))
    }

    fn table_exists(&self, _conn: &mut dyn DriverConnection, _table: &str) -> Result<bool> {
        Err(Error::unimplemented(self.name(), "table_exists"))
    }

    /// Run an INSERT and return the row's primary key.
    ///
    /// When the caller supplied `id` it was already written into `sql`
    /// and is returned as-is; otherwise the generated key is fetched.
    fn insert_returning_id(
        &self,
        conn: &mut dyn DriverConnection,
        sql: &str,
        id: Option<Value>,
    ) -> Result<Value> {
        conn.execute(sql)?;
        match id {
            Some(id) => Ok(id),
            None => conn.last_insert_id(),
        }
    }

    /// Quote a value for inclusion in generated SQL text.
    fn sql_literal(&self, value: &Value) -> String {
        ansi_literal(value)
    }
}

/// ANSI SQL literal rendering: single quotes doubled, blobs as `X'..'`.
pub fn ansi_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Double(v) => format!("{v:?}"),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Bytes(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02X}");
            }
            out.push('\'');
            out
        }
    }
}

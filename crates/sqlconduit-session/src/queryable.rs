//! The query surface shared by databases and transactions.

use crate::database::Database;
use crate::stream::ResultCursorStream;
use sqlconduit_core::error::TypeError;
use sqlconduit_core::{
    CacheSet, ColumnDef, EntityDescriptor, Error, Hydrate, PrimaryKey, Result, Row, Value,
};
use sqlconduit_pool::PhysicalConnection;
use sqlconduit_query::{JoinTable, SelectSpec, build_count, builder};
use std::sync::Arc;

/// Statements and reads that run either on a pooled connection
/// ([`Database`]) or on the connection pinned by a
/// [`Transaction`](crate::Transaction).
///
/// Implementors supply where connections come from and which cache
/// hydrated instances go to; everything else is provided.
pub trait Queryable {
    /// The database whose dialect and settings apply.
    fn database(&self) -> &Database;

    /// Cache namespace for instances hydrated through this surface.
    fn cache(&self) -> &CacheSet;

    /// Run `f` with a connection appropriate for this surface.
    fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PhysicalConnection) -> Result<T>;

    /// Execute the select and stream hydrated instances.
    fn iter_select<M: Hydrate>(&self, spec: &SelectSpec<'_>) -> Result<ResultCursorStream<'_, M>>;

    /// Execute a statement; returns the affected row count.
    fn query(&self, sql: &str) -> Result<u64> {
        let db = self.database();
        self.with_connection(|conn| {
            db.log_statement(conn.serial(), "Query", sql);
            conn.execute(sql)
        })
    }

    fn query_all(&self, sql: &str) -> Result<Vec<Row>> {
        let db = self.database();
        self.with_connection(|conn| {
            db.log_statement(conn.serial(), "QueryAll", sql);
            let rows = conn.query_all(sql)?;
            db.log_result(conn.serial(), "QueryAll", &rows);
            Ok(rows)
        })
    }

    fn query_one(&self, sql: &str) -> Result<Option<Row>> {
        let db = self.database();
        self.with_connection(|conn| {
            db.log_statement(conn.serial(), "QueryOne", sql);
            let row = conn.query_one(sql)?;
            db.log_result(conn.serial(), "QueryOne", &row);
            Ok(row)
        })
    }

    /// Insert a row and return its primary key.
    ///
    /// A caller-supplied `id` is written as the first column; otherwise the
    /// dialect reports the generated key.
    fn query_insert_id<S: AsRef<str>>(
        &self,
        table: &str,
        id_name: &str,
        id: Option<Value>,
        names: &[S],
        values: &[Value],
    ) -> Result<Value> {
        let db = self.database();
        let mut all_names: Vec<&str> = Vec::with_capacity(names.len() + 1);
        let mut all_values: Vec<Value> = Vec::with_capacity(values.len() + 1);
        if let Some(id) = &id {
            all_names.push(id_name);
            all_values.push(id.clone());
        }
        all_names.extend(names.iter().map(AsRef::as_ref));
        all_values.extend_from_slice(values);
        let sql = builder::insert_sql(db.dialect(), table, &all_names, &all_values);

        self.with_connection(|conn| {
            db.log_statement(conn.serial(), "QueryIns", &sql);
            let id = db.dialect().insert_returning_id(&mut **conn, &sql, id)?;
            db.log_result(conn.serial(), "QueryIns", &id);
            Ok(id)
        })
    }

    /// Number of rows the select would return, ignoring order and slicing.
    fn count_select(&self, spec: &SelectSpec<'_>) -> Result<u64> {
        let sql = build_count(spec, self.database().dialect())?;
        let value = self
            .query_one(&sql)?
            .and_then(|row| row.get(0).and_then(Value::as_i64))
            .ok_or_else(|| {
                Error::Type(TypeError {
                    expected: "INTEGER count",
                    actual: "no value".to_string(),
                    column: None,
                })
            })?;
        u64::try_from(value).map_err(|_| {
            Error::Type(TypeError {
                expected: "non-negative count",
                actual: value.to_string(),
                column: None,
            })
        })
    }

    fn create_table(&self, entity: &EntityDescriptor) -> Result<()> {
        let sql = builder::create_table_sql(self.database().dialect(), entity)?;
        self.query(&sql).map(|_| ())
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        self.query(&builder::drop_table_sql(table)).map(|_| ())
    }

    /// Delete every row of `table`.
    fn clear_table(&self, table: &str) -> Result<()> {
        self.query(&builder::clear_table_sql(table)).map(|_| ())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let db = self.database();
        self.with_connection(|conn| db.dialect().table_exists(&mut **conn, table))
    }

    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        let sql = builder::add_column_sql(self.database().dialect(), table, column)?;
        self.query(&sql).map(|_| ())
    }

    fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        self.query(&builder::drop_column_sql(table, column)).map(|_| ())
    }

    fn create_join_table(&self, join: &JoinTable) -> Result<()> {
        let sql = join.create_sql(self.database().dialect())?;
        self.query(&sql).map(|_| ())
    }

    fn drop_join_table(&self, join: &JoinTable) -> Result<()> {
        self.query(&join.drop_sql()).map(|_| ())
    }

    /// Link two keys through an intermediate table.
    fn join_insert(&self, join: &JoinTable, join_value: &Value, other_value: &Value) -> Result<()> {
        let sql = join.insert_sql(self.database().dialect(), join_value, other_value);
        self.query(&sql).map(|_| ())
    }

    fn join_delete(&self, join: &JoinTable, join_value: &Value, other_value: &Value) -> Result<()> {
        let sql = join.delete_sql(self.database().dialect(), join_value, other_value);
        self.query(&sql).map(|_| ())
    }

    /// Keys on the other side of `join` linked to `join_value`.
    fn join_select(&self, join: &JoinTable, join_value: &Value) -> Result<Vec<Value>> {
        let sql = join.select_other_sql(self.database().dialect(), join_value);
        first_column(self.query_all(&sql)?)
    }

    /// Write new column values to the row with primary key `id`.
    fn update_row(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        values: &[(String, Value)],
    ) -> Result<()> {
        let sql = builder::update_sql(self.database().dialect(), entity, id, values);
        self.query(&sql).map(|_| ())
    }

    /// Fetch the named columns of one row by primary key.
    fn select_one<S: AsRef<str>>(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        columns: &[S],
    ) -> Result<Option<Row>> {
        let sql = builder::select_one_sql(self.database().dialect(), entity, id, columns);
        self.query_one(&sql)
    }

    fn delete_row(&self, entity: &EntityDescriptor, id: &Value) -> Result<()> {
        let sql = builder::delete_sql(self.database().dialect(), entity, id);
        self.query(&sql).map(|_| ())
    }

    /// Primary keys of the rows where `column = value`.
    fn select_ids(&self, entity: &EntityDescriptor, column: &str, value: &Value) -> Result<Vec<Value>> {
        let sql = builder::select_ids_sql(self.database().dialect(), entity, column, value);
        first_column(self.query_all(&sql)?)
    }

    /// Load one instance by primary key, consulting the cache first.
    ///
    /// A cached, unexpired instance is returned as is. An expired one is
    /// re-synced from the row. Returns `None` when no row has that key.
    fn get<M: Hydrate>(&self, id: impl Into<Value>) -> Result<Option<Arc<M>>> {
        let id = id.into();
        let entity = M::descriptor();
        let key = PrimaryKey::try_from(&id)?;
        let sub = self.cache().sub_cache(&entity.table);
        let cached = sub.get::<M>(&key);
        if let Some(instance) = &cached {
            if !instance.is_expired() {
                return Ok(cached);
            }
        }

        // A table without declared columns is probed by its key alone.
        let probe_only = entity.columns.is_empty();
        let columns: Vec<&str> = if probe_only {
            vec![entity.id_name.as_str()]
        } else {
            entity.columns.iter().map(|c| c.db_name.as_str()).collect()
        };
        let Some(row) = self.select_one(entity, &id, &columns)? else {
            return Ok(None);
        };
        let values = if probe_only { Vec::new() } else { row.into_values() };
        match cached {
            Some(instance) => {
                instance.sync(values)?;
                Ok(Some(instance))
            }
            None => {
                let instance = Arc::new(M::hydrate(id, Some(values))?);
                sub.put(key, Arc::clone(&instance));
                Ok(Some(instance))
            }
        }
    }
}

fn first_column(rows: Vec<Row>) -> Result<Vec<Value>> {
    rows.into_iter()
        .map(|row| {
            row.split_first().map(|(first, _)| first).ok_or_else(|| {
                Error::Type(TypeError {
                    expected: "at least one column",
                    actual: "empty row".to_string(),
                    column: None,
                })
            })
        })
        .collect()
}

/// Turn one select row into a cached instance.
///
/// The row is `[primary key, declared columns...]`, or just the key for a
/// lazy select (`lazy == true`). An existing cache entry is reused; if it
/// is expired and columns were fetched it is re-synced.
pub(crate) fn hydrate_row<M: Hydrate>(cache: &CacheSet, row: Row, lazy: bool) -> Result<Arc<M>> {
    let (id, rest) = row.split_first().ok_or_else(|| {
        Error::Type(TypeError {
            expected: "primary key column",
            actual: "empty row".to_string(),
            column: None,
        })
    })?;
    let columns = if lazy { None } else { Some(rest) };
    let key = PrimaryKey::try_from(&id)?;
    let sub = cache.sub_cache(&M::descriptor().table);

    if let Some(existing) = sub.get::<M>(&key) {
        if let Some(columns) = columns {
            if existing.is_expired() {
                existing.sync(columns)?;
            }
        }
        return Ok(existing);
    }

    let instance = Arc::new(M::hydrate(id, columns)?);
    sub.put(key, Arc::clone(&instance));
    Ok(instance)
}

//! Single-row DML and table DDL statements.
//!
//! Values are inlined as literals quoted by the dialect; there are no
//! bound parameters at this layer.

use sqlconduit_core::{ColumnDef, ConfigErrorKind, Dialect, EntityDescriptor, Error, Result, Value};

fn literals(dialect: &dyn Dialect, values: &[Value]) -> String {
    values
        .iter()
        .map(|v| dialect.sql_literal(v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn assignments(dialect: &dyn Dialect, values: &[(String, Value)], separator: &str) -> String {
    values
        .iter()
        .map(|(column, value)| format!("{column} = {}", dialect.sql_literal(value)))
        .collect::<Vec<_>>()
        .join(separator)
}

/// `INSERT INTO table (a, b) VALUES (1, 'x')`
pub fn insert_sql<S: AsRef<str>>(
    dialect: &dyn Dialect,
    table: &str,
    names: &[S],
    values: &[Value],
) -> String {
    let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        names.join(", "),
        literals(dialect, values)
    )
}

/// Update the row with primary key `id`. `values` pairs physical column
/// names with new values.
pub fn update_sql(
    dialect: &dyn Dialect,
    entity: &EntityDescriptor,
    id: &Value,
    values: &[(String, Value)],
) -> String {
    format!(
        "UPDATE {} SET {} WHERE {} = {}",
        entity.table,
        assignments(dialect, values, ", "),
        entity.id_name,
        dialect.sql_literal(id)
    )
}

/// Fetch `columns` of the row with primary key `id`.
pub fn select_one_sql<S: AsRef<str>>(
    dialect: &dyn Dialect,
    entity: &EntityDescriptor,
    id: &Value,
    columns: &[S],
) -> String {
    select_one_by_sql(dialect, entity, columns, &entity.id_name, id)
}

/// Fetch `columns` of the first row where `column = value`.
pub fn select_one_by_sql<S: AsRef<str>>(
    dialect: &dyn Dialect,
    entity: &EntityDescriptor,
    columns: &[S],
    column: &str,
    value: &Value,
) -> String {
    let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    format!(
        "SELECT {} FROM {} WHERE {column} = {}",
        columns.join(", "),
        entity.table,
        dialect.sql_literal(value)
    )
}

pub fn delete_sql(dialect: &dyn Dialect, entity: &EntityDescriptor, id: &Value) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}",
        entity.table,
        entity.id_name,
        dialect.sql_literal(id)
    )
}

/// Primary keys of the rows where `column = value` (one-to-many joins).
pub fn select_ids_sql(
    dialect: &dyn Dialect,
    entity: &EntityDescriptor,
    column: &str,
    value: &Value,
) -> String {
    format!(
        "SELECT {} FROM {} WHERE {column} = {}",
        entity.id_name,
        entity.table,
        dialect.sql_literal(value)
    )
}

/// Equality conditions on declared attributes, joined with `AND`.
///
/// Attribute names are mapped to physical column names; an unknown
/// attribute is an error.
pub fn column_clause(
    dialect: &dyn Dialect,
    entity: &EntityDescriptor,
    attributes: &[(&str, Value)],
) -> Result<String> {
    let mut resolved = Vec::with_capacity(attributes.len());
    for (name, value) in attributes {
        let column = entity.column_by_name(name).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::InvalidSelect,
                format!("{} has no column named {name:?}", entity.table),
            )
        })?;
        resolved.push((column.db_name.clone(), value.clone()));
    }
    Ok(assignments(dialect, &resolved, " AND "))
}

/// `CREATE TABLE` with the dialect's id column followed by one line per
/// declared column.
pub fn create_table_sql(dialect: &dyn Dialect, entity: &EntityDescriptor) -> Result<String> {
    let mut lines = vec![dialect.create_id_column(entity)?];
    for column in &entity.columns {
        lines.push(dialect.create_column(column)?);
    }
    let body = lines
        .iter()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join(",\n");
    Ok(format!("CREATE TABLE {} (\n{body}\n)", entity.table))
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE {table}")
}

/// Delete every row of `table`.
pub fn clear_table_sql(table: &str) -> String {
    format!("DELETE FROM {table}")
}

/// `ALTER TABLE .. ADD COLUMN` using the dialect's column DDL.
pub fn add_column_sql(dialect: &dyn Dialect, table: &str, column: &ColumnDef) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {table} ADD COLUMN {}",
        dialect.create_column(column)?
    ))
}

pub fn drop_column_sql(table: &str, column: &str) -> String {
    format!("ALTER TABLE {table} DROP COLUMN {column}")
}

/// An intermediate table linking two entities in a many-to-many join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub table: String,
    /// Column referencing the owning side
    pub join_column: String,
    /// Column referencing the other side
    pub other_column: String,
}

impl JoinTable {
    pub fn new(
        table: impl Into<String>,
        join_column: impl Into<String>,
        other_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            join_column: join_column.into(),
            other_column: other_column.into(),
        }
    }

    pub fn create_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        let column_type = dialect.join_sql_type()?;
        Ok(format!(
            "CREATE TABLE {} (\n    {} {column_type},\n    {} {column_type}\n)",
            self.table, self.join_column, self.other_column
        ))
    }

    pub fn drop_sql(&self) -> String {
        drop_table_sql(&self.table)
    }

    /// Link `join_value` to `other_value`.
    pub fn insert_sql(&self, dialect: &dyn Dialect, join_value: &Value, other_value: &Value) -> String {
        format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            self.table,
            self.join_column,
            self.other_column,
            dialect.sql_literal(join_value),
            dialect.sql_literal(other_value)
        )
    }

    pub fn delete_sql(&self, dialect: &dyn Dialect, join_value: &Value, other_value: &Value) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {} AND {} = {}",
            self.table,
            self.join_column,
            dialect.sql_literal(join_value),
            self.other_column,
            dialect.sql_literal(other_value)
        )
    }

    /// Keys on the other side linked to `join_value`.
    pub fn select_other_sql(&self, dialect: &dyn Dialect, join_value: &Value) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.other_column,
            self.table,
            self.join_column,
            dialect.sql_literal(join_value)
        )
    }
}

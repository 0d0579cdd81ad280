//! Entity descriptors and the hydration contract.
//!
//! The mapping layer that defines entities lives outside this workspace.
//! It describes each entity with an [`EntityDescriptor`] and implements
//! [`Hydrate`] so query results can be turned into shared, cached instances.

use crate::Result;
use crate::value::Value;
use std::any::Any;

/// A declared column of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Attribute name used by callers (e.g. in ORDER BY lists)
    pub name: String,
    /// Physical column name
    pub db_name: String,
    /// SQL type text used in DDL
    pub sql_type: String,
    pub not_null: bool,
    /// Default value expression (SQL)
    pub default: Option<String>,
}

impl ColumnDef {
    /// A nullable column whose physical name equals its attribute name.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            db_name: name.clone(),
            name,
            sql_type: sql_type.into(),
            not_null: false,
            default: None,
        }
    }

    /// Override the physical column name.
    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_sql(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Table-level description of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub table: String,
    /// Primary key column name
    pub id_name: String,
    /// Declared columns, in declaration order (primary key excluded)
    pub columns: Vec<ColumnDef>,
}

impl EntityDescriptor {
    /// Describe a table with an `id` primary key and no columns yet.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_name: "id".to_string(),
            columns: Vec::new(),
        }
    }

    pub fn id_name(mut self, id_name: impl Into<String>) -> Self {
        self.id_name = id_name.into();
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Look up a declared column by attribute name.
    pub fn column_by_name(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// An instance that can live in a cache and be marked stale.
pub trait Cached: Any + Send + Sync {
    /// Mark the instance stale; its state must be reloaded before use.
    fn expire(&self);

    fn is_expired(&self) -> bool;
}

/// Construction of domain instances from fetched rows.
///
/// Row values arrive in the order `[primary key, declared columns...]`;
/// the key is passed separately and `columns` holds the rest.
pub trait Hydrate: Cached + Sized {
    fn descriptor() -> &'static EntityDescriptor;

    /// Build a new instance. `columns` is `None` when the select fetched
    /// only primary keys.
    fn hydrate(id: Value, columns: Option<Vec<Value>>) -> Result<Self>;

    /// Repopulate an existing (typically expired) instance and clear its
    /// expired flag.
    fn sync(&self, columns: Vec<Value>) -> Result<()>;
}

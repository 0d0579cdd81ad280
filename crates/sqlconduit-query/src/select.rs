//! SELECT assembly from a declarative read description.

use crate::clause::{Clause, OrderTerm, order_by_sql};
use sqlconduit_core::{ConfigErrorKind, Dialect, EntityDescriptor, Error, Result};

/// Ordering, slicing and hydration options of a select.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub order_by: Vec<OrderTerm>,
    /// Negate every ORDER BY direction.
    pub reversed: bool,
    /// Rows to skip
    pub start: Option<u64>,
    /// Exclusive upper bound on the row index
    pub end: Option<u64>,
    /// Fetch only primary keys and defer column loading.
    pub lazy_columns: bool,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by<I, T>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OrderTerm>,
    {
        self.order_by = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    pub fn lazy_columns(mut self, lazy: bool) -> Self {
        self.lazy_columns = lazy;
        self
    }

    /// Restrict the select to rows `start..end`.
    pub fn slice(mut self, start: Option<u64>, end: Option<u64>) -> Result<Self> {
        self.start = start;
        self.end = end;
        self.validate()?;
        Ok(self)
    }

    /// Check `start <= end` when both are set.
    pub fn validate(&self) -> Result<()> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err(Error::config(
                ConfigErrorKind::InvalidSelect,
                format!("select slice start {start} is past its end {end}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Immutable description of a read over one entity.
#[derive(Debug, Clone)]
pub struct SelectSpec<'e> {
    pub entity: &'e EntityDescriptor,
    /// Tables in the FROM list; the entity's own table first.
    pub tables: Vec<String>,
    pub clause: Clause,
    pub options: SelectOptions,
}

impl<'e> SelectSpec<'e> {
    /// Select every row of the entity's table.
    pub fn new(entity: &'e EntityDescriptor) -> Self {
        Self {
            entity,
            tables: vec![entity.table.clone()],
            clause: Clause::default(),
            options: SelectOptions::default(),
        }
    }

    pub fn filter(mut self, clause: impl Into<Clause>) -> Self {
        self.clause = clause.into();
        self
    }

    /// Add a table to the FROM list (for clauses that join on it).
    pub fn join_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !self.tables.contains(&table) {
            self.tables.push(table);
        }
        self
    }

    pub fn options(mut self, options: SelectOptions) -> Self {
        self.options = options;
        self
    }
}

/// Build the full SELECT for `spec`.
///
/// The column list is the entity's primary key followed by its declared
/// columns in declaration order, or the primary key alone when
/// `lazy_columns` is set. Row hydration depends on this order.
#[tracing::instrument(level = "trace", skip(spec, dialect), fields(table = %spec.entity.table))]
pub fn build_select(spec: &SelectSpec<'_>, dialect: &dyn Dialect) -> Result<String> {
    let entity = spec.entity;
    let mut columns = vec![format!("{}.{}", entity.table, entity.id_name)];
    if !spec.options.lazy_columns {
        columns.extend(
            entity
                .columns
                .iter()
                .map(|c| format!("{}.{}", entity.table, c.db_name)),
        );
    }
    let base = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        spec.tables.join(", ")
    );
    let sql = apply_where_order_limit(spec, &base, true, true, dialect)?;
    tracing::trace!(sql = %sql, "Built select");
    Ok(sql)
}

/// Append `WHERE`, and optionally `ORDER BY` and the dialect's limit
/// clause, to `base`.
///
/// The limit clause is emitted only when `start > 0` or `end` is set.
pub fn apply_where_order_limit(
    spec: &SelectSpec<'_>,
    base: &str,
    apply_order: bool,
    apply_limit: bool,
    dialect: &dyn Dialect,
) -> Result<String> {
    let options = &spec.options;
    options.validate()?;

    let mut sql = format!("{base} WHERE {}", spec.clause.to_sql(dialect));

    if apply_order && !options.order_by.is_empty() {
        let order = order_by_sql(&options.order_by, options.reversed, spec.entity, dialect)?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }

    let start = options.start.unwrap_or(0);
    if apply_limit && (start > 0 || options.end.is_some()) {
        let limit = dialect.limit_offset(start, options.end)?;
        sql.push(' ');
        sql.push_str(&limit);
    }

    Ok(sql)
}

/// `SELECT COUNT(*)` over the same tables and clause, ignoring order and
/// slicing.
pub fn build_count(spec: &SelectSpec<'_>, dialect: &dyn Dialect) -> Result<String> {
    let base = format!("SELECT COUNT(*) FROM {}", spec.tables.join(", "));
    apply_where_order_limit(spec, &base, false, false, dialect)
}

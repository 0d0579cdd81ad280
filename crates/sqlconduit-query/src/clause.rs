//! WHERE and ORDER BY pieces of a select.

use crate::expr::SqlExpr;
use regex::Regex;
use sqlconduit_core::{ConfigErrorKind, Dialect, EntityDescriptor, Error, Result};
use std::sync::{Arc, OnceLock};

/// A filter clause: literal SQL text or an expression tree.
#[derive(Debug, Clone)]
pub enum Clause {
    Raw(String),
    Expr(Arc<dyn SqlExpr>),
}

impl Clause {
    /// Render the clause as SQL text.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        match self {
            Clause::Raw(sql) => sql.clone(),
            Clause::Expr(expr) => expr.to_sql(dialect),
        }
    }
}

impl Default for Clause {
    fn default() -> Self {
        Clause::Raw("1 = 1".to_string())
    }
}

impl From<&str> for Clause {
    fn from(sql: &str) -> Self {
        Clause::Raw(sql.to_string())
    }
}

impl From<String> for Clause {
    fn from(sql: String) -> Self {
        Clause::Raw(sql)
    }
}

impl<E: SqlExpr + 'static> From<E> for Clause {
    fn from(expr: E) -> Self {
        Clause::Expr(Arc::new(expr))
    }
}

/// One entry of an ORDER BY list.
#[derive(Debug, Clone)]
pub enum OrderTerm {
    /// A column identifier; a leading `-` marks it descending.
    Column(String),
    Expr(Arc<dyn SqlExpr>),
    /// Flip the direction of the inner term.
    Desc(Box<OrderTerm>),
}

impl OrderTerm {
    pub fn desc(self) -> Self {
        OrderTerm::Desc(Box::new(self))
    }

    /// Resolve to SQL text and a descending flag.
    ///
    /// Attribute names declared on `entity` are replaced by their physical
    /// column names.
    pub(crate) fn resolve(
        &self,
        entity: &EntityDescriptor,
        dialect: &dyn Dialect,
    ) -> Result<(String, bool)> {
        match self {
            OrderTerm::Column(raw) => {
                let (name, desc) = match raw.strip_prefix('-') {
                    Some(stripped) => (stripped, true),
                    None => (raw.as_str(), false),
                };
                if !is_identifier(name) {
                    return Err(Error::config(
                        ConfigErrorKind::InvalidSelect,
                        format!("order terms given as strings must be column identifiers, got {raw:?}"),
                    ));
                }
                let column = entity
                    .column_by_name(name)
                    .map_or(name, |c| c.db_name.as_str());
                Ok((column.to_string(), desc))
            }
            OrderTerm::Expr(expr) => Ok((expr.to_sql(dialect), false)),
            OrderTerm::Desc(inner) => {
                let (sql, desc) = inner.resolve(entity, dialect)?;
                Ok((sql, !desc))
            }
        }
    }
}

impl From<&str> for OrderTerm {
    fn from(column: &str) -> Self {
        OrderTerm::Column(column.to_string())
    }
}

impl From<String> for OrderTerm {
    fn from(column: String) -> Self {
        OrderTerm::Column(column)
    }
}

fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            match Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$") {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(error = %e, "Identifier pattern failed to compile");
                    None
                }
            }
        })
        .as_ref()
}

/// Whether `s` is a plain or table-qualified SQL identifier.
pub fn is_identifier(s: &str) -> bool {
    identifier_pattern().is_some_and(|re| re.is_match(s))
}

/// Render an ORDER BY list with explicit directions. `reversed` flips
/// every term after resolution.
pub(crate) fn order_by_sql(
    terms: &[OrderTerm],
    reversed: bool,
    entity: &EntityDescriptor,
    dialect: &dyn Dialect,
) -> Result<String> {
    let mut parts = Vec::with_capacity(terms.len());
    for term in terms {
        let (sql, desc) = term.resolve(entity, dialect)?;
        let direction = if desc != reversed { "DESC" } else { "ASC" };
        parts.push(format!("{sql} {direction}"));
    }
    Ok(parts.join(", "))
}

//! Expression trees usable as filter clauses and order terms.
//!
//! The full expression grammar belongs to the mapping layer; this module
//! only defines the rendering contract ([`SqlExpr`]) plus a few concrete
//! nodes for simple comparisons.

use sqlconduit_core::{Dialect, Value};
use std::fmt;
use std::sync::Arc;

/// A SQL expression that renders itself for a given dialect.
pub trait SqlExpr: fmt::Debug + Send + Sync {
    fn to_sql(&self, dialect: &dyn Dialect) -> String;
}

/// Verbatim SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlConstant(pub String);

impl SqlConstant {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }
}

impl SqlExpr for SqlConstant {
    fn to_sql(&self, _dialect: &dyn Dialect) -> String {
        self.0.clone()
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// `column <op> literal`, with the literal quoted by the dialect.
///
/// Comparing against `NULL` renders `IS NULL` / `IS NOT NULL` for the
/// equality operators.
#[derive(Debug, Clone, PartialEq)]
pub struct Compare {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Compare {
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Lt, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Gt, value)
    }
}

impl SqlExpr for Compare {
    fn to_sql(&self, dialect: &dyn Dialect) -> String {
        match (&self.value, self.op) {
            (Value::Null, CompareOp::Eq) => format!("{} IS NULL", self.column),
            (Value::Null, CompareOp::Ne) => format!("{} IS NOT NULL", self.column),
            (value, op) => format!(
                "{} {} {}",
                self.column,
                op.as_str(),
                dialect.sql_literal(value)
            ),
        }
    }
}

/// Conjunction of sub-expressions. An empty conjunction is always true.
#[derive(Debug, Clone)]
pub struct All(Vec<Arc<dyn SqlExpr>>);

impl SqlExpr for All {
    fn to_sql(&self, dialect: &dyn Dialect) -> String {
        match self.0.as_slice() {
            [] => "1 = 1".to_string(),
            [only] => only.to_sql(dialect),
            parts => parts
                .iter()
                .map(|p| format!("({})", p.to_sql(dialect)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }
}

/// AND together any number of expressions.
pub fn all<I>(exprs: I) -> All
where
    I: IntoIterator<Item = Arc<dyn SqlExpr>>,
{
    All(exprs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Ansi;

    #[test]
    fn compare_quotes_literal() {
        let expr = Compare::eq("name", "O'Hara");
        assert_eq!(expr.to_sql(&Ansi), "name = 'O''Hara'");
        assert_eq!(Compare::gt("age", 30).to_sql(&Ansi), "age > 30");
    }

    #[test]
    fn compare_null_uses_is() {
        assert_eq!(Compare::eq("email", Value::Null).to_sql(&Ansi), "email IS NULL");
        assert_eq!(
            Compare::ne("email", Value::Null).to_sql(&Ansi),
            "email IS NOT NULL"
        );
    }

    #[test]
    fn conjunction() {
        let expr = all([
            Arc::new(Compare::gt("age", 18)) as Arc<dyn SqlExpr>,
            Arc::new(SqlConstant::new("name LIKE 'A%'")),
        ]);
        assert_eq!(expr.to_sql(&Ansi), "(age > 18) AND (name LIKE 'A%')");
        assert_eq!(all([]).to_sql(&Ansi), "1 = 1");
    }
}

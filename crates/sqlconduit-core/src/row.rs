//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::sync::Arc;

/// A single row returned from a database query.
///
/// Column names are shared via `Arc` between all rows of one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<[String]>,
}

impl Row {
    /// Create a row with its own column list.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            values,
            columns: column_names.into(),
        }
    }

    /// Create a row sharing column names with the rest of its result set.
    pub fn with_columns(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name, converted to `T`.
    pub fn get_named<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| {
                Error::Type(TypeError {
                    expected: "existing column",
                    actual: "missing".to_string(),
                    column: Some(name.to_string()),
                })
            })?;
        T::try_from(self.values[index].clone()).map_err(|e| match e {
            Error::Type(mut t) => {
                t.column = Some(name.to_string());
                Error::Type(t)
            }
            other => other,
        })
    }

    /// Consume the row and return its values in column order.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Split into the leading value (the primary key of a select) and the
    /// remaining values in column order.
    pub fn split_first(self) -> Option<(Value, Vec<Value>)> {
        let mut values = self.values.into_iter();
        let first = values.next()?;
        Some((first, values.collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(4), Value::Text("Ada".to_string())],
        )
    }

    #[test]
    fn named_access() {
        let row = sample();
        assert_eq!(row.get_named::<i64>("id").unwrap(), 4);
        assert_eq!(row.get_named::<String>("name").unwrap(), "Ada");
        let err = row.get_named::<i64>("name").unwrap_err();
        assert!(err.to_string().contains("column 'name'"));
        assert!(row.get_named::<i64>("age").is_err());
    }

    #[test]
    fn split_first_separates_key() {
        let (id, rest) = sample().split_first().unwrap();
        assert_eq!(id, Value::Int(4));
        assert_eq!(rest, vec![Value::Text("Ada".to_string())]);

        let empty = Row::new(Vec::new(), Vec::new());
        assert!(empty.split_first().is_none());
    }
}

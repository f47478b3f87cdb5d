//! Row access abstraction.
//!
//! The mapping core only ever reads flat rows: string keys, string values, a
//! missing key meaning the field is absent. [`InMemoryStore`] backs tests and
//! the CLI with a JSON fixture.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::StoreError;

/// A flat property bag
pub type Row = IndexMap<String, String>;

/// Read access to the record store.
pub trait RowAccessor {
    /// Fetch the row of `table` whose `key_column` equals `key_value`.
    fn fetch_by_key(&self, table: &str, key_column: &str, key_value: &str) -> Result<Option<Row>, StoreError>;

    /// Every row of `table` whose `where_column` equals `where_value`.
    fn query(&self, table: &str, where_column: &str, where_value: &str) -> Result<Vec<Row>, StoreError>;
}

impl<T: RowAccessor + ?Sized> RowAccessor for &T {
    fn fetch_by_key(&self, table: &str, key_column: &str, key_value: &str) -> Result<Option<Row>, StoreError> {
        (**self).fetch_by_key(table, key_column, key_value)
    }

    fn query(&self, table: &str, where_column: &str, where_value: &str) -> Result<Vec<Row>, StoreError> {
        (**self).query(table, where_column, where_value)
    }
}

/// Tables held in memory, rows in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: HashMap<String, Vec<Row>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: &str, row: Row) {
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    /// Builder-style insert from `(key, value)` pairs.
    pub fn with_row(mut self, table: &str, pairs: &[(&str, &str)]) -> Self {
        let row = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.insert(table, row);
        self
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Build a store from JSON shaped like
    /// `{"tables": {"<table>": [{"column": "value", ...}, ...]}}`.
    ///
    /// Scalar cells are stringified; null cells are left out.
    pub fn from_json(value: &Value) -> Result<Self, StoreError> {
        let tables = value
            .get("tables")
            .and_then(Value::as_object)
            .ok_or_else(|| StoreError::Fixture("expected a top-level \"tables\" object".to_string()))?;

        let mut store = Self::new();
        for (table, rows) in tables {
            let rows = rows
                .as_array()
                .ok_or_else(|| StoreError::Fixture(format!("table '{}' must be an array of rows", table)))?;
            for row in rows {
                let cells = row
                    .as_object()
                    .ok_or_else(|| StoreError::Fixture(format!("row in '{}' must be an object", table)))?;
                let mut parsed = Row::new();
                for (column, cell) in cells {
                    let text = match cell {
                        Value::Null => continue,
                        Value::String(s) => s.clone(),
                        Value::Bool(_) | Value::Number(_) => cell.to_string(),
                        _ => {
                            return Err(StoreError::Fixture(format!(
                                "cell '{}.{}' must be a scalar",
                                table, column
                            )))
                        }
                    };
                    parsed.insert(column.clone(), text);
                }
                store.insert(table, parsed);
            }
            // Keep empty tables visible
            store.tables.entry(table.clone()).or_default();
        }
        Ok(store)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("cannot read {}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| StoreError::Fixture(format!("invalid JSON in {}: {}", path.display(), e)))?;
        Self::from_json(&value)
    }
}

impl RowAccessor for InMemoryStore {
    fn fetch_by_key(&self, table: &str, key_column: &str, key_value: &str) -> Result<Option<Row>, StoreError> {
        Ok(self
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|row| row.get(key_column).map(String::as_str) == Some(key_value)))
            .cloned())
    }

    fn query(&self, table: &str, where_column: &str, where_value: &str) -> Result<Vec<Row>, StoreError> {
        Ok(self
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.get(where_column).map(String::as_str) == Some(where_value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

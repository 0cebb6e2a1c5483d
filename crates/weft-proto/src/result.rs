//! Tabular result sets.
//!
//! Rows come back as a column-labelled table. Column labels are always
//! prefixed with the entity they came from (`Students.name`), in the order
//! the caller requested them.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// An ordered, column-labelled set of result rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    /// The cell at `row` under `label`, if both exist.
    pub fn value(&self, row: usize, label: &str) -> Option<&Value> {
        let index = self.column_index(label)?;
        self.rows.get(row)?.get(index)
    }

    /// Renders rows as a JSON array of objects keyed by column label.
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (label, value) in self.columns.iter().zip(row) {
                    obj.insert(label.clone(), value.to_json());
                }
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_column_label() {
        let mut rows = RowSet::new(vec!["Products.product_name".into(), "Products.price".into()]);
        rows.push_row(vec![Value::Text("Desk".into()), Value::Int(120)]);
        assert_eq!(rows.value(0, "Products.price"), Some(&Value::Int(120)));
        assert_eq!(rows.value(0, "Products.stock"), None);
    }

    #[test]
    fn json_rendering_keys_rows_by_label() {
        let mut rows = RowSet::new(vec!["Students.name".into()]);
        rows.push_row(vec![Value::Text("Asha".into())]);
        assert_eq!(
            rows.to_json(),
            serde_json::json!([{"Students.name": "Asha"}])
        );
    }
}

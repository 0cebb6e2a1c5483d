//! Field data types.

use weft_proto::Value;

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    List,
    Nested,
}

impl DataType {
    /// The type label used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Text => "text",
            DataType::Boolean => "boolean",
            DataType::Timestamp => "timestamp",
            DataType::List => "list",
            DataType::Nested => "nested",
        }
    }

    /// Whether `value` is acceptable for a field of this type.
    ///
    /// Null always passes, an absent value is not a type error. Float fields
    /// accept integers, and timestamp fields accept plain integers since
    /// CSV and JSON sources carry epoch timestamps as bare numbers.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Integer, Value::Int(_)) => true,
            (DataType::Float, Value::Float(_) | Value::Int(_)) => true,
            (DataType::Text, Value::Text(_)) => true,
            (DataType::Boolean, Value::Bool(_)) => true,
            (DataType::Timestamp, Value::Timestamp(_) | Value::Int(_)) => true,
            (DataType::List, Value::List(_)) => true,
            (DataType::Nested, Value::Nested(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_matches_every_type() {
        for dt in [DataType::Integer, DataType::Text, DataType::Nested] {
            assert!(dt.matches(&Value::Null));
        }
    }

    #[test]
    fn float_fields_accept_integers() {
        assert!(DataType::Float.matches(&Value::Int(3)));
        assert!(!DataType::Integer.matches(&Value::Float(3.0)));
    }

    #[test]
    fn text_rejects_numbers() {
        assert!(!DataType::Text.matches(&Value::Int(5)));
    }
}

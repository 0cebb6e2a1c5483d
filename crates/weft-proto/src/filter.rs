//! The document filter DSL.
//!
//! Filters are JSON objects keyed by field name. A bare value is an equality
//! test; an object of `$`-prefixed keys applies comparison operators:
//!
//! ```json
//! {"price": {"$gt": 15}, "category": "stationery", "student_id": {"$in": [1001, 1002]}}
//! ```
//!
//! The operator set is closed: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`,
//! `$exists`, and `$in`. Anything else is rejected at parse time with the
//! offending operator named.

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;
use crate::value::Value;

/// A single comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// `true` requires the field to be present and non-null.
    Exists(bool),
    In(Vec<Value>),
}

impl Condition {
    /// The wire operator for this condition.
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "$eq",
            Condition::Ne(_) => "$ne",
            Condition::Gt(_) => "$gt",
            Condition::Gte(_) => "$gte",
            Condition::Lt(_) => "$lt",
            Condition::Lte(_) => "$lte",
            Condition::Exists(_) => "$exists",
            Condition::In(_) => "$in",
        }
    }

    fn from_operator(op: &str, value: Value) -> Result<Condition, Error> {
        match op {
            "$eq" => Ok(Condition::Eq(value)),
            "$ne" => Ok(Condition::Ne(value)),
            "$gt" => Ok(Condition::Gt(value)),
            "$gte" => Ok(Condition::Gte(value)),
            "$lt" => Ok(Condition::Lt(value)),
            "$lte" => Ok(Condition::Lte(value)),
            "$exists" => match value {
                Value::Bool(b) => Ok(Condition::Exists(b)),
                other => Err(Error::InvalidRequest(format!(
                    "$exists expects a boolean, got {}",
                    other.type_name()
                ))),
            },
            "$in" => match value {
                Value::List(items) => Ok(Condition::In(items)),
                other => Err(Error::InvalidRequest(format!(
                    "$in expects a list, got {}",
                    other.type_name()
                ))),
            },
            other => Err(Error::UnsupportedOperator { op: other.to_string() }),
        }
    }

    fn operand_json(&self) -> serde_json::Value {
        match self {
            Condition::Eq(v)
            | Condition::Ne(v)
            | Condition::Gt(v)
            | Condition::Gte(v)
            | Condition::Lt(v)
            | Condition::Lte(v) => v.to_json(),
            Condition::Exists(b) => serde_json::Value::Bool(*b),
            Condition::In(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

/// All conditions applied to a single field, combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    pub field: String,
    pub conditions: Vec<Condition>,
}

/// A conjunction of per-field predicates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    pub predicates: Vec<FieldPredicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    fn push(mut self, field: impl Into<String>, condition: Condition) -> Self {
        let field = field.into();
        match self.predicates.iter_mut().find(|p| p.field == field) {
            Some(predicate) => predicate.conditions.push(condition),
            None => self.predicates.push(FieldPredicate { field, conditions: vec![condition] }),
        }
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Condition::Eq(value.into()))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Condition::Ne(value.into()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Condition::Gt(value.into()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Condition::Gte(value.into()))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Condition::Lt(value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Condition::Lte(value.into()))
    }

    pub fn exists(self, field: impl Into<String>, present: bool) -> Self {
        self.push(field, Condition::Exists(present))
    }

    pub fn is_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.push(field, Condition::In(values))
    }

    /// Fields this filter touches.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().map(|p| p.field.as_str())
    }

    /// Parses the wire form. Unknown `$` operators fail with
    /// [`Error::UnsupportedOperator`].
    pub fn from_json(raw: &serde_json::Value) -> Result<Filter, Error> {
        let map = match raw {
            serde_json::Value::Null => return Ok(Filter::new()),
            serde_json::Value::Object(map) => map,
            other => {
                return Err(Error::InvalidRequest(format!(
                    "filter must be an object, got {other}"
                )))
            }
        };

        let mut filter = Filter::new();
        for (field, spec) in map {
            match spec {
                serde_json::Value::Object(ops)
                    if ops.keys().any(|k| k.starts_with('$')) =>
                {
                    for (op, operand) in ops {
                        if !op.starts_with('$') {
                            return Err(Error::InvalidRequest(format!(
                                "field '{field}' mixes operators with plain keys"
                            )));
                        }
                        let condition =
                            Condition::from_operator(op, Value::from_json(operand.clone()))?;
                        filter = filter.push(field.clone(), condition);
                    }
                }
                other => {
                    filter = filter.push(field.clone(), Condition::Eq(Value::from_json(other.clone())));
                }
            }
        }
        Ok(filter)
    }

    /// Renders the wire form. A lone equality collapses to a bare value.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for predicate in &self.predicates {
            let spec = match predicate.conditions.as_slice() {
                [Condition::Eq(v)] => v.to_json(),
                conditions => {
                    let mut ops = serde_json::Map::new();
                    for condition in conditions {
                        ops.insert(condition.operator().to_string(), condition.operand_json());
                    }
                    serde_json::Value::Object(ops)
                }
            };
            map.insert(predicate.field.clone(), spec);
        }
        serde_json::Value::Object(map)
    }
}

impl Serialize for Filter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Filter::from_json(&raw).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_values_parse_as_equality() {
        let raw: serde_json::Value =
            serde_json::from_str(r#"{"category": "stationery", "stock": 5}"#).unwrap();
        let filter = Filter::from_json(&raw).unwrap();
        assert_eq!(filter.predicates.len(), 2);
        assert_eq!(
            filter.predicates[0].conditions,
            vec![Condition::Eq(Value::Text("stationery".into()))]
        );
    }

    #[test]
    fn operator_objects_parse() {
        let raw: serde_json::Value =
            serde_json::from_str(r#"{"price": {"$gt": 15, "$lte": 100}}"#).unwrap();
        let filter = Filter::from_json(&raw).unwrap();
        assert_eq!(
            filter.predicates[0].conditions,
            vec![Condition::Gt(Value::Int(15)), Condition::Lte(Value::Int(100))]
        );
    }

    #[test]
    fn unknown_operator_is_named_in_error() {
        let raw: serde_json::Value = serde_json::from_str(r#"{"price": {"$regex": "x"}}"#).unwrap();
        let err = Filter::from_json(&raw).unwrap_err();
        match err {
            Error::UnsupportedOperator { op } => assert_eq!(op, "$regex"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn in_requires_a_list() {
        let raw: serde_json::Value = serde_json::from_str(r#"{"id": {"$in": 3}}"#).unwrap();
        assert!(matches!(Filter::from_json(&raw), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn round_trip_keeps_shape() {
        let filter = Filter::new()
            .gt("price", 15)
            .eq("category", "stationery")
            .is_in("id", vec![Value::Int(1), Value::Int(2)]);
        let json = filter.to_json();
        let back = Filter::from_json(&json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn lone_equality_collapses_to_bare_value() {
        let filter = Filter::new().eq("name", "Pen");
        assert_eq!(filter.to_json(), serde_json::json!({"name": "Pen"}));
    }
}

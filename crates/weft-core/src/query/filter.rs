//! Filter evaluation against documents.

use std::cmp::Ordering;

use weft_proto::{Condition, Document, Filter, Value};

/// Evaluates filters against single documents.
///
/// All predicates are ANDed. A missing or null field fails every condition
/// except `$exists: false`; integers and floats compare across types.
pub struct FilterEvaluator;

impl FilterEvaluator {
    pub fn matches(filter: &Filter, doc: &Document) -> bool {
        filter.predicates.iter().all(|predicate| {
            let value = doc.get(&predicate.field);
            predicate
                .conditions
                .iter()
                .all(|condition| Self::condition_matches(condition, value))
        })
    }

    fn condition_matches(condition: &Condition, value: Option<&Value>) -> bool {
        if let Condition::Exists(want) = condition {
            let present = matches!(value, Some(v) if !v.is_null());
            return present == *want;
        }
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };
        match condition {
            Condition::Eq(target) => Self::values_equal(value, target),
            Condition::Ne(target) => !Self::values_equal(value, target),
            Condition::Gt(target) => {
                Self::compare_values(value, target) == Some(Ordering::Greater)
            }
            Condition::Gte(target) => matches!(
                Self::compare_values(value, target),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Condition::Lt(target) => Self::compare_values(value, target) == Some(Ordering::Less),
            Condition::Lte(target) => matches!(
                Self::compare_values(value, target),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Condition::In(candidates) => {
                candidates.iter().any(|c| Self::values_equal(value, c))
            }
            Condition::Exists(_) => unreachable!("handled above"),
        }
    }

    /// Equality with integer/float cross-coercion.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
                *i as f64 == *f
            }
            _ => a == b,
        }
    }

    /// Ordering across comparable value pairs, `None` otherwise.
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
            (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
            (Value::Timestamp(x), Value::Int(y)) | (Value::Int(y), Value::Timestamp(x)) => {
                Some(x.cmp(y))
            }
            (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
            (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            _ => None,
        }
    }
}

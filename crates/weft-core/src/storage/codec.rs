//! Document and key encodings.
//!
//! Documents are stored as JSON inside the rkyv [`StoredRecord`] envelope.
//! Keys get a tagged binary encoding so that a value joins and indexes the
//! same way no matter which document it came from.

use weft_proto::{Document, Value};

use crate::error::{Error, Result};

/// Type tags for encoded keys. Distinct per type so an integer key never
/// collides with a text key of the same bytes.
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_TEXT: u8 = 0x04;
const TAG_TIMESTAMP: u8 = 0x05;

pub fn encode_document(doc: &Document) -> Result<Vec<u8>> {
    serde_json::to_vec(doc).map_err(|e| Error::Serialization(e.to_string()))
}

pub fn decode_document(bytes: &[u8]) -> Result<Document> {
    serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
}

/// Encodes a scalar value as a comparable key.
///
/// Returns `None` for values that cannot key a record: null, lists, and
/// nested objects.
pub fn encode_key(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Bool(b) => Some(vec![TAG_BOOL, u8::from(*b)]),
        Value::Int(i) => Some(tagged(TAG_INT, &i.to_be_bytes())),
        Value::Float(f) => {
            // Integral floats take the integer encoding so a value keys the
            // same way filter equality compares it (1001.0 joins Int 1001).
            // This also folds -0.0 into 0.0.
            if f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64
            {
                Some(tagged(TAG_INT, &(*f as i64).to_be_bytes()))
            } else {
                Some(tagged(TAG_FLOAT, &f.to_bits().to_be_bytes()))
            }
        }
        Value::Text(s) => Some(tagged(TAG_TEXT, s.as_bytes())),
        Value::Timestamp(ts) => Some(tagged(TAG_TIMESTAMP, &ts.to_be_bytes())),
        Value::Null | Value::List(_) | Value::Nested(_) => None,
    }
}

fn tagged(tag: u8, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(tag);
    out.extend_from_slice(bytes);
    out
}

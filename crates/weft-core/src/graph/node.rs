//! Graph node and edge types.
//!
//! These are the persisted shapes. Node identifiers are deterministic so a
//! rebuild from the same registry produces the same graph: collections get
//! `collection_<label>` (lowercased, spaces replaced), fields get
//! `<collection_id>_<field_label>`.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;

/// What a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum NodeKind {
    Collection,
    Field,
}

/// What an edge asserts about its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum EdgeRelation {
    /// Collection -> field ownership.
    HasField,
    /// Foreign-key owner collection -> target collection.
    References,
}

impl EdgeRelation {
    pub fn name(&self) -> &'static str {
        match self {
            EdgeRelation::HasField => "has_field",
            EdgeRelation::References => "references",
        }
    }
}

/// A flat property value. Graph properties never nest.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Int(i)
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Text(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Text(s)
    }
}

/// A node in the metadata graph.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    /// Flat key/value annotations in insertion order.
    pub properties: Vec<(String, PropValue)>,
}

impl GraphNode {
    pub fn collection(label: &str) -> Self {
        Self {
            id: collection_id(label),
            kind: NodeKind::Collection,
            label: label.to_string(),
            properties: Vec::new(),
        }
    }

    pub fn field(collection_label: &str, field_label: &str) -> Self {
        Self {
            id: field_id(collection_label, field_label),
            kind: NodeKind::Field,
            label: field_label.to_string(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropValue> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether a boolean property is set to true.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.property(key), Some(PropValue::Bool(true)))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// An edge in the metadata graph.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relation: EdgeRelation,
    pub properties: Vec<(String, PropValue)>,
}

impl GraphEdge {
    pub fn new(source: &str, target: &str, relation: EdgeRelation) -> Self {
        Self {
            id: format!("{source}->{target}:{}", relation.name()),
            source: source.to_string(),
            target: target.to_string(),
            relation,
            properties: Vec::new(),
        }
    }

    /// A reference edge keyed by the foreign-key field it hangs off, so two
    /// foreign keys into the same target stay distinct.
    pub fn reference(source: &str, target: &str, on_field: &str) -> Self {
        Self {
            id: format!("{source}->{target}:references:{on_field}"),
            source: source.to_string(),
            target: target.to_string(),
            relation: EdgeRelation::References,
            properties: vec![("on_field".to_string(), PropValue::Text(on_field.to_string()))],
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropValue> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The text of a property, if it is text.
    pub fn text_property(&self, key: &str) -> Option<&str> {
        match self.property(key)? {
            PropValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Deterministic collection node identifier.
pub(crate) fn collection_id(label: &str) -> String {
    format!("collection_{}", label.to_lowercase().replace(' ', "_"))
}

/// Deterministic field node identifier.
pub(crate) fn field_id(collection_label: &str, field_label: &str) -> String {
    format!("{}_{}", collection_id(collection_label), field_label)
}

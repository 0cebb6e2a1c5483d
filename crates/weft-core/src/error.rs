//! Error types for the Weft engine.

use thiserror::Error;

/// Schema validation failures raised while building the metadata graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A foreign key names an entity that is not part of the registry.
    #[error("field '{field}' on entity '{entity}' references unknown entity '{references}'")]
    MissingReferenceTarget {
        entity: String,
        field: String,
        references: String,
    },

    /// An entity declares no primary key field.
    #[error("entity '{entity}' declares no primary key")]
    NoPrimaryKey { entity: String },
}

/// Lookup failures against the metadata graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// No collection node carries this label.
    #[error("collection '{label}' not found in the metadata graph")]
    CollectionNotFound { label: String },

    /// The collection has no field flagged as primary key.
    #[error("entity '{entity}' has no primary key field in the metadata graph")]
    NoPrimaryKey { entity: String },

    /// No reference edge connects the two entities in either direction.
    #[error("no relationship between '{from}' and '{to}'")]
    NoRelationship { from: String, to: String },

    /// An edge exists, but only opposite to the declared direction.
    #[error("relationship between '{from}' and '{to}' does not run {declared}")]
    DirectionMismatch {
        from: String,
        to: String,
        declared: String,
    },

    /// Edges exist in both directions and no direction was declared.
    #[error("relationship between '{from}' and '{to}' is ambiguous, declare a direction")]
    AmbiguousDirection { from: String, to: String },
}

/// Failures raised while planning or validating a query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The query names an entity the graph does not know.
    #[error("unknown entity '{label}'")]
    UnknownEntity { label: String },

    /// A selected field is not declared on its entity.
    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    /// A cross-entity query carried no relation path.
    #[error("relation path is empty")]
    EmptyRelationPath,

    /// A filter used an operator outside the supported set.
    #[error("unsupported filter operator '{op}'")]
    UnsupportedOperator { op: String },
}

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error(transparent)]
    Proto(#[from] weft_proto::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A record would duplicate an existing value in a unique index.
    #[error("unique constraint violated on '{entity}.{field}' for key '{key}'")]
    UniqueViolation {
        entity: String,
        field: String,
        key: String,
    },

    /// A record value does not match the declared field type.
    #[error("type mismatch on '{entity}.{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A record carries a field the entity never declared.
    #[error("field '{field}' is not declared on entity '{entity}'")]
    UndeclaredField { entity: String, field: String },

    /// A record is missing its key field.
    #[error("record is missing key field '{field}' for entity '{entity}'")]
    MissingKeyField { entity: String, field: String },

    /// A key field holds a value that cannot be used as a key.
    #[error("value of '{entity}.{field}' cannot be used as a key")]
    InvalidKey { entity: String, field: String },
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

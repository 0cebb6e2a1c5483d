//! Weft - a metadata-graph query engine over document collections.
//!
//! Weft unifies records from heterogeneous sources (CSV, XML, JSON) into
//! per-entity document collections, describes how those collections relate
//! in a persistent metadata graph, and answers both single-collection
//! filters and multi-hop queries that join documents along declared
//! foreign-key relationships.

pub mod db;
pub mod error;
pub mod graph;
pub mod query;
pub mod registry;
pub mod storage;

pub use db::Weft;
pub use error::{Error, GraphError, QueryError, Result, SchemaError};
pub use graph::{
    EdgeRelation, GraphBuilder, GraphEdge, GraphNode, LinkFields, MetadataGraph, NodeKind,
    PropValue,
};
pub use query::{FilterEvaluator, HopSpec, QueryExecutor, QueryPlan, QueryPlanner};
pub use registry::{
    DataType, EntityDescriptor, FieldDescriptor, Provenance, SchemaRegistry, SourceFormat,
};
pub use storage::{DocumentStore, IngestFailure, IngestReport, StoreConfig};

/// Re-export protocol types.
pub use weft_proto as proto;

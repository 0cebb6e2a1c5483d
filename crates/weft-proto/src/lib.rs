//! Weft protocol types and serialization.
//!
//! This crate defines the JSON wire surface shared by Weft clients and the
//! engine: runtime values, the filter DSL, query request envelopes, and
//! tabular result sets.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for documents, filters, and results
//! - [`document`] - Ordered field/value maps, the unit of ingestion
//! - [`filter`] - The document filter DSL (`$gt`, `$in`, `$exists`, ...)
//! - [`request`] - Query request envelopes (`within` / `across`)
//! - [`result`] - Tabular result sets with prefixed column labels
//! - [`error`] - Protocol error types
//!
//! # Wire format
//!
//! Requests are JSON envelopes dispatched on a `type` tag:
//!
//! ```json
//! {"type": "within", "query": {"collection": "Products", "filter": {"price": {"$gt": 15}}, "select": ["product_name"]}}
//! ```
//!
//! Cross-entity requests carry the relation path in the insertion order of
//! their `projection` keys, so every map type here preserves declaration
//! order end to end.

pub mod document;
pub mod error;
pub mod filter;
pub mod request;
pub mod result;
pub mod value;

pub use document::Document;
pub use error::Error;
pub use filter::{Condition, FieldPredicate, Filter};
pub use request::{Direction, Hop, QueryRequest, RelatedEntityQuery, SingleEntityQuery};
pub use result::RowSet;
pub use value::Value;

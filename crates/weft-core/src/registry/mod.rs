//! Schema registry.
//!
//! Entities declare their fields, key flags, and reference targets here
//! before the metadata graph is built from them. The registry is plain
//! in-memory description; nothing in it touches storage.

mod entity;
mod field;
#[allow(clippy::module_inception)]
mod registry;
mod types;

pub use entity::{EntityDescriptor, Provenance, SourceFormat};
pub use field::FieldDescriptor;
pub use registry::SchemaRegistry;
pub use types::DataType;

//! The metadata graph.
//!
//! Collections and their fields are modelled as nodes, `HasField` and
//! `References` as edges. The graph is rebuilt from the schema registry as
//! a whole and swapped in atomically; readers always see either the old
//! generation or the new one, never a mix.

mod builder;
mod node;
mod store;

pub use builder::GraphBuilder;
pub use node::{EdgeRelation, GraphEdge, GraphNode, NodeKind, PropValue};
pub use store::{LinkFields, MetadataGraph};

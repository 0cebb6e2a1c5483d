//! Graph construction from the schema registry.
//!
//! Building is two passes over the registry. The first pass materializes
//! every collection and field node plus the `HasField` edges; the second
//! wires `References` edges between collections. Any dangling reference
//! fails the whole build before a single byte is persisted, so the previous
//! generation stays live on failure.

use tracing::{info, instrument};

use super::node::{collection_id, EdgeRelation, GraphEdge, GraphNode};
use super::store::MetadataGraph;
use crate::error::{Result, SchemaError};
use crate::registry::{EntityDescriptor, SchemaRegistry};

/// Builds metadata graph generations from a [`SchemaRegistry`].
pub struct GraphBuilder<'a> {
    graph: &'a MetadataGraph,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(graph: &'a MetadataGraph) -> Self {
        Self { graph }
    }

    /// Rebuilds the graph from `registry` and swaps it in atomically.
    /// Returns the new generation number.
    #[instrument(skip_all, fields(entities = registry.len()))]
    pub fn build(&self, registry: &SchemaRegistry) -> Result<u64> {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        // Pass 1: collection and field nodes, ownership edges.
        for entity in registry.entities() {
            if entity.primary_key_field().is_none() {
                return Err(SchemaError::NoPrimaryKey { entity: entity.label.clone() }.into());
            }
            let collection = collection_node(entity);
            for field in &entity.fields {
                let mut node = GraphNode::field(&entity.label, &field.label)
                    .with_property("data_type", field.data_type.name());
                if field.primary_key {
                    node = node.with_property("primary_key", true);
                }
                if field.foreign_key {
                    node = node.with_property("foreign_key", true);
                }
                if let Some(target) = &field.references {
                    node = node.with_property("references", target.clone());
                }
                edges.push(GraphEdge::new(&collection.id, &node.id, EdgeRelation::HasField));
                nodes.push(node);
            }
            nodes.push(collection);
        }

        // Pass 2: reference edges. Every target must be a registered entity.
        for entity in registry.entities() {
            for field in entity.foreign_key_fields() {
                let Some(target_label) = &field.references else {
                    continue;
                };
                let target = registry.get(target_label).ok_or_else(|| {
                    SchemaError::MissingReferenceTarget {
                        entity: entity.label.clone(),
                        field: field.label.clone(),
                        references: target_label.clone(),
                    }
                })?;
                edges.push(GraphEdge::reference(
                    &collection_id(&entity.label),
                    &collection_id(&target.label),
                    &field.label,
                ));
            }
        }

        info!(nodes = nodes.len(), edges = edges.len(), "schema registry validated");
        self.graph.commit(nodes, edges)
    }
}

fn collection_node(entity: &EntityDescriptor) -> GraphNode {
    let mut node = GraphNode::collection(&entity.label);
    if let Some(provenance) = &entity.provenance {
        node = node
            .with_property("source_format", provenance.format.to_string())
            .with_property("source_location", provenance.location.clone());
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::graph::node::PropValue;
    use crate::registry::{DataType, FieldDescriptor, SourceFormat};

    fn university_registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_entity(
                EntityDescriptor::new("Students")
                    .with_provenance(SourceFormat::Csv, "students.csv")
                    .with_field(
                        FieldDescriptor::new("student_id", DataType::Integer).primary_key(),
                    )
                    .with_field(FieldDescriptor::new("name", DataType::Text)),
            )
            .with_entity(
                EntityDescriptor::new("Courses")
                    .with_provenance(SourceFormat::Json, "courses.json")
                    .with_field(FieldDescriptor::new("course_id", DataType::Integer).primary_key())
                    .with_field(FieldDescriptor::new("title", DataType::Text)),
            )
            .with_entity(
                EntityDescriptor::new("Enrollments")
                    .with_provenance(SourceFormat::Xml, "enrollments.xml")
                    .with_field(
                        FieldDescriptor::new("enrollment_id", DataType::Integer).primary_key(),
                    )
                    .with_field(
                        FieldDescriptor::new("student_id", DataType::Integer)
                            .references("Students"),
                    )
                    .with_field(
                        FieldDescriptor::new("course_id", DataType::Integer).references("Courses"),
                    ),
            )
    }

    fn open_graph() -> MetadataGraph {
        let db = sled::Config::new().temporary(true).open().unwrap();
        MetadataGraph::open(&db).unwrap()
    }

    #[test]
    fn build_creates_nodes_and_edges() {
        let graph = open_graph();
        let generation = GraphBuilder::new(&graph).build(&university_registry()).unwrap();
        assert_eq!(generation, 1);
        // 3 collections + 7 fields.
        assert_eq!(graph.node_count(), 10);
        // 7 has_field + 2 references.
        assert_eq!(graph.edge_count(), 9);
        assert_eq!(graph.primary_key_field("Enrollments").unwrap(), "enrollment_id");
    }

    #[test]
    fn provenance_lands_on_the_collection_node() {
        let graph = open_graph();
        GraphBuilder::new(&graph).build(&university_registry()).unwrap();
        let node = graph.collection("Students").unwrap();
        assert_eq!(
            node.property("source_format"),
            Some(&PropValue::Text("csv".into()))
        );
        assert_eq!(
            node.property("source_location"),
            Some(&PropValue::Text("students.csv".into()))
        );
    }

    #[test]
    fn reference_edges_carry_the_owning_field() {
        let graph = open_graph();
        GraphBuilder::new(&graph).build(&university_registry()).unwrap();
        let edge = graph.reference_edge("Enrollments", "Courses").unwrap();
        assert_eq!(edge.text_property("on_field"), Some("course_id"));
        assert_eq!(edge.source, "collection_enrollments");
        assert_eq!(edge.target, "collection_courses");
    }

    #[test]
    fn dangling_reference_fails_the_whole_build() {
        let graph = open_graph();
        GraphBuilder::new(&graph).build(&university_registry()).unwrap();

        let broken = SchemaRegistry::new().with_entity(
            EntityDescriptor::new("Enrollments")
                .with_field(FieldDescriptor::new("enrollment_id", DataType::Integer).primary_key())
                .with_field(
                    FieldDescriptor::new("student_id", DataType::Integer).references("Students"),
                ),
        );
        let err = GraphBuilder::new(&graph).build(&broken).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::MissingReferenceTarget { .. })
        ));
        // The previous generation stays live.
        assert_eq!(graph.generation(), 1);
        assert!(graph.collection_exists("Students"));
    }

    #[test]
    fn entity_without_primary_key_is_rejected() {
        let graph = open_graph();
        let registry = SchemaRegistry::new().with_entity(
            EntityDescriptor::new("Logs").with_field(FieldDescriptor::new("line", DataType::Text)),
        );
        let err = GraphBuilder::new(&graph).build(&registry).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::NoPrimaryKey { .. })));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let graph = open_graph();
        let registry = university_registry();
        GraphBuilder::new(&graph).build(&registry).unwrap();
        let nodes = graph.node_count();
        let edges = graph.edge_count();
        GraphBuilder::new(&graph).build(&registry).unwrap();
        assert_eq!(graph.node_count(), nodes);
        assert_eq!(graph.edge_count(), edges);
        assert_eq!(graph.generation(), 2);
    }
}

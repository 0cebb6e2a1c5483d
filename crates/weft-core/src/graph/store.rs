//! Persistent metadata graph with atomic generation swap.
//!
//! Each rebuild writes a fresh pair of sled trees (`graph:nodes:<gen>`,
//! `graph:edges:<gen>`), flips the generation pointer in the meta tree,
//! swaps the in-memory snapshot, and drops the old trees. Lookups never
//! mutate, so queries racing a rebuild see exactly one generation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sled::{Db, Tree};
use tracing::{debug, info};
use weft_proto::Direction;

use super::node::{collection_id, EdgeRelation, GraphEdge, GraphNode, NodeKind};
use crate::error::{Error, GraphError, Result};

/// Tree name for graph metadata.
const META_TREE: &str = "graph:meta";

/// Tree name prefixes for generation-scoped node and edge trees.
const NODES_TREE_PREFIX: &str = "graph:nodes:";
const EDGES_TREE_PREFIX: &str = "graph:edges:";

/// Key for the current generation in the meta tree.
const GENERATION_KEY: &[u8] = b"current_generation";

/// Edge property naming the foreign-key field a reference hangs off.
pub(crate) const ON_FIELD: &str = "on_field";

/// The field pair a single hop joins on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFields {
    /// Join field on the entity the hop starts from.
    pub current_field: String,
    /// Join field on the entity the hop lands on.
    pub target_field: String,
}

/// Immutable read view of one graph generation.
#[derive(Debug, Default)]
struct GraphSnapshot {
    /// Collection nodes keyed by label.
    collections: HashMap<String, GraphNode>,
    /// Field nodes per collection label, in declaration order.
    fields: HashMap<String, Vec<GraphNode>>,
    /// All reference edges, in build order.
    references: Vec<GraphEdge>,
    node_count: usize,
    edge_count: usize,
}

impl GraphSnapshot {
    fn from_parts(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        let node_count = nodes.len();
        let edge_count = edges.len();

        let mut by_id: HashMap<String, GraphNode> = HashMap::with_capacity(nodes.len());
        let mut collections = HashMap::new();
        let mut label_by_id = HashMap::new();
        for node in nodes {
            if node.kind == NodeKind::Collection {
                label_by_id.insert(node.id.clone(), node.label.clone());
                collections.insert(node.label.clone(), node.clone());
            }
            by_id.insert(node.id.clone(), node);
        }

        let mut fields: HashMap<String, Vec<GraphNode>> = HashMap::new();
        let mut references = Vec::new();
        for edge in edges {
            match edge.relation {
                EdgeRelation::HasField => {
                    if let (Some(label), Some(field)) =
                        (label_by_id.get(&edge.source), by_id.get(&edge.target))
                    {
                        fields.entry(label.clone()).or_default().push(field.clone());
                    }
                }
                EdgeRelation::References => references.push(edge),
            }
        }

        Self { collections, fields, references, node_count, edge_count }
    }

    fn reference_between(&self, source_id: &str, target_id: &str) -> Option<&GraphEdge> {
        self.references
            .iter()
            .find(|e| e.source == source_id && e.target == target_id)
    }

    fn primary_key_of(&self, entity: &str) -> Option<String> {
        self.fields
            .get(entity)
            .and_then(|fields| fields.iter().find(|f| f.flag("primary_key")))
            .map(|f| f.label.clone())
    }
}

/// The metadata graph store.
pub struct MetadataGraph {
    db: Db,
    meta_tree: Tree,
    /// Current generation (cached).
    generation: AtomicU64,
    /// Current snapshot (cached).
    snapshot: RwLock<Arc<GraphSnapshot>>,
}

impl MetadataGraph {
    /// Open the graph store, loading the current generation if one exists.
    pub fn open(db: &Db) -> Result<Self> {
        let meta_tree = db.open_tree(META_TREE)?;

        let generation = match meta_tree.get(GENERATION_KEY)? {
            Some(bytes) => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                u64::from_be_bytes(buf)
            }
            None => 0,
        };

        let snapshot = if generation > 0 {
            Self::load_snapshot(db, generation)?
        } else {
            GraphSnapshot::default()
        };

        Ok(Self {
            db: db.clone(),
            meta_tree,
            generation: AtomicU64::new(generation),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    fn load_snapshot(db: &Db, generation: u64) -> Result<GraphSnapshot> {
        let nodes_tree = db.open_tree(format!("{NODES_TREE_PREFIX}{generation}"))?;
        let edges_tree = db.open_tree(format!("{EDGES_TREE_PREFIX}{generation}"))?;

        let mut nodes = Vec::new();
        for entry in nodes_tree.iter() {
            let (_, bytes) = entry?;
            nodes.push(GraphNode::from_bytes(&bytes)?);
        }
        let mut edges = Vec::new();
        for entry in edges_tree.iter() {
            let (_, bytes) = entry?;
            edges.push(GraphEdge::from_bytes(&bytes)?);
        }
        Ok(GraphSnapshot::from_parts(nodes, edges))
    }

    /// Persist a freshly built generation and make it current.
    ///
    /// Writes the new trees first, then flips the generation pointer, then
    /// drops the previous generation's trees. A failure before the flip
    /// leaves the old generation fully intact.
    pub(crate) fn commit(&self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Result<u64> {
        let current = self.generation.load(Ordering::SeqCst);
        let next = current + 1;

        let nodes_tree = self.db.open_tree(format!("{NODES_TREE_PREFIX}{next}"))?;
        let edges_tree = self.db.open_tree(format!("{EDGES_TREE_PREFIX}{next}"))?;
        // A build that failed after opening its trees may have left data here.
        nodes_tree.clear()?;
        edges_tree.clear()?;

        // Keys are build-order sequence numbers so iteration preserves
        // declaration order.
        for (seq, node) in nodes.iter().enumerate() {
            nodes_tree.insert((seq as u64).to_be_bytes(), node.to_bytes()?)?;
        }
        for (seq, edge) in edges.iter().enumerate() {
            edges_tree.insert((seq as u64).to_be_bytes(), edge.to_bytes()?)?;
        }

        self.meta_tree.insert(GENERATION_KEY, &next.to_be_bytes())?;

        let snapshot = GraphSnapshot::from_parts(nodes, edges);
        info!(
            generation = next,
            nodes = snapshot.node_count,
            edges = snapshot.edge_count,
            "metadata graph generation committed"
        );
        *self.snapshot.write() = Arc::new(snapshot);
        self.generation.store(next, Ordering::SeqCst);

        if current > 0 {
            self.db.drop_tree(format!("{NODES_TREE_PREFIX}{current}"))?;
            self.db.drop_tree(format!("{EDGES_TREE_PREFIX}{current}"))?;
        }

        Ok(next)
    }

    /// The current graph generation. Zero means no graph has been built.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn node_count(&self) -> usize {
        self.snapshot.read().node_count
    }

    pub fn edge_count(&self) -> usize {
        self.snapshot.read().edge_count
    }

    pub fn collection_exists(&self, label: &str) -> bool {
        self.snapshot.read().collections.contains_key(label)
    }

    /// The collection node carrying `label`.
    pub fn collection(&self, label: &str) -> Result<GraphNode> {
        self.snapshot
            .read()
            .collections
            .get(label)
            .cloned()
            .ok_or_else(|| GraphError::CollectionNotFound { label: label.to_string() }.into())
    }

    /// Field labels of a collection, in declaration order.
    pub fn field_labels(&self, label: &str) -> Result<Vec<String>> {
        let snapshot = self.snapshot.read();
        if !snapshot.collections.contains_key(label) {
            return Err(GraphError::CollectionNotFound { label: label.to_string() }.into());
        }
        Ok(snapshot
            .fields
            .get(label)
            .map(|fields| fields.iter().map(|f| f.label.clone()).collect())
            .unwrap_or_default())
    }

    /// The first field flagged as primary key on `entity`.
    pub fn primary_key_field(&self, entity: &str) -> Result<String> {
        let snapshot = self.snapshot.read();
        if !snapshot.collections.contains_key(entity) {
            return Err(GraphError::CollectionNotFound { label: entity.to_string() }.into());
        }
        snapshot
            .primary_key_of(entity)
            .ok_or_else(|| GraphError::NoPrimaryKey { entity: entity.to_string() }.into())
    }

    /// The reference edge between two entities, trying `from -> to` first
    /// and the reverse second.
    pub fn reference_edge(&self, from: &str, to: &str) -> Result<GraphEdge> {
        let snapshot = self.snapshot.read();
        for label in [from, to] {
            if !snapshot.collections.contains_key(label) {
                return Err(GraphError::CollectionNotFound { label: label.to_string() }.into());
            }
        }
        let from_id = collection_id(from);
        let to_id = collection_id(to);
        snapshot
            .reference_between(&from_id, &to_id)
            .or_else(|| snapshot.reference_between(&to_id, &from_id))
            .cloned()
            .ok_or_else(|| {
                GraphError::NoRelationship { from: from.to_string(), to: to.to_string() }.into()
            })
    }

    /// Infers which way a hop from `current` to `target` follows the
    /// reference edge. Fails when edges run both ways or neither way.
    pub fn infer_direction(&self, current: &str, target: &str) -> Result<Direction> {
        self.resolve_link_fields(current, target, None)
            .map(|(direction, _)| direction)
    }

    /// Resolves the join fields for one hop from `current` to `target`.
    ///
    /// With a declared direction the matching edge must exist; an edge
    /// running only the other way is a direction mismatch. Without one the
    /// direction is inferred, and edges both ways make the hop ambiguous.
    pub fn resolve_link_fields(
        &self,
        current: &str,
        target: &str,
        declared: Option<Direction>,
    ) -> Result<(Direction, LinkFields)> {
        // One snapshot answers every lookup of the resolution, so a rebuild
        // landing mid-resolve cannot mix generations.
        let snapshot = Arc::clone(&self.snapshot.read());
        for label in [current, target] {
            if !snapshot.collections.contains_key(label) {
                return Err(GraphError::CollectionNotFound { label: label.to_string() }.into());
            }
        }
        let current_id = collection_id(current);
        let target_id = collection_id(target);
        let outward = snapshot.reference_between(&current_id, &target_id).cloned();
        let inward = snapshot.reference_between(&target_id, &current_id).cloned();

        let direction = match declared {
            Some(Direction::Outward) => {
                if outward.is_none() {
                    return Err(direction_failure(current, target, inward.is_some(), "outward"));
                }
                Direction::Outward
            }
            Some(Direction::Inward) => {
                if inward.is_none() {
                    return Err(direction_failure(current, target, outward.is_some(), "inward"));
                }
                Direction::Inward
            }
            None => match (&outward, &inward) {
                (Some(_), Some(_)) => {
                    return Err(GraphError::AmbiguousDirection {
                        from: current.to_string(),
                        to: target.to_string(),
                    }
                    .into())
                }
                (Some(_), None) => Direction::Outward,
                (None, Some(_)) => Direction::Inward,
                (None, None) => {
                    return Err(GraphError::NoRelationship {
                        from: current.to_string(),
                        to: target.to_string(),
                    }
                    .into())
                }
            },
        };

        let link = match direction {
            Direction::Outward => {
                let edge = outward.ok_or_else(|| GraphError::NoRelationship {
                    from: current.to_string(),
                    to: target.to_string(),
                })?;
                LinkFields {
                    current_field: edge_on_field(&edge)?,
                    target_field: snapshot
                        .primary_key_of(target)
                        .ok_or_else(|| GraphError::NoPrimaryKey { entity: target.to_string() })?,
                }
            }
            Direction::Inward => {
                let edge = inward.ok_or_else(|| GraphError::NoRelationship {
                    from: current.to_string(),
                    to: target.to_string(),
                })?;
                LinkFields {
                    current_field: snapshot
                        .primary_key_of(current)
                        .ok_or_else(|| GraphError::NoPrimaryKey { entity: current.to_string() })?,
                    target_field: edge_on_field(&edge)?,
                }
            }
        };

        debug!(
            from = current,
            to = target,
            direction = %direction,
            current_field = %link.current_field,
            target_field = %link.target_field,
            "resolved link fields"
        );
        Ok((direction, link))
    }
}

fn direction_failure(from: &str, to: &str, opposite_exists: bool, declared: &str) -> Error {
    if opposite_exists {
        GraphError::DirectionMismatch {
            from: from.to_string(),
            to: to.to_string(),
            declared: declared.to_string(),
        }
        .into()
    } else {
        GraphError::NoRelationship { from: from.to_string(), to: to.to_string() }.into()
    }
}

fn edge_on_field(edge: &GraphEdge) -> Result<String> {
    edge.text_property(ON_FIELD)
        .map(str::to_string)
        .ok_or_else(|| Error::Deserialization(format!("reference edge '{}' has no on_field", edge.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::PropValue;

    fn sample_parts() -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let students = GraphNode::collection("Students");
        let students_id = GraphNode::field("Students", "student_id")
            .with_property("primary_key", true)
            .with_property("data_type", "integer");
        let students_name =
            GraphNode::field("Students", "name").with_property("data_type", "text");
        let enrollments = GraphNode::collection("Enrollments");
        let enrollment_id = GraphNode::field("Enrollments", "enrollment_id")
            .with_property("primary_key", true);
        let enrollment_student = GraphNode::field("Enrollments", "student_id")
            .with_property("foreign_key", true)
            .with_property("references", "Students");

        let edges = vec![
            GraphEdge::new(&students.id, &students_id.id, EdgeRelation::HasField),
            GraphEdge::new(&students.id, &students_name.id, EdgeRelation::HasField),
            GraphEdge::new(&enrollments.id, &enrollment_id.id, EdgeRelation::HasField),
            GraphEdge::new(&enrollments.id, &enrollment_student.id, EdgeRelation::HasField),
            GraphEdge::new(&enrollments.id, &students.id, EdgeRelation::References)
                .with_property(ON_FIELD, "student_id"),
        ];
        let nodes = vec![
            students,
            students_id,
            students_name,
            enrollments,
            enrollment_id,
            enrollment_student,
        ];
        (nodes, edges)
    }

    fn open_graph() -> (MetadataGraph, Db) {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let graph = MetadataGraph::open(&db).unwrap();
        (graph, db)
    }

    #[test]
    fn empty_store_starts_at_generation_zero() {
        let (graph, _db) = open_graph();
        assert_eq!(graph.generation(), 0);
        assert!(!graph.collection_exists("Students"));
    }

    #[test]
    fn commit_makes_lookups_visible() {
        let (graph, _db) = open_graph();
        let (nodes, edges) = sample_parts();
        let generation = graph.commit(nodes, edges).unwrap();
        assert_eq!(generation, 1);
        assert!(graph.collection_exists("Students"));
        assert_eq!(graph.primary_key_field("Students").unwrap(), "student_id");
        assert_eq!(
            graph.field_labels("Students").unwrap(),
            vec!["student_id", "name"]
        );
    }

    #[test]
    fn reference_edge_is_found_in_both_directions() {
        let (graph, _db) = open_graph();
        let (nodes, edges) = sample_parts();
        graph.commit(nodes, edges).unwrap();
        let forward = graph.reference_edge("Enrollments", "Students").unwrap();
        let backward = graph.reference_edge("Students", "Enrollments").unwrap();
        assert_eq!(forward.id, backward.id);
        assert_eq!(forward.text_property(ON_FIELD), Some("student_id"));
    }

    #[test]
    fn resolve_is_symmetric_across_directions() {
        let (graph, _db) = open_graph();
        let (nodes, edges) = sample_parts();
        graph.commit(nodes, edges).unwrap();

        let (direction, link) = graph
            .resolve_link_fields("Enrollments", "Students", None)
            .unwrap();
        assert_eq!(direction, Direction::Outward);
        assert_eq!(link.current_field, "student_id");
        assert_eq!(link.target_field, "student_id");

        let (direction, mirrored) = graph
            .resolve_link_fields("Students", "Enrollments", None)
            .unwrap();
        assert_eq!(direction, Direction::Inward);
        assert_eq!(mirrored.current_field, link.target_field);
        assert_eq!(mirrored.target_field, link.current_field);
    }

    #[test]
    fn declared_direction_must_match_the_edge() {
        let (graph, _db) = open_graph();
        let (nodes, edges) = sample_parts();
        graph.commit(nodes, edges).unwrap();
        let err = graph
            .resolve_link_fields("Enrollments", "Students", Some(Direction::Inward))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Graph(GraphError::DirectionMismatch { .. })
        ));
    }

    #[test]
    fn inference_is_explicit_about_ambiguity() {
        let (graph, _db) = open_graph();
        let (nodes, mut edges) = sample_parts();
        // A back-reference makes both directions resolvable.
        edges.push(
            GraphEdge::new(
                "collection_students",
                "collection_enrollments",
                EdgeRelation::References,
            )
            .with_property(ON_FIELD, "student_id"),
        );
        graph.commit(nodes, edges).unwrap();

        let err = graph.infer_direction("Enrollments", "Students").unwrap_err();
        assert!(matches!(
            err,
            Error::Graph(GraphError::AmbiguousDirection { .. })
        ));
        // A declared direction still resolves.
        assert!(graph
            .resolve_link_fields("Enrollments", "Students", Some(Direction::Outward))
            .is_ok());
    }

    #[test]
    fn unrelated_entities_fail_with_no_relationship() {
        let (graph, _db) = open_graph();
        let (mut nodes, edges) = sample_parts();
        nodes.push(GraphNode::collection("Products"));
        graph.commit(nodes, edges).unwrap();
        let err = graph
            .resolve_link_fields("Students", "Products", None)
            .unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::NoRelationship { .. })));
    }

    #[test]
    fn resolution_never_mixes_generations() {
        let (graph, _db) = open_graph();

        // Two schema variants whose field names pair up unambiguously, so a
        // resolve spanning two generations would produce a mismatched pair.
        fn variant(fk: &str, pk: &str) -> (Vec<GraphNode>, Vec<GraphEdge>) {
            let students = GraphNode::collection("Students");
            let students_pk = GraphNode::field("Students", pk).with_property("primary_key", true);
            let enrollments = GraphNode::collection("Enrollments");
            let enrollments_fk =
                GraphNode::field("Enrollments", fk).with_property("foreign_key", true);
            let edges = vec![
                GraphEdge::new(&students.id, &students_pk.id, EdgeRelation::HasField),
                GraphEdge::new(&enrollments.id, &enrollments_fk.id, EdgeRelation::HasField),
                GraphEdge::reference(&enrollments.id, &students.id, fk),
            ];
            (vec![students, students_pk, enrollments, enrollments_fk], edges)
        }

        let (nodes, edges) = variant("fk_a", "id_a");
        graph.commit(nodes, edges).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..100 {
                    let (nodes, edges) = if round % 2 == 0 {
                        variant("fk_b", "id_b")
                    } else {
                        variant("fk_a", "id_a")
                    };
                    graph.commit(nodes, edges).unwrap();
                }
            });
            for _ in 0..500 {
                let (_, link) = graph
                    .resolve_link_fields("Enrollments", "Students", Some(Direction::Outward))
                    .unwrap();
                let pair = (link.current_field.as_str(), link.target_field.as_str());
                assert!(
                    pair == ("fk_a", "id_a") || pair == ("fk_b", "id_b"),
                    "fields span two generations: {pair:?}"
                );
            }
        });
    }

    #[test]
    fn recommit_replaces_the_previous_generation() {
        let (graph, db) = open_graph();
        let (nodes, edges) = sample_parts();
        graph.commit(nodes, edges).unwrap();

        let products = GraphNode::collection("Products");
        let price = GraphNode::field("Products", "price").with_property("primary_key", true);
        let edges = vec![GraphEdge::new(&products.id, &price.id, EdgeRelation::HasField)];
        let generation = graph.commit(vec![products, price], edges).unwrap();

        assert_eq!(generation, 2);
        assert!(graph.collection_exists("Products"));
        assert!(!graph.collection_exists("Students"));
        // Old generation trees are gone.
        let names: Vec<String> = db
            .tree_names()
            .into_iter()
            .map(|n| String::from_utf8_lossy(&n).into_owned())
            .collect();
        assert!(!names.iter().any(|n| n == "graph:nodes:1"));
        assert!(names.iter().any(|n| n == "graph:nodes:2"));
    }

    #[test]
    fn reopen_restores_the_current_generation() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::Config::new().path(dir.path()).open().unwrap();
        {
            let graph = MetadataGraph::open(&db).unwrap();
            let (nodes, edges) = sample_parts();
            graph.commit(nodes, edges).unwrap();
        }
        let reopened = MetadataGraph::open(&db).unwrap();
        assert_eq!(reopened.generation(), 1);
        assert_eq!(reopened.primary_key_field("Students").unwrap(), "student_id");
        assert_eq!(
            reopened.field_labels("Enrollments").unwrap(),
            vec!["enrollment_id", "student_id"]
        );
        let node = reopened.collection("Students").unwrap();
        assert!(matches!(node.property("label"), None));
        assert_eq!(node.properties, Vec::<(String, PropValue)>::new());
    }
}

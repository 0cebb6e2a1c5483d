//! Query planning.
//!
//! The planner turns a caller-supplied relation path into an executable
//! sequence of hops. There is no path search: the path is taken exactly as
//! given, each hop is resolved against the metadata graph, and any failure
//! rejects the whole query before execution touches storage.

use tracing::{debug, instrument};
use weft_proto::{Direction, Filter, RelatedEntityQuery};

use crate::error::{QueryError, Result};
use crate::graph::MetadataGraph;

/// One resolved join step.
#[derive(Debug, Clone, PartialEq)]
pub struct HopSpec {
    pub from_entity: String,
    pub to_entity: String,
    /// Join field on the source side.
    pub from_field: String,
    /// Join field on the target side.
    pub to_field: String,
    pub direction: Direction,
    /// Whether `from_field` is fetched only to feed the join. The executor
    /// adds it to the fetch projection when set and omits it otherwise,
    /// since the select already covers it.
    pub carry: bool,
}

/// A fully resolved cross-entity query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub start_entity: String,
    /// Applied to the start entity only.
    pub filter: Filter,
    pub hops: Vec<HopSpec>,
    /// Selections per entity in request order, expanded and validated.
    pub select: Vec<(String, Vec<String>)>,
}

impl QueryPlan {
    /// The validated output fields for `entity`. Empty when the entity is a
    /// pure bridge.
    pub fn selected(&self, entity: &str) -> &[String] {
        self.select
            .iter()
            .find(|(e, _)| e == entity)
            .map(|(_, fields)| fields.as_slice())
            .unwrap_or(&[])
    }

    /// Output column labels, entity-prefixed, in request order.
    pub fn output_columns(&self) -> Vec<String> {
        self.select
            .iter()
            .flat_map(|(entity, fields)| {
                fields.iter().map(move |field| format!("{entity}.{field}"))
            })
            .collect()
    }
}

/// Plans cross-entity queries against the metadata graph.
pub struct QueryPlanner<'a> {
    graph: &'a MetadataGraph,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(graph: &'a MetadataGraph) -> Self {
        Self { graph }
    }

    #[instrument(skip_all, fields(start = %query.start_entity))]
    pub fn plan(&self, query: &RelatedEntityQuery) -> Result<QueryPlan> {
        if query.path.is_empty() {
            return Err(QueryError::EmptyRelationPath.into());
        }

        let mut path_entities = vec![query.start_entity.clone()];
        let mut hops = Vec::with_capacity(query.path.len());
        let mut current = query.start_entity.clone();
        for hop in &query.path {
            let (direction, link) =
                self.graph
                    .resolve_link_fields(&current, &hop.target_entity, hop.direction)?;
            hops.push(HopSpec {
                from_entity: current.clone(),
                to_entity: hop.target_entity.clone(),
                from_field: link.current_field,
                to_field: link.target_field,
                direction,
                carry: false,
            });
            path_entities.push(hop.target_entity.clone());
            current = hop.target_entity.clone();
        }

        let select = self.normalize_select(query, &path_entities)?;

        for hop in &mut hops {
            let selected = select
                .iter()
                .find(|(e, _)| *e == hop.from_entity)
                .map(|(_, fields)| fields.as_slice())
                .unwrap_or(&[]);
            hop.carry = !selected.contains(&hop.from_field);
        }

        debug!(hops = hops.len(), columns = select.len(), "query planned");
        Ok(QueryPlan {
            start_entity: query.start_entity.clone(),
            filter: query.filter.clone(),
            hops,
            select,
        })
    }

    /// Expands empty field lists to every declared field and validates that
    /// selected entities sit on the path and selected fields exist.
    fn normalize_select(
        &self,
        query: &RelatedEntityQuery,
        path_entities: &[String],
    ) -> Result<Vec<(String, Vec<String>)>> {
        let mut select = Vec::with_capacity(query.select.len());
        for (entity, fields) in &query.select {
            if !path_entities.contains(entity) {
                return Err(QueryError::UnknownEntity { label: entity.clone() }.into());
            }
            let declared = self.graph.field_labels(entity)?;
            let fields = if fields.is_empty() {
                declared
            } else {
                for field in fields {
                    if !declared.contains(field) {
                        return Err(QueryError::UnknownField {
                            entity: entity.clone(),
                            field: field.clone(),
                        }
                        .into());
                    }
                }
                fields.clone()
            };
            select.push((entity.clone(), fields));
        }
        Ok(select)
    }
}

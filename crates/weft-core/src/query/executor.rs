//! Query execution.
//!
//! Single-entity queries are one filtered scan. Cross-entity queries walk
//! the plan hop by hop: collect the distinct join keys from the current
//! rows, fetch matching targets in one batched `$in` scan, hash the targets
//! by join key, and fan out one output row per match. Bridge fields fetched
//! only to feed a join never reach the output.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};
use weft_proto::{Filter, QueryRequest, RowSet, SingleEntityQuery, Value};

use super::planner::{QueryPlan, QueryPlanner};
use crate::error::{QueryError, Result};
use crate::graph::MetadataGraph;
use crate::storage::{encode_key, DocumentStore};

/// Executes query requests against the store and the metadata graph.
pub struct QueryExecutor<'a> {
    store: &'a DocumentStore,
    graph: &'a MetadataGraph,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(store: &'a DocumentStore, graph: &'a MetadataGraph) -> Self {
        Self { store, graph }
    }

    #[instrument(skip_all)]
    pub fn execute(&self, request: &QueryRequest) -> Result<RowSet> {
        match request {
            QueryRequest::Within(query) => self.execute_single(query),
            QueryRequest::Across(query) => {
                let plan = QueryPlanner::new(self.graph).plan(query)?;
                self.execute_plan(&plan)
            }
        }
    }

    /// Runs a filtered scan over one collection.
    pub fn execute_single(&self, query: &SingleEntityQuery) -> Result<RowSet> {
        let declared = self.graph.field_labels(&query.collection)?;
        let fields = if query.select.is_empty() {
            declared
        } else {
            for field in &query.select {
                if !declared.contains(field) {
                    return Err(QueryError::UnknownField {
                        entity: query.collection.clone(),
                        field: field.clone(),
                    }
                    .into());
                }
            }
            query.select.clone()
        };

        let docs = self.store.find(&query.collection, &query.filter, Some(&fields))?;
        let columns = fields
            .iter()
            .map(|f| format!("{}.{f}", query.collection))
            .collect();
        let mut rows = RowSet::new(columns);
        for doc in docs {
            rows.push_row(
                fields
                    .iter()
                    .map(|f| doc.get(f).cloned().unwrap_or(Value::Null))
                    .collect(),
            );
        }
        Ok(rows)
    }

    /// Runs a resolved cross-entity plan.
    pub fn execute_plan(&self, plan: &QueryPlan) -> Result<RowSet> {
        let columns = plan.output_columns();

        // Stage 0: filtered scan of the start entity.
        let first_hop = plan
            .hops
            .first()
            .ok_or(QueryError::EmptyRelationPath)?;
        let mut wanted = plan.selected(&plan.start_entity).to_vec();
        if first_hop.carry {
            wanted.push(first_hop.from_field.clone());
        }
        let docs = self.store.find(&plan.start_entity, &plan.filter, Some(&wanted))?;

        let mut rows: Vec<HashMap<String, Value>> = docs
            .into_iter()
            .map(|doc| {
                doc.into_fields()
                    .into_iter()
                    .map(|(field, value)| (format!("{}.{field}", plan.start_entity), value))
                    .collect()
            })
            .collect();

        for (index, hop) in plan.hops.iter().enumerate() {
            if rows.is_empty() {
                break;
            }
            let key_column = format!("{}.{}", hop.from_entity, hop.from_field);

            // Distinct join keys across the current rows.
            let mut seen: HashSet<Vec<u8>> = HashSet::new();
            let mut keys: Vec<Value> = Vec::new();
            for row in &rows {
                if let Some(value) = row.get(&key_column) {
                    if let Some(encoded) = encode_key(value) {
                        if seen.insert(encoded) {
                            keys.push(value.clone());
                        }
                    }
                }
            }
            if keys.is_empty() {
                rows.clear();
                break;
            }

            let mut wanted = plan.selected(&hop.to_entity).to_vec();
            push_unique(&mut wanted, &hop.to_field);
            if let Some(next) = plan.hops.get(index + 1) {
                // Only carry the next hop's join field when the select does
                // not already ask for it.
                if next.carry {
                    push_unique(&mut wanted, &next.from_field);
                }
            }

            debug!(
                from = %hop.from_entity,
                to = %hop.to_entity,
                keys = keys.len(),
                "fetching hop targets"
            );
            let filter = Filter::new().is_in(hop.to_field.clone(), keys);
            let fetched = self.store.find(&hop.to_entity, &filter, Some(&wanted))?;

            // Hash the fetched side by join key, then fan out per match.
            let mut lookup: HashMap<Vec<u8>, Vec<weft_proto::Document>> = HashMap::new();
            for doc in fetched {
                if let Some(encoded) = doc.get(&hop.to_field).and_then(encode_key) {
                    lookup.entry(encoded).or_default().push(doc);
                }
            }

            let mut joined = Vec::new();
            for row in &rows {
                let Some(encoded) = row.get(&key_column).and_then(encode_key) else {
                    continue;
                };
                let Some(matches) = lookup.get(&encoded) else {
                    continue;
                };
                for doc in matches {
                    let mut merged = row.clone();
                    for (field, value) in doc.fields() {
                        merged.insert(format!("{}.{field}", hop.to_entity), value.clone());
                    }
                    joined.push(merged);
                }
            }
            rows = joined;
        }

        let mut out = RowSet::new(columns.clone());
        for row in rows {
            out.push_row(
                columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                    .collect(),
            );
        }
        debug!(rows = out.len(), "cross-entity query finished");
        Ok(out)
    }
}

fn push_unique(fields: &mut Vec<String>, field: &str) {
    if !fields.iter().any(|f| f == field) {
        fields.push(field.to_string());
    }
}

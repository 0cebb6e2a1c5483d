//! The top-level engine facade.

use tracing::info;
use weft_proto::{Document, QueryRequest, RowSet};

use crate::error::{Error, QueryError, Result, SchemaError};
use crate::graph::{GraphBuilder, MetadataGraph};
use crate::query::QueryExecutor;
use crate::registry::SchemaRegistry;
use crate::storage::{DocumentStore, IngestReport, StoreConfig};

/// One Weft instance: a document store and a metadata graph sharing a
/// single sled database.
pub struct Weft {
    db: sled::Db,
    store: DocumentStore,
    graph: MetadataGraph,
}

impl Weft {
    /// Opens (or creates) an instance at the configured path.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let db = config.to_sled_config().open()?;
        let store = DocumentStore::new(&db);
        let graph = MetadataGraph::open(&db)?;
        info!(generation = graph.generation(), "weft instance opened");
        Ok(Self { db, store, graph })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn graph(&self) -> &MetadataGraph {
        &self.graph
    }

    /// Rebuilds the metadata graph from `registry`, atomically replacing
    /// the previous generation. Returns the new generation number.
    pub fn build_graph(&self, registry: &SchemaRegistry) -> Result<u64> {
        GraphBuilder::new(&self.graph).build(registry)
    }

    /// Ingests a batch of documents into `entity`, keyed by its declared
    /// primary key.
    pub fn ingest(
        &self,
        registry: &SchemaRegistry,
        entity: &str,
        records: Vec<Document>,
    ) -> Result<IngestReport> {
        let descriptor = registry
            .get(entity)
            .ok_or_else(|| QueryError::UnknownEntity { label: entity.to_string() })?;
        let key_field = descriptor
            .primary_key_field()
            .ok_or_else(|| SchemaError::NoPrimaryKey { entity: entity.to_string() })?;
        self.store.upsert_many(descriptor, records, &key_field.label)
    }

    /// Declares a unique index on `entity.field`, enforced on ingestion.
    pub fn ensure_unique_index(&self, entity: &str, field: &str) -> Result<()> {
        self.store.ensure_unique_index(entity, field)
    }

    /// Executes a parsed query request.
    pub fn execute(&self, request: &QueryRequest) -> Result<RowSet> {
        QueryExecutor::new(&self.store, &self.graph).execute(request)
    }

    /// Parses and executes a JSON query envelope.
    pub fn execute_json(&self, raw: &str) -> Result<RowSet> {
        let request = QueryRequest::from_json_str(raw).map_err(|e| match e {
            weft_proto::Error::UnsupportedOperator { op } => {
                Error::Query(QueryError::UnsupportedOperator { op })
            }
            other => Error::Proto(other),
        })?;
        self.execute(&request)
    }

    /// Flushes buffered writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

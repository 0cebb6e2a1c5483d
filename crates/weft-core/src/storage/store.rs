//! The document store.

use sled::{Db, Tree};
use tracing::debug;
use weft_proto::{Document, Filter};

use super::codec::{decode_document, encode_document, encode_key};
use super::record::StoredRecord;
use crate::error::{Error, Result};
use crate::query::FilterEvaluator;
use crate::registry::EntityDescriptor;

/// Tree name prefixes for per-entity data and unique index trees.
const DATA_TREE_PREFIX: &str = "data:";
const INDEX_TREE_PREFIX: &str = "index:";

/// Outcome of a batch ingestion. Valid records land even when others fail.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Number of records written.
    pub upserted: usize,
    /// Rejected records with their input position.
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single rejected record.
#[derive(Debug)]
pub struct IngestFailure {
    /// Position of the record in the input batch.
    pub index: usize,
    pub error: Error,
}

/// Per-entity document storage on sled trees.
pub struct DocumentStore {
    db: Db,
}

impl DocumentStore {
    pub fn new(db: &Db) -> Self {
        Self { db: db.clone() }
    }

    fn data_tree(&self, entity: &str) -> Result<Tree> {
        Ok(self.db.open_tree(format!("{DATA_TREE_PREFIX}{entity}"))?)
    }

    /// Creates the unique index tree for `entity.field` if it does not
    /// exist. Idempotent.
    pub fn ensure_unique_index(&self, entity: &str, field: &str) -> Result<()> {
        self.db.open_tree(index_tree_name(entity, field))?;
        Ok(())
    }

    /// The unique indexes declared for `entity`, discovered from tree names.
    fn unique_indexes(&self, entity: &str) -> Result<Vec<(String, Tree)>> {
        let prefix = format!("{INDEX_TREE_PREFIX}{entity}:");
        let mut indexes = Vec::new();
        for name in self.db.tree_names() {
            let name = String::from_utf8_lossy(&name).into_owned();
            if let Some(field) = name.strip_prefix(&prefix) {
                indexes.push((field.to_string(), self.db.open_tree(&name)?));
            }
        }
        Ok(indexes)
    }

    /// Upserts a batch of documents keyed by `key_field`.
    ///
    /// Each record is validated against the entity's declared fields and
    /// checked against every unique index. Invalid records are reported and
    /// skipped; a storage failure aborts the whole batch.
    pub fn upsert_many(
        &self,
        entity: &EntityDescriptor,
        documents: Vec<Document>,
        key_field: &str,
    ) -> Result<IngestReport> {
        let data = self.data_tree(&entity.label)?;
        let indexes = self.unique_indexes(&entity.label)?;

        let mut report = IngestReport::default();
        for (index, doc) in documents.into_iter().enumerate() {
            match self.upsert_one(entity, &doc, key_field, &data, &indexes) {
                Ok(()) => report.upserted += 1,
                Err(Error::Storage(e)) => return Err(Error::Storage(e)),
                Err(error) => report.failures.push(IngestFailure { index, error }),
            }
        }
        debug!(
            entity = %entity.label,
            upserted = report.upserted,
            failed = report.failures.len(),
            "batch upsert finished"
        );
        Ok(report)
    }

    fn upsert_one(
        &self,
        entity: &EntityDescriptor,
        doc: &Document,
        key_field: &str,
        data: &Tree,
        indexes: &[(String, Tree)],
    ) -> Result<()> {
        for (name, value) in doc.fields() {
            let field = entity.field(name).ok_or_else(|| Error::UndeclaredField {
                entity: entity.label.clone(),
                field: name.clone(),
            })?;
            if !field.data_type.matches(value) {
                return Err(Error::TypeMismatch {
                    entity: entity.label.clone(),
                    field: name.clone(),
                    expected: field.data_type.name(),
                    actual: value.type_name(),
                });
            }
        }

        let key_value = doc.get(key_field).ok_or_else(|| Error::MissingKeyField {
            entity: entity.label.clone(),
            field: key_field.to_string(),
        })?;
        let key = encode_key(key_value).ok_or_else(|| Error::InvalidKey {
            entity: entity.label.clone(),
            field: key_field.to_string(),
        })?;

        // Check every unique index before touching any of them.
        for (field, tree) in indexes {
            let Some(value) = doc.get(field) else { continue };
            let Some(encoded) = encode_key(value) else { continue };
            if let Some(owner) = tree.get(&encoded)? {
                if owner.as_ref() != key.as_slice() {
                    return Err(Error::UniqueViolation {
                        entity: entity.label.clone(),
                        field: field.clone(),
                        key: value.to_string(),
                    });
                }
            }
        }

        // Drop index entries the overwrite invalidates.
        if let Some(existing) = data.get(&key)? {
            let record = StoredRecord::from_bytes(&existing)?;
            let previous = decode_document(&record.data)?;
            for (field, tree) in indexes {
                if let Some(old) = previous.get(field).and_then(encode_key) {
                    if doc.get(field).and_then(encode_key).as_ref() != Some(&old) {
                        tree.remove(old)?;
                    }
                }
            }
        }

        for (field, tree) in indexes {
            if let Some(encoded) = doc.get(field).and_then(encode_key) {
                tree.insert(encoded, key.clone())?;
            }
        }

        let record = StoredRecord::new(encode_document(doc)?);
        data.insert(key, record.to_bytes()?)?;
        Ok(())
    }

    /// Scans `entity`, returning documents matching `filter`, optionally
    /// projected to `fields` in the given order.
    pub fn find(
        &self,
        entity: &str,
        filter: &Filter,
        fields: Option<&[String]>,
    ) -> Result<Vec<Document>> {
        let data = self.data_tree(entity)?;
        let mut results = Vec::new();
        for entry in data.iter() {
            let (_, bytes) = entry?;
            let record = StoredRecord::from_bytes(&bytes)?;
            let doc = decode_document(&record.data)?;
            if FilterEvaluator::matches(filter, &doc) {
                results.push(match fields {
                    Some(fields) => doc.project(fields),
                    None => doc,
                });
            }
        }
        debug!(entity, matched = results.len(), "collection scan finished");
        Ok(results)
    }

    /// Number of documents stored for `entity`.
    pub fn count(&self, entity: &str) -> Result<usize> {
        Ok(self.data_tree(entity)?.len())
    }
}

fn index_tree_name(entity: &str, field: &str) -> String {
    format!("{INDEX_TREE_PREFIX}{entity}:{field}")
}

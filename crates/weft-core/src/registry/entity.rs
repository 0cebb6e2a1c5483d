//! Entity descriptors.

use std::fmt;

use super::field::FieldDescriptor;

/// The source format an entity's documents were unified from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xml,
    Json,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Csv => write!(f, "csv"),
            SourceFormat::Xml => write!(f, "xml"),
            SourceFormat::Json => write!(f, "json"),
        }
    }
}

/// Where an entity's documents originally came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub format: SourceFormat,
    pub location: String,
}

/// A declared entity with its fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub label: String,
    pub fields: Vec<FieldDescriptor>,
    pub provenance: Option<Provenance>,
}

impl EntityDescriptor {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), fields: Vec::new(), provenance: None }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_provenance(mut self, format: SourceFormat, location: impl Into<String>) -> Self {
        self.provenance = Some(Provenance { format, location: location.into() });
        self
    }

    pub fn field(&self, label: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.label == label)
    }

    /// The first field declared as primary key, if any.
    pub fn primary_key_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.primary_key)
    }

    pub fn foreign_key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.foreign_key)
    }
}

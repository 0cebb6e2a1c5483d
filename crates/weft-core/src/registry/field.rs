//! Field descriptors.

use super::types::DataType;

/// A single declared field on an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub label: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub foreign_key: bool,
    /// The entity a foreign key points at.
    pub references: Option<String>,
}

impl FieldDescriptor {
    pub fn new(label: impl Into<String>, data_type: DataType) -> Self {
        Self {
            label: label.into(),
            data_type,
            primary_key: false,
            foreign_key: false,
            references: None,
        }
    }

    /// Flags this field as the entity's primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Flags this field as a foreign key into `entity`.
    pub fn references(mut self, entity: impl Into<String>) -> Self {
        self.foreign_key = true;
        self.references = Some(entity.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_implies_foreign_key() {
        let field = FieldDescriptor::new("course_id", DataType::Integer).references("Courses");
        assert!(field.foreign_key);
        assert_eq!(field.references.as_deref(), Some("Courses"));
    }
}

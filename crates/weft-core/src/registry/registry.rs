//! The schema registry.

use super::entity::EntityDescriptor;

/// The full set of declared entities, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: Vec<EntityDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn get(&self, label: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.label == label)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_label() {
        let registry = SchemaRegistry::new()
            .with_entity(EntityDescriptor::new("Students"))
            .with_entity(EntityDescriptor::new("Courses"));
        assert!(registry.get("Students").is_some());
        assert!(registry.get("Rooms").is_none());
        assert_eq!(registry.len(), 2);
    }
}

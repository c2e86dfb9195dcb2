//! Entity registry, built once at startup and read-only afterwards

use crate::entity::Entity;
use qlayer_ir::EntityKey;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Entity not found: {0}")]
    NotFound(EntityKey),

    #[error("Entity registered twice: {0}")]
    DuplicateEntity(EntityKey),

    #[error("Relationship {relationship} of {entity} points to unregistered entity {target}")]
    DanglingRelationship {
        entity: EntityKey,
        relationship: String,
        target: EntityKey,
    },
}

/// Maps entity keys to their descriptors.
///
/// There is no process-wide instance: callers build one and share it
/// (typically behind an `Arc`) with every component that needs lookup.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityKey, Entity>,
}

impl EntityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            entities: HashMap::new(),
        }
    }

    pub fn get_entity(&self, key: &EntityKey) -> Result<&Entity, RegistryError> {
        self.entities
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

pub struct RegistryBuilder {
    entities: HashMap<EntityKey, Entity>,
}

impl RegistryBuilder {
    pub fn register(mut self, entity: Entity) -> Result<Self, RegistryError> {
        let key = entity.key().clone();
        if self.entities.contains_key(&key) {
            return Err(RegistryError::DuplicateEntity(key));
        }
        tracing::debug!(entity = %key, columns = entity.get_data_model().len(), "registering entity");
        self.entities.insert(key, entity);
        Ok(self)
    }

    /// Freeze the registry. Every relationship must point at a registered entity.
    pub fn build(self) -> Result<EntityRegistry, RegistryError> {
        for entity in self.entities.values() {
            for (name, relationship) in entity.relationships() {
                if !self.entities.contains_key(&relationship.rhs_entity) {
                    return Err(RegistryError::DanglingRelationship {
                        entity: entity.key().clone(),
                        relationship: name.to_string(),
                        target: relationship.rhs_entity.clone(),
                    });
                }
            }
        }

        tracing::info!(entities = self.entities.len(), "entity registry built");
        Ok(EntityRegistry {
            entities: self.entities,
        })
    }
}

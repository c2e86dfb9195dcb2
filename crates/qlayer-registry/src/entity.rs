//! Entity descriptors

use crate::validation::FunctionCallValidator;
use qlayer_ir::{ColumnSet, ColumnType, EntityKey, JoinType};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Named link from one entity to another, used to build join keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRelationship {
    pub rhs_entity: EntityKey,
    /// `(lhs column, rhs column)` pairs
    pub columns: Vec<(String, String)>,
    pub join_type: JoinType,
}

/// A named, independently owned logical schema a query can read from
pub struct Entity {
    key: EntityKey,
    data_model: ColumnSet,
    valid_function_names: BTreeSet<String>,
    function_call_validators: HashMap<String, Arc<dyn FunctionCallValidator>>,
    relationships: HashMap<String, JoinRelationship>,
}

impl Entity {
    pub fn builder(key: impl Into<EntityKey>) -> EntityBuilder {
        EntityBuilder {
            entity: Entity {
                key: key.into(),
                data_model: ColumnSet::default(),
                valid_function_names: BTreeSet::new(),
                function_call_validators: HashMap::new(),
                relationships: HashMap::new(),
            },
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn get_data_model(&self) -> &ColumnSet {
        &self.data_model
    }

    pub fn get_valid_function_names(&self) -> &BTreeSet<String> {
        &self.valid_function_names
    }

    pub fn get_function_call_validators(&self) -> &HashMap<String, Arc<dyn FunctionCallValidator>> {
        &self.function_call_validators
    }

    pub fn get_relationship(&self, name: &str) -> Option<&JoinRelationship> {
        self.relationships.get(name)
    }

    pub fn relationships(&self) -> impl Iterator<Item = (&str, &JoinRelationship)> {
        self.relationships.iter().map(|(name, r)| (name.as_str(), r))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut validators: Vec<&str> = self
            .function_call_validators
            .keys()
            .map(String::as_str)
            .collect();
        validators.sort_unstable();

        f.debug_struct("Entity")
            .field("key", &self.key)
            .field("data_model", &self.data_model)
            .field("valid_function_names", &self.valid_function_names)
            .field("function_call_validators", &validators)
            .field("relationships", &self.relationships)
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

pub struct EntityBuilder {
    entity: Entity,
}

impl EntityBuilder {
    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.entity.data_model.push(name, column_type);
        self
    }

    pub fn columns(mut self, columns: ColumnSet) -> Self {
        for column in columns.iter() {
            self.entity
                .data_model
                .push(column.name.clone(), column.column_type.clone());
        }
        self
    }

    pub fn function<S: Into<String>>(mut self, name: S) -> Self {
        self.entity.valid_function_names.insert(name.into());
        self
    }

    pub fn functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity
            .valid_function_names
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Entity-level validator for `function_name`. Fully replaces any default
    /// validator for the same name on this entity.
    pub fn validator(
        mut self,
        function_name: impl Into<String>,
        validator: Arc<dyn FunctionCallValidator>,
    ) -> Self {
        self.entity
            .function_call_validators
            .insert(function_name.into(), validator);
        self
    }

    pub fn relationship(mut self, name: impl Into<String>, relationship: JoinRelationship) -> Self {
        self.entity.relationships.insert(name.into(), relationship);
        self
    }

    pub fn build(self) -> Entity {
        self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{ParamType, SignatureValidator};
    use qlayer_ir::TypeKind;

    #[test]
    fn test_builder_collects_everything() {
        let entity = Entity::builder("spans")
            .column("message", ColumnType::String)
            .column("duration", ColumnType::UInt(32))
            .functions(["count", "like"])
            .function("avg")
            .validator(
                "avg",
                Arc::new(SignatureValidator::new(vec![ParamType::column([TypeKind::UInt])])),
            )
            .relationship(
                "transaction",
                JoinRelationship {
                    rhs_entity: EntityKey::new("transactions"),
                    columns: vec![("trace_id".to_string(), "trace_id".to_string())],
                    join_type: JoinType::Inner,
                },
            )
            .build();

        assert_eq!(entity.key().as_str(), "spans");
        assert_eq!(entity.get_data_model().len(), 2);
        assert!(entity.get_valid_function_names().contains("like"));
        assert_eq!(entity.get_valid_function_names().len(), 3);
        assert!(entity.get_function_call_validators().contains_key("avg"));
        assert_eq!(
            entity.get_relationship("transaction").unwrap().rhs_entity,
            EntityKey::new("transactions")
        );
        assert!(format!("{entity:?}").contains("\"avg\""));
    }
}

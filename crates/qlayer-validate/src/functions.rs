//! Function-call validation across the entities a query reads from

use crate::{ExpressionValidator, InvalidExpression, ValidationError};
use qlayer_ir::{DataSource, EntityKey, Expression, TypeKind};
use qlayer_registry::{
    Entity, EntityRegistry, FunctionCallValidator, ParamType, RegistryError, SchemaScope,
    SignatureValidator,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Validators applied to every query unless an entity registers its own
/// validator for the same function.
pub fn default_validators() -> HashMap<String, Arc<dyn FunctionCallValidator>> {
    // Arrays are accepted because an array-joined column is exploded into
    // strings by the time the condition runs.
    let like: Arc<dyn FunctionCallValidator> = Arc::new(SignatureValidator::new(vec![
        ParamType::column([TypeKind::Array, TypeKind::String]),
        ParamType::Any,
    ]));

    HashMap::from([
        ("like".to_string(), Arc::clone(&like)),
        ("notLike".to_string(), like),
    ])
}

/// A call to a function none of the in-scope entities lists as permitted
#[derive(Debug, Clone)]
pub struct UnknownFunction<'a> {
    pub function_name: &'a str,
    pub entities: Vec<&'a EntityKey>,
}

impl UnknownFunction<'_> {
    fn entity_names(&self) -> String {
        self.entities
            .iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

type UnknownFunctionCallback = Arc<dyn Fn(&UnknownFunction<'_>) + Send + Sync>;

fn log_unknown_function(unknown: &UnknownFunction<'_>) {
    tracing::warn!(
        function = unknown.function_name,
        entities = %unknown.entity_names(),
        "function is not permitted by any entity in scope"
    );
}

/// Applies default, entity-level and global validators to function calls.
///
/// For every entity the data source reads from, the effective validator list
/// is: all global validators in registration order, then the entity's own
/// validator for the function if it has one, otherwise the default validator.
/// The first entity that rejects a call rejects the query.
pub struct FunctionCallsValidator {
    registry: Arc<EntityRegistry>,
    default_validators: HashMap<String, Arc<dyn FunctionCallValidator>>,
    global_validators: Vec<Arc<dyn FunctionCallValidator>>,
    on_unknown_function: UnknownFunctionCallback,
    strict: bool,
}

impl FunctionCallsValidator {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        let validator = Self {
            registry,
            default_validators: default_validators(),
            global_validators: Vec::new(),
            on_unknown_function: Arc::new(log_unknown_function),
            strict: false,
        };
        for name in validator.default_validators.keys() {
            validator.log_overlap(name);
        }
        validator
    }

    /// Register (or replace) the default validator for `function_name`
    pub fn with_default_validator(
        mut self,
        function_name: impl Into<String>,
        validator: Arc<dyn FunctionCallValidator>,
    ) -> Self {
        let function_name = function_name.into();
        self.log_overlap(&function_name);
        self.default_validators.insert(function_name, validator);
        self
    }

    /// Append a validator that runs on every function call for every entity
    pub fn with_global_validator(mut self, validator: Arc<dyn FunctionCallValidator>) -> Self {
        self.global_validators.push(validator);
        self
    }

    /// Replace the hook called for functions an entity does not permit.
    /// The default hook logs a warning.
    pub fn on_unknown_function<F>(mut self, callback: F) -> Self
    where
        F: Fn(&UnknownFunction<'_>) + Send + Sync + 'static,
    {
        self.on_unknown_function = Arc::new(callback);
        self
    }

    /// In strict mode a function outside an entity's permitted set is
    /// rejected instead of only being reported through the hook.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    fn log_overlap(&self, function_name: &str) {
        for entity in self.registry.entities() {
            if entity.get_function_call_validators().contains_key(function_name) {
                tracing::warn!(
                    entity = %entity.key(),
                    function = function_name,
                    "entity validator overrides the default one"
                );
            }
        }
    }

    /// Entities in scope for a data source, each with the schema its
    /// validators see
    fn scopes<'a>(
        &'a self,
        data_source: &'a DataSource,
    ) -> Result<Vec<(&'a Entity, SchemaScope<'a>)>, RegistryError> {
        match data_source {
            DataSource::Entity(source) => {
                let entity = self.registry.get_entity(&source.key)?;
                Ok(vec![(entity, SchemaScope::new(entity.get_data_model()))])
            }
            DataSource::Join(join) => join
                .get_alias_node_map()
                .into_iter()
                .map(|(alias, source)| {
                    let entity = self.registry.get_entity(&source.key)?;
                    Ok::<_, RegistryError>((
                        entity,
                        SchemaScope::aliased(alias, entity.get_data_model()),
                    ))
                })
                .collect(),
        }
    }

    fn effective_validators<'a>(
        &'a self,
        entity: &'a Entity,
        function_name: &str,
    ) -> impl Iterator<Item = &'a Arc<dyn FunctionCallValidator>> {
        let specific = entity
            .get_function_call_validators()
            .get(function_name)
            .or_else(|| self.default_validators.get(function_name));
        self.global_validators.iter().chain(specific)
    }
}

impl ExpressionValidator for FunctionCallsValidator {
    fn validate(&self, exp: &Expression, data_source: &DataSource) -> Result<(), ValidationError> {
        let Expression::FunctionCall {
            function_name,
            parameters,
            ..
        } = exp
        else {
            return Ok(());
        };

        let scopes = self.scopes(data_source)?;
        let permitted = scopes
            .iter()
            .any(|(entity, _)| entity.get_valid_function_names().contains(function_name));
        if !permitted {
            let unknown = UnknownFunction {
                function_name,
                entities: scopes.iter().map(|(entity, _)| entity.key()).collect(),
            };
            (self.on_unknown_function)(&unknown);
            if self.strict {
                return Err(InvalidExpression::new(
                    exp.clone(),
                    format!(
                        "Function {function_name} is not allowed on {}",
                        unknown.entity_names()
                    ),
                    false,
                )
                .into());
            }
        }

        for (entity, scope) in &scopes {
            for validator in self.effective_validators(entity, function_name) {
                if let Err(cause) = validator.validate(function_name, parameters, scope) {
                    tracing::debug!(
                        entity = %entity,
                        function = function_name.as_str(),
                        error = %cause,
                        "function call rejected"
                    );
                    return Err(InvalidExpression::new(
                        exp.clone(),
                        format!("Illegal call to function {function_name}: {cause}"),
                        false,
                    )
                    .with_cause(cause)
                    .into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlayer_ir::dsl::{column, literal};
    use qlayer_ir::{ColumnType, EntitySource};

    fn registry() -> Arc<EntityRegistry> {
        let spans = Entity::builder("spans")
            .column("message", ColumnType::String)
            .column("duration", ColumnType::UInt(32))
            .functions(["like", "notLike"])
            .build();
        Arc::new(EntityRegistry::builder().register(spans).unwrap().build().unwrap())
    }

    fn like(first: Expression) -> Expression {
        qlayer_ir::dsl::function_call(None, "like", vec![first, literal("x")])
    }

    #[test]
    fn test_non_function_expressions_are_ignored() {
        let validator = FunctionCallsValidator::new(registry());
        let source = DataSource::Entity(EntitySource::new("spans"));
        validator.validate(&literal(5i64), &source).unwrap();
        validator.validate(&column(None, "message"), &source).unwrap();
    }

    #[test]
    fn test_default_like_validator() {
        let validator = FunctionCallsValidator::new(registry());
        let source = DataSource::Entity(EntitySource::new("spans"));

        validator.validate(&like(column(None, "message")), &source).unwrap();

        let err = validator
            .validate(&like(column(None, "duration")), &source)
            .unwrap_err();
        let ValidationError::InvalidExpression(invalid) = err else {
            panic!("expected an invalid expression");
        };
        assert!(!invalid.report());
        assert!(invalid.message().starts_with("Illegal call to function like:"));
        assert!(invalid.cause().is_some());
    }

    #[test]
    fn test_unregistered_entity_is_a_registry_error() {
        let validator = FunctionCallsValidator::new(registry());
        let source = DataSource::Entity(EntitySource::new("ghost"));
        let err = validator
            .validate(&like(column(None, "message")), &source)
            .unwrap_err();
        assert!(matches!(err, ValidationError::Registry(RegistryError::NotFound(_))));
        assert!(err.should_report());
    }

    #[test]
    fn test_unknown_function_is_soft_unless_strict() {
        let source = DataSource::Entity(EntitySource::new("spans"));
        let call = qlayer_ir::dsl::function_call(None, "uniq", vec![column(None, "message")]);

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let lenient = FunctionCallsValidator::new(registry()).on_unknown_function(move |u| {
            sink.lock()
                .unwrap()
                .push(format!("{}@{}", u.function_name, u.entity_names()));
        });
        lenient.validate(&call, &source).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["uniq@spans".to_string()]);

        let strict = FunctionCallsValidator::new(registry()).strict(true);
        let err = strict.validate(&call, &source).unwrap_err();
        assert!(!err.should_report());
    }
}

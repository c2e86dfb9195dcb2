//! Configuration for the query checker
//!
//! Loaded from a YAML file describing logging, validation, the processor
//! pipeline and the entities queries may reference.
//!
//! Environment variables always override config.yaml values.

use qlayer_ir::{ColumnSet, EntityKey, JoinType};
use qlayer_processors::{
    ConsistencyEnforcerProcessor, ProcessorError, ProcessorPipeline, SamplingRateProcessor,
};
use qlayer_registry::{
    AllowedFunctionsValidator, Entity, EntityRegistry, JoinRelationship, RegistryError,
    SignatureValidator,
};
use qlayer_validate::FunctionCallsValidator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::logging::{LogFormat, LogOutput};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnvVar { name: &'static str, value: String },

    #[error("Unknown processor: {0}")]
    UnknownProcessor(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject functions outside an entity's permitted set instead of warning
    pub strict: bool,

    /// Global allow-list applied to every entity. Unset means no restriction.
    pub allowed_functions: Option<Vec<String>>,

    /// Extra default validators, keyed by function name
    pub default_validators: BTreeMap<String, SignatureValidator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorsConfig {
    /// Processor names, run in order
    pub pipeline: Vec<String>,
    pub turbo_sample_rate: f64,
}

impl Default for ProcessorsConfig {
    fn default() -> Self {
        Self {
            pipeline: Vec::new(),
            turbo_sample_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub entity: String,
    /// `[lhs column, rhs column]` pairs
    pub columns: Vec<(String, String)>,
    #[serde(default)]
    pub join_type: JoinType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub columns: ColumnSet,
    #[serde(default)]
    pub functions: Vec<String>,
    /// Entity-level validators; each replaces the default for its function
    #[serde(default)]
    pub validators: BTreeMap<String, SignatureValidator>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipConfig>,
}

impl EntityConfig {
    fn build(&self) -> Entity {
        let mut builder = Entity::builder(self.name.as_str())
            .columns(self.columns.clone())
            .functions(self.functions.iter().cloned());
        for (function, signature) in &self.validators {
            builder = builder.validator(function.clone(), Arc::new(signature.clone()));
        }
        for (name, relationship) in &self.relationships {
            builder = builder.relationship(
                name.clone(),
                JoinRelationship {
                    rhs_entity: EntityKey::new(relationship.entity.as_str()),
                    columns: relationship.columns.clone(),
                    join_type: relationship.join_type,
                },
            );
        }
        builder.build()
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub validation: ValidationConfig,
    pub processors: ProcessorsConfig,
    pub entities: Vec<EntityConfig>,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(strict) = std::env::var("QLAYER_STRICT") {
            self.validation.strict = strict.parse().map_err(|_| ConfigError::InvalidEnvVar {
                name: "QLAYER_STRICT",
                value: strict,
            })?;
        }
        if let Ok(pipeline) = std::env::var("QLAYER_PIPELINE") {
            self.processors.pipeline = pipeline
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(rate) = std::env::var("QLAYER_TURBO_SAMPLE_RATE") {
            self.processors.turbo_sample_rate =
                rate.parse().map_err(|_| ConfigError::InvalidEnvVar {
                    name: "QLAYER_TURBO_SAMPLE_RATE",
                    value: rate,
                })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = LogFormat::from_name(&format);
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = LogOutput::from_name(&output);
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
        Ok(())
    }

    pub fn build_registry(&self) -> Result<EntityRegistry, ConfigError> {
        let mut builder = EntityRegistry::builder();
        for entity in &self.entities {
            builder = builder.register(entity.build())?;
        }
        Ok(builder.build()?)
    }

    pub fn build_validator(&self, registry: Arc<EntityRegistry>) -> FunctionCallsValidator {
        let mut validator = FunctionCallsValidator::new(registry).strict(self.validation.strict);
        for (function, signature) in &self.validation.default_validators {
            validator = validator.with_default_validator(function.clone(), Arc::new(signature.clone()));
        }
        if let Some(allowed) = &self.validation.allowed_functions {
            validator = validator.with_global_validator(Arc::new(AllowedFunctionsValidator::new(
                allowed.iter().cloned(),
            )));
        }
        validator
    }

    pub fn build_pipeline(&self) -> Result<ProcessorPipeline, ConfigError> {
        let mut pipeline = ProcessorPipeline::new();
        for name in &self.processors.pipeline {
            match name.as_str() {
                "consistency_enforcer" => pipeline.push(Box::new(ConsistencyEnforcerProcessor)),
                "sampling_rate" => pipeline.push(Box::new(SamplingRateProcessor::new(
                    self.processors.turbo_sample_rate,
                )?)),
                other => return Err(ConfigError::UnknownProcessor(other.to_string())),
            }
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlayer_ir::ColumnType;

    const CONFIG: &str = r#"
logging:
  level: debug
  format: json
validation:
  strict: true
  allowed_functions: [count, like, equals]
processors:
  pipeline: [sampling_rate, consistency_enforcer]
  turbo_sample_rate: 0.2
entities:
  - name: events
    columns:
      - { name: message, type: String }
      - { name: tags, type: "Array(String)" }
      - { name: group_id, type: UInt64 }
    functions: [count, like]
    validators:
      count: []
    relationships:
      grouped:
        entity: groupedmessage
        columns: [[group_id, id]]
  - name: groupedmessage
    columns:
      - { name: id, type: UInt64 }
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.output, LogOutput::Stderr);
        assert!(!config.validation.strict);
        assert!(config.processors.pipeline.is_empty());
        assert!(config.entities.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.output, LogOutput::Stderr);
        assert!(config.validation.strict);

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 2);
        let events = registry.get_entity(&EntityKey::new("events")).unwrap();
        assert_eq!(
            events.get_data_model().get("tags"),
            Some(&ColumnType::Array(Box::new(ColumnType::String)))
        );
        assert!(events.get_function_call_validators().contains_key("count"));
        assert_eq!(
            events.get_relationship("grouped").unwrap().join_type,
            JoinType::Inner
        );

        let pipeline = config.build_pipeline().unwrap();
        assert_eq!(pipeline.names(), vec!["sampling_rate", "consistency_enforcer"]);
    }

    #[test]
    fn test_unknown_processor() {
        let mut config = Config::default();
        config.processors.pipeline = vec!["mystery".to_string()];
        assert!(matches!(
            config.build_pipeline(),
            Err(ConfigError::UnknownProcessor(name)) if name == "mystery"
        ));
    }

    #[test]
    fn test_bad_column_type_is_a_yaml_error() {
        let yaml = "entities: [{ name: e, columns: [{ name: a, type: Blob }] }]";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_duplicate_column_keeps_last_type() {
        let yaml = r#"
entities:
  - name: events
    columns:
      - { name: message, type: UInt64 }
      - { name: message, type: String }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let registry = config.build_registry().unwrap();
        let events = registry.get_entity(&EntityKey::new("events")).unwrap();
        assert_eq!(events.get_data_model().len(), 1);
        assert_eq!(events.get_data_model().get("message"), Some(&ColumnType::String));
    }

    #[test]
    fn test_dangling_relationship() {
        let yaml = r#"
entities:
  - name: events
    relationships:
      grouped: { entity: ghost, columns: [[a, b]] }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(ConfigError::Registry(RegistryError::DanglingRelationship { .. }))
        ));
    }

    #[test]
    fn test_env_var_override() {
        std::env::set_var("QLAYER_PIPELINE", "consistency_enforcer");
        std::env::set_var("QLAYER_TURBO_SAMPLE_RATE", "0.5");

        let temp_file = std::env::temp_dir().join("qlayer_test_config.yaml");
        std::fs::write(&temp_file, CONFIG).unwrap();

        let config = Config::load(&temp_file).unwrap();
        assert_eq!(config.processors.pipeline, vec!["consistency_enforcer"]);
        assert_eq!(config.processors.turbo_sample_rate, 0.5);

        std::env::remove_var("QLAYER_PIPELINE");
        std::env::remove_var("QLAYER_TURBO_SAMPLE_RATE");
        std::fs::remove_file(temp_file).ok();
    }
}

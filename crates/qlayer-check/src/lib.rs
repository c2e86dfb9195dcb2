//! Query checker: parse, validate and process a query against a configured
//! set of entities.

use qlayer_ast::ParseError;
use qlayer_ir::Query;
use qlayer_processors::{ProcessorError, ProcessorPipeline, RequestSettings};
use qlayer_registry::EntityRegistry;
use qlayer_validate::{validate_query, FunctionCallsValidator, ValidationError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub mod config;
pub mod logging;

use config::{Config, ConfigError};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid JSON query: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Processing failed: {0}")]
    Processor(#[from] ProcessorError),
}

/// Outcome of a successful check
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub fingerprint: String,
    pub query: Query,
}

pub struct Checker {
    registry: Arc<EntityRegistry>,
    validator: FunctionCallsValidator,
    pipeline: ProcessorPipeline,
}

impl Checker {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let registry = Arc::new(config.build_registry()?);
        let validator = config.build_validator(Arc::clone(&registry));
        let pipeline = config.build_pipeline()?;
        tracing::info!(
            entities = registry.len(),
            processors = ?pipeline.names(),
            "checker ready"
        );
        Ok(Self {
            registry,
            validator,
            pipeline,
        })
    }

    /// Parse `text` as a JSON query if it looks like one, otherwise as SnQL
    pub fn parse(&self, text: &str) -> Result<Query, CheckError> {
        if text.trim_start().starts_with('{') {
            Ok(serde_json::from_str(text)?)
        } else {
            Ok(qlayer_ast::parse_query(text, &self.registry)?)
        }
    }

    pub fn check(
        &self,
        text: &str,
        settings: &dyn RequestSettings,
    ) -> Result<CheckReport, CheckError> {
        let mut query = self.parse(text)?;

        if let Err(e) = validate_query(&query, &[&self.validator]) {
            if e.should_report() {
                tracing::error!(error = %e, referrer = settings.get_referrer(), "query validation failed");
            } else {
                tracing::info!(error = %e, referrer = settings.get_referrer(), "query rejected");
            }
            return Err(e.into());
        }

        self.pipeline.run(&mut query, settings)?;

        let fingerprint = query.fingerprint();
        tracing::info!(
            %fingerprint,
            dry_run = settings.get_dry_run(),
            "query checked"
        );
        Ok(CheckReport { fingerprint, query })
    }
}

//! Validation layer for logical queries
//!
//! Validates:
//! - Function calls against the signatures declared by default, per entity
//!   and globally
//! - Function names against each entity's permitted set (soft by default)

use qlayer_ir::{DataSource, Expression, Query};
use qlayer_registry::{InvalidFunctionCall, RegistryError};
use thiserror::Error;

mod functions;

pub use functions::{default_validators, FunctionCallsValidator, UnknownFunction};

/// Externally visible failure of an expression check
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvalidExpression {
    expression: Expression,
    message: String,
    report: bool,
    #[source]
    cause: Option<InvalidFunctionCall>,
}

impl InvalidExpression {
    pub fn new(expression: Expression, message: impl Into<String>, report: bool) -> Self {
        Self {
            expression,
            message: message.into(),
            report,
            cause: None,
        }
    }

    pub fn with_cause(self, cause: InvalidFunctionCall) -> Self {
        Self {
            cause: Some(cause),
            ..self
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `false` for user input errors that should not alert operators
    pub fn report(&self) -> bool {
        self.report
    }

    pub fn cause(&self) -> Option<&InvalidFunctionCall> {
        self.cause.as_ref()
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    InvalidExpression(#[from] InvalidExpression),

    /// The registry does not know an entity the query references. This is a
    /// configuration error, not bad user input.
    #[error("Registry lookup failed: {0}")]
    Registry(#[from] RegistryError),
}

impl ValidationError {
    pub fn should_report(&self) -> bool {
        match self {
            ValidationError::InvalidExpression(e) => e.report(),
            ValidationError::Registry(_) => true,
        }
    }
}

/// Checks a single expression node in the context of the query's data source.
/// Validators inspect one node; [`validate_query`] drives the tree walk.
pub trait ExpressionValidator: Send + Sync {
    fn validate(&self, exp: &Expression, data_source: &DataSource) -> Result<(), ValidationError>;
}

/// Run every validator on every expression node of every clause, stopping
/// at the first failure.
pub fn validate_query(
    query: &Query,
    validators: &[&dyn ExpressionValidator],
) -> Result<(), ValidationError> {
    let data_source = query.get_from_clause();
    for exp in query.get_all_expressions() {
        for validator in validators {
            validator.validate(exp, data_source)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlayer_ir::dsl::{column, function_call, literal};
    use qlayer_ir::{EntitySource, SelectedExpression};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl ExpressionValidator for Recorder {
        fn validate(&self, exp: &Expression, _: &DataSource) -> Result<(), ValidationError> {
            self.seen.lock().unwrap().push(exp.to_string());
            Ok(())
        }
    }

    struct RejectLiterals;

    impl ExpressionValidator for RejectLiterals {
        fn validate(&self, exp: &Expression, _: &DataSource) -> Result<(), ValidationError> {
            match exp {
                Expression::Literal { .. } => {
                    Err(InvalidExpression::new(exp.clone(), "no literals", false).into())
                }
                _ => Ok(()),
            }
        }
    }

    fn query() -> Query {
        let mut query = Query::new(EntitySource::new("spans"));
        query.set_selected_columns(vec![SelectedExpression::new(
            "x",
            function_call(None, "f", vec![column(None, "a"), literal(1i64)]),
        )]);
        query
    }

    #[test]
    fn test_walk_visits_every_node() {
        let recorder = Recorder::default();
        validate_query(&query(), &[&recorder]).unwrap();
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["f(a, 1)", "a", "1"]);
    }

    #[test]
    fn test_walk_stops_on_first_failure() {
        let recorder = Recorder::default();
        let err = validate_query(&query(), &[&RejectLiterals, &recorder]).unwrap_err();
        assert!(!err.should_report());
        assert_eq!(err.to_string(), "no literals");
        // the recorder never saw the literal
        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
    }
}

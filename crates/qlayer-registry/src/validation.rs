//! Function-call validator contract

use qlayer_ir::{ColumnSet, ColumnType, Expression};
use thiserror::Error;

/// Raised by a validator when a call violates its declared contract.
/// Never surfaced raw: the validation pipeline wraps it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidFunctionCall {
    #[error("{function} expects {expected} parameter(s), got {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("Illegal parameter {index} of {function}: expected {expected}, got {found}")]
    IllegalParameter {
        function: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Function {function} is not allowed: {reason}")]
    Rejected { function: String, reason: String },
}

/// Schema a validator resolves column references against.
///
/// Inside a join the scope carries the alias of the entity being checked;
/// columns qualified with a different alias do not resolve.
#[derive(Debug, Clone, Copy)]
pub struct SchemaScope<'a> {
    alias: Option<&'a str>,
    columns: &'a ColumnSet,
}

impl<'a> SchemaScope<'a> {
    pub fn new(columns: &'a ColumnSet) -> Self {
        Self {
            alias: None,
            columns,
        }
    }

    pub fn aliased(alias: &'a str, columns: &'a ColumnSet) -> Self {
        Self {
            alias: Some(alias),
            columns,
        }
    }

    pub fn alias(&self) -> Option<&'a str> {
        self.alias
    }

    pub fn columns(&self) -> &'a ColumnSet {
        self.columns
    }

    pub fn resolve(&self, table_name: Option<&str>, column_name: &str) -> Option<&'a ColumnType> {
        match (self.alias, table_name) {
            (Some(alias), Some(table)) if alias != table => None,
            _ => self.columns.get(column_name),
        }
    }

    /// Whether a reference qualified with `table_name` must resolve in this
    /// scope. A single-entity scope owns every column; a join scope owns only
    /// columns qualified with its alias.
    pub fn owns(&self, table_name: Option<&str>) -> bool {
        match (self.alias, table_name) {
            (None, _) => true,
            (Some(alias), Some(table)) => alias == table,
            (Some(_), None) => false,
        }
    }
}

/// Validates the parameters of one function call against a schema.
///
/// Implementations must not mutate anything: they either accept the call or
/// return an error.
pub trait FunctionCallValidator: Send + Sync {
    fn validate(
        &self,
        func_name: &str,
        parameters: &[Expression],
        schema: &SchemaScope<'_>,
    ) -> Result<(), InvalidFunctionCall>;
}

impl<F> FunctionCallValidator for F
where
    F: Fn(&str, &[Expression], &SchemaScope<'_>) -> Result<(), InvalidFunctionCall> + Send + Sync,
{
    fn validate(
        &self,
        func_name: &str,
        parameters: &[Expression],
        schema: &SchemaScope<'_>,
    ) -> Result<(), InvalidFunctionCall> {
        self(func_name, parameters, schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_resolution() {
        let columns: ColumnSet = [("message".to_string(), ColumnType::String)]
            .into_iter()
            .collect();

        let single = SchemaScope::new(&columns);
        assert_eq!(single.resolve(None, "message"), Some(&ColumnType::String));
        assert_eq!(single.resolve(Some("e"), "message"), Some(&ColumnType::String));
        assert_eq!(single.resolve(None, "missing"), None);

        let scoped = SchemaScope::aliased("e", &columns);
        assert_eq!(scoped.resolve(Some("e"), "message"), Some(&ColumnType::String));
        assert_eq!(scoped.resolve(Some("g"), "message"), None);
        assert_eq!(scoped.resolve(None, "message"), Some(&ColumnType::String));

        assert!(single.owns(None));
        assert!(single.owns(Some("e")));
        assert!(scoped.owns(Some("e")));
        assert!(!scoped.owns(Some("g")));
        assert!(!scoped.owns(None));
    }

    fn reject_all(
        name: &str,
        _: &[Expression],
        _: &SchemaScope<'_>,
    ) -> Result<(), InvalidFunctionCall> {
        Err(InvalidFunctionCall::Rejected {
            function: name.to_string(),
            reason: "nope".to_string(),
        })
    }

    #[test]
    fn test_functions_are_validators() {
        let columns = ColumnSet::default();
        let validator: &dyn FunctionCallValidator = &reject_all;
        let err = validator
            .validate("f", &[], &SchemaScope::new(&columns))
            .unwrap_err();
        assert_eq!(err.to_string(), "Function f is not allowed: nope");
    }
}

//! Allow-list of function names, meant to run as a global validator

use crate::validation::{FunctionCallValidator, InvalidFunctionCall, SchemaScope};
use qlayer_ir::Expression;
use std::collections::HashSet;

/// Rejects every function whose name is not in the list. Names are
/// case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct AllowedFunctionsValidator {
    allowed: HashSet<String>,
}

impl AllowedFunctionsValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, func_name: &str) -> bool {
        self.allowed.contains(func_name)
    }
}

impl FunctionCallValidator for AllowedFunctionsValidator {
    fn validate(
        &self,
        func_name: &str,
        _parameters: &[Expression],
        _schema: &SchemaScope<'_>,
    ) -> Result<(), InvalidFunctionCall> {
        if self.is_allowed(func_name) {
            Ok(())
        } else {
            Err(InvalidFunctionCall::Rejected {
                function: func_name.to_string(),
                reason: "not in the list of allowed functions".to_string(),
            })
        }
    }
}

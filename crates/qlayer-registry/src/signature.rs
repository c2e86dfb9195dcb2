//! Positional signature checking for fixed-arity functions

use crate::validation::{FunctionCallValidator, InvalidFunctionCall, SchemaScope};
use qlayer_ir::{Expression, TypeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

fn default_allow_nullable() -> bool {
    true
}

/// Constraint on one positional parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Any,
    Column {
        types: BTreeSet<TypeKind>,
        /// `Nullable(T)` satisfies the constraint when `T` does
        #[serde(default = "default_allow_nullable")]
        allow_nullable: bool,
    },
}

impl ParamType {
    pub fn column(types: impl IntoIterator<Item = TypeKind>) -> Self {
        ParamType::Column {
            types: types.into_iter().collect(),
            allow_nullable: true,
        }
    }

    fn validate(
        &self,
        func_name: &str,
        index: usize,
        expression: &Expression,
        schema: &SchemaScope<'_>,
    ) -> Result<(), InvalidFunctionCall> {
        let ParamType::Column {
            types,
            allow_nullable,
        } = self
        else {
            return Ok(());
        };

        let illegal = |found: String| InvalidFunctionCall::IllegalParameter {
            function: func_name.to_string(),
            index,
            expected: self.to_string(),
            found,
        };

        let (table_name, column_name) = match expression {
            Expression::Column {
                table_name,
                column_name,
                ..
            } => (table_name.as_deref(), column_name.as_str()),
            Expression::Literal { value, .. } => return Err(illegal(format!("literal {value}"))),
            Expression::FunctionCall { function_name, .. } => {
                return Err(illegal(format!("function call {function_name}")))
            }
        };

        let Some(column_type) = schema.resolve(table_name, column_name) else {
            if schema.owns(table_name) {
                return Err(illegal(format!("unknown column {column_name}")));
            }
            // Another entity of the join resolves it
            tracing::debug!(
                function = func_name,
                column = column_name,
                "column belongs to another join scope, skipping type check"
            );
            return Ok(());
        };

        let checked = if *allow_nullable {
            column_type.unwrap_nullable()
        } else {
            column_type
        };
        if types.contains(&checked.kind()) {
            Ok(())
        } else {
            Err(illegal(format!("column {column_name} of type {column_type}")))
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => write!(f, "Any"),
            ParamType::Column {
                types,
                allow_nullable,
            } => {
                let names: Vec<String> = types.iter().map(|t| t.to_string()).collect();
                write!(f, "Column({})", names.join(" | "))?;
                if !allow_nullable {
                    write!(f, " not nullable")?;
                }
                Ok(())
            }
        }
    }
}

/// Checks a call against a declared positional signature. Arity is exact;
/// variable-arity functions need their own validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureValidator {
    params: Vec<ParamType>,
}

impl SignatureValidator {
    pub fn new(params: Vec<ParamType>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }
}

impl FunctionCallValidator for SignatureValidator {
    fn validate(
        &self,
        func_name: &str,
        parameters: &[Expression],
        schema: &SchemaScope<'_>,
    ) -> Result<(), InvalidFunctionCall> {
        if parameters.len() != self.params.len() {
            return Err(InvalidFunctionCall::Arity {
                function: func_name.to_string(),
                expected: self.params.len(),
                actual: parameters.len(),
            });
        }

        for (index, (param, expression)) in self.params.iter().zip(parameters).enumerate() {
            param.validate(func_name, index, expression, schema)?;
        }
        Ok(())
    }
}

//! Expression AST
//!
//! Expressions are immutable trees. Rewrites go through [`Expression::transform`],
//! which rebuilds the tree instead of mutating nodes in place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal value carried by a [`Expression::Literal`] node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Expected to be finite. JSON has no NaN or infinity, so a non-finite
    /// float serializes as `null` and reads back as [`Value::Null`].
    Float(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

/// A node of a query predicate or projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    Literal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        value: Value,
    },
    Column {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table_name: Option<String>,
        column_name: String,
    },
    FunctionCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        function_name: String,
        #[serde(default)]
        parameters: Vec<Expression>,
    },
}

impl Expression {
    pub fn alias(&self) -> Option<&str> {
        match self {
            Expression::Literal { alias, .. }
            | Expression::Column { alias, .. }
            | Expression::FunctionCall { alias, .. } => alias.as_deref(),
        }
    }

    /// Copy of this node with the alias replaced
    pub fn with_alias(self, new_alias: Option<String>) -> Self {
        match self {
            Expression::Literal { value, .. } => Expression::Literal {
                alias: new_alias,
                value,
            },
            Expression::Column {
                table_name,
                column_name,
                ..
            } => Expression::Column {
                alias: new_alias,
                table_name,
                column_name,
            },
            Expression::FunctionCall {
                function_name,
                parameters,
                ..
            } => Expression::FunctionCall {
                alias: new_alias,
                function_name,
                parameters,
            },
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        match self {
            Expression::FunctionCall { function_name, .. } => Some(function_name),
            _ => None,
        }
    }

    pub fn parameters(&self) -> &[Expression] {
        match self {
            Expression::FunctionCall { parameters, .. } => parameters,
            _ => &[],
        }
    }

    /// Prefix-order traversal: the node itself, then every parameter subtree left to right
    pub fn iter(&self) -> ExpressionIter<'_> {
        ExpressionIter { stack: vec![self] }
    }

    /// Rebuild the tree bottom-up: parameters are transformed before `func`
    /// sees the node that contains them.
    pub fn transform<F>(self, func: &mut F) -> Expression
    where
        F: FnMut(Expression) -> Expression,
    {
        let rebuilt = match self {
            Expression::FunctionCall {
                alias,
                function_name,
                parameters,
            } => Expression::FunctionCall {
                alias,
                function_name,
                parameters: parameters
                    .into_iter()
                    .map(|p| p.transform(&mut *func))
                    .collect(),
            },
            leaf => leaf,
        };
        func(rebuilt)
    }

    /// Names of every column referenced in this subtree
    pub fn columns(&self) -> impl Iterator<Item = (Option<&str>, &str)> + '_ {
        self.iter().filter_map(|e| match e {
            Expression::Column {
                table_name,
                column_name,
                ..
            } => Some((table_name.as_deref(), column_name.as_str())),
            _ => None,
        })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal { value, .. } => write!(f, "{value}")?,
            Expression::Column {
                table_name,
                column_name,
                ..
            } => match table_name {
                Some(table) => write!(f, "{table}.{column_name}")?,
                None => write!(f, "{column_name}")?,
            },
            Expression::FunctionCall {
                function_name,
                parameters,
                ..
            } => {
                write!(f, "{function_name}(")?;
                for (i, p) in parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")?;
            }
        }
        if let Some(alias) = self.alias() {
            write!(f, " AS `{alias}`")?;
        }
        Ok(())
    }
}

pub struct ExpressionIter<'a> {
    stack: Vec<&'a Expression>,
}

impl<'a> Iterator for ExpressionIter<'a> {
    type Item = &'a Expression;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Expression::FunctionCall { parameters, .. } = node {
            self.stack.extend(parameters.iter().rev());
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{column, function_call, literal};

    fn sample_tree() -> Expression {
        // f1(a, f2(b, 1))
        function_call(
            None,
            "f1",
            vec![
                column(None, "a"),
                function_call(None, "f2", vec![column(Some("t"), "b"), literal(1i64)]),
            ],
        )
    }

    #[test]
    fn test_prefix_iteration() {
        let tree = sample_tree();
        let visited: Vec<String> = tree
            .iter()
            .map(|e| match e {
                Expression::FunctionCall { function_name, .. } => function_name.clone(),
                Expression::Column { column_name, .. } => column_name.clone(),
                Expression::Literal { value, .. } => value.to_string(),
            })
            .collect();
        assert_eq!(visited, vec!["f1", "a", "f2", "b", "1"]);
    }

    #[test]
    fn test_transform_is_bottom_up() {
        let mut order = Vec::new();
        let transformed = sample_tree().transform(&mut |e| {
            if let Some(name) = e.function_name() {
                order.push(name.to_string());
            }
            match e {
                Expression::Column {
                    alias,
                    table_name,
                    column_name,
                } => Expression::Column {
                    alias,
                    table_name,
                    column_name: column_name.to_uppercase(),
                },
                other => other,
            }
        });

        assert_eq!(order, vec!["f2", "f1"]);
        assert_eq!(transformed.to_string(), "f1(A, f2(t.B, 1))");
    }

    #[test]
    fn test_columns_collects_qualified_names() {
        let tree = sample_tree();
        let cols: Vec<_> = tree.columns().collect();
        assert_eq!(cols, vec![(None, "a"), (Some("t"), "b")]);
    }

    #[test]
    fn test_serde_shape() {
        let expr = function_call(Some("x".to_string()), "like", vec![column(None, "message"), literal("%err%")]);
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["type"], "FunctionCall");
        assert_eq!(json["alias"], "x");
        assert_eq!(json["parameters"][0]["type"], "Column");
        assert_eq!(json["parameters"][1]["value"], "%err%");

        let parsed: Expression = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, expr);
    }
}

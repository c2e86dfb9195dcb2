//! Stateless helpers that keep hand-built ASTs short

use crate::expressions::{Expression, Value};

pub const EQUALS: &str = "equals";
pub const NOT_EQUALS: &str = "notEquals";
pub const GREATER: &str = "greater";
pub const GREATER_OR_EQUALS: &str = "greaterOrEquals";
pub const LESS: &str = "less";
pub const LESS_OR_EQUALS: &str = "lessOrEquals";
pub const AND: &str = "and";
pub const OR: &str = "or";

/// Map a comparison operator as written in a query to its function name
pub fn operator_to_function(op: &str) -> Option<&'static str> {
    match op {
        "=" => Some(EQUALS),
        "!=" => Some(NOT_EQUALS),
        ">" => Some(GREATER),
        ">=" => Some(GREATER_OR_EQUALS),
        "<" => Some(LESS),
        "<=" => Some(LESS_OR_EQUALS),
        _ => None,
    }
}

pub fn column(table_name: Option<&str>, column_name: &str) -> Expression {
    Expression::Column {
        alias: None,
        table_name: table_name.map(str::to_string),
        column_name: column_name.to_string(),
    }
}

pub fn literal(value: impl Into<Value>) -> Expression {
    Expression::Literal {
        alias: None,
        value: value.into(),
    }
}

pub fn null() -> Expression {
    Expression::Literal {
        alias: None,
        value: Value::Null,
    }
}

pub fn function_call(
    alias: Option<String>,
    function_name: &str,
    parameters: Vec<Expression>,
) -> Expression {
    Expression::FunctionCall {
        alias,
        function_name: function_name.to_string(),
        parameters,
    }
}

pub fn binary_condition(function_name: &str, lhs: Expression, rhs: Expression) -> Expression {
    function_call(None, function_name, vec![lhs, rhs])
}

fn combine(function_name: &str, mut conditions: Vec<Expression>) -> Option<Expression> {
    // Right-nested: and(a, and(b, c))
    let mut combined = conditions.pop()?;
    while let Some(next) = conditions.pop() {
        combined = binary_condition(function_name, next, combined);
    }
    Some(combined)
}

/// Returns `None` for an empty list, the lone condition for a single one
pub fn combine_and_conditions(conditions: Vec<Expression>) -> Option<Expression> {
    combine(AND, conditions)
}

pub fn combine_or_conditions(conditions: Vec<Expression>) -> Option<Expression> {
    combine(OR, conditions)
}

pub fn literals_tuple(alias: Option<String>, literals: Vec<Value>) -> Expression {
    function_call(alias, "tuple", literals.into_iter().map(literal).collect())
}

pub fn array_element(alias: Option<String>, array_col: Expression, index: Expression) -> Expression {
    function_call(alias, "arrayElement", vec![array_col, index])
}

pub fn plus(lhs: Expression, rhs: Expression, alias: Option<String>) -> Expression {
    function_call(alias, "plus", vec![lhs, rhs])
}

pub fn minus(lhs: Expression, rhs: Expression, alias: Option<String>) -> Expression {
    function_call(alias, "minus", vec![lhs, rhs])
}

pub fn multiply(lhs: Expression, rhs: Expression, alias: Option<String>) -> Expression {
    function_call(alias, "multiply", vec![lhs, rhs])
}

pub fn div(lhs: Expression, rhs: Expression, alias: Option<String>) -> Expression {
    function_call(alias, "divide", vec![lhs, rhs])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_conditions() {
        assert_eq!(combine_and_conditions(vec![]), None);

        let single = binary_condition(EQUALS, column(None, "a"), literal(1i64));
        assert_eq!(combine_and_conditions(vec![single.clone()]), Some(single));

        let combined = combine_or_conditions(vec![
            column(None, "a"),
            column(None, "b"),
            column(None, "c"),
        ])
        .unwrap();
        assert_eq!(combined.to_string(), "or(a, or(b, c))");
    }

    #[test]
    fn test_operator_mapping() {
        assert_eq!(operator_to_function(">="), Some(GREATER_OR_EQUALS));
        assert_eq!(operator_to_function("<>"), None);
    }

    #[test]
    fn test_arithmetic_helpers() {
        let expr = div(
            plus(column(None, "a"), literal(1i64), None),
            literal(2.5),
            Some("half".to_string()),
        );
        assert_eq!(expr.to_string(), "divide(plus(a, 1), 2.5) AS `half`");
    }
}

//! Pest-based parser for SnQL

use std::collections::BTreeSet;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use qlayer_ir::dsl;
use qlayer_ir::{
    DataSource, DataSourceError, EntityKey, Expression, LimitBy, OrderBy, OrderByDirection, Query,
    SelectedExpression, Value,
};
use qlayer_registry::{EntityRegistry, RegistryError};
use thiserror::Error;

use crate::join_graph::{self, EntityMatch, RelationshipMatch};

#[derive(Parser)]
#[grammar = "snql.pest"]
pub struct SnqlParser;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Pest error: {0}")]
    Pest(#[from] pest::error::Error<Rule>),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error("Entity {entity} has no relationship {relationship}")]
    UnknownRelationship {
        entity: EntityKey,
        relationship: String,
    },

    #[error("Relationship {relationship} of {entity} joins {expected}, not {found}")]
    RelationshipTarget {
        entity: EntityKey,
        relationship: String,
        expected: EntityKey,
        found: EntityKey,
    },

    #[error("Alias {alias} is bound to both {first} and {second}")]
    ConflictingAlias {
        alias: String,
        first: EntityKey,
        second: EntityKey,
    },

    #[error("Join graph is not connected")]
    DisconnectedJoin,

    #[error("Join graph contains a cycle")]
    JoinCycle,
}

/// Parse SnQL text into a logical query. Entities and relationships are
/// resolved against `registry`.
pub fn parse_query(source: &str, registry: &EntityRegistry) -> Result<Query, ParseError> {
    let mut pairs = SnqlParser::parse(Rule::query, source)?;
    let query_pair = pairs
        .next()
        .ok_or_else(|| ParseError::Syntax("Empty input".to_string()))?;

    let mut clauses = query_pair.into_inner();
    let match_clause = next_child(&mut clauses, "MATCH clause")?;
    let (from_clause, aliases) = parse_match_clause(match_clause, registry)?;
    let mut query = Query::new(from_clause);

    for pair in clauses {
        match pair.as_rule() {
            Rule::select_clause => {
                let selected = children(pair)
                    .map(parse_selected_expression)
                    .collect::<Result<Vec<_>, _>>()?;
                query.set_selected_columns(selected);
            }
            Rule::group_by_clause => {
                let groupby = children(pair)
                    .map(parse_expression)
                    .collect::<Result<Vec<_>, _>>()?;
                query.set_groupby(groupby);
            }
            Rule::where_clause => {
                let condition = parse_condition(next_child(&mut children(pair), "condition")?)?;
                query.set_condition(Some(condition));
            }
            Rule::having_clause => {
                let having = parse_condition(next_child(&mut children(pair), "condition")?)?;
                query.set_having(Some(having));
            }
            Rule::order_by_clause => {
                let order_by = children(pair)
                    .map(parse_order_item)
                    .collect::<Result<Vec<_>, _>>()?;
                query.set_orderby(order_by);
            }
            Rule::limit_by_clause => {
                let mut inner = children(pair);
                let limit = parse_unsigned(next_child(&mut inner, "LIMIT BY count")?.as_str())?;
                let column = next_child(&mut inner, "LIMIT BY column")?;
                query.set_limitby(Some(LimitBy {
                    limit,
                    expression: dsl::column(None, column.as_str()),
                }));
            }
            Rule::limit_clause => query.set_limit(Some(parse_clause_integer(pair)?)),
            Rule::offset_clause => query.set_offset(parse_clause_integer(pair)?),
            Rule::granularity_clause => query.set_granularity(Some(parse_clause_integer(pair)?)),
            Rule::totals_clause => {
                let value = next_child(&mut children(pair), "TOTALS value")?;
                query.set_totals(value.as_str().eq_ignore_ascii_case("true"));
            }
            Rule::EOI => {}
            rule => return Err(ParseError::Syntax(format!("Unexpected clause: {rule:?}"))),
        }
    }

    qualify_columns(&mut query, &aliases);
    tracing::debug!(
        entities = ?query.get_from_clause().entity_keys(),
        "parsed query"
    );
    Ok(query)
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_match
            | Rule::kw_select
            | Rule::kw_by
            | Rule::kw_where
            | Rule::kw_having
            | Rule::kw_order_by
            | Rule::kw_limit
            | Rule::kw_offset
            | Rule::kw_granularity
            | Rule::kw_totals
            | Rule::kw_sample
            | Rule::kw_and
            | Rule::kw_or
            | Rule::kw_as
    )
}

/// Inner pairs without keyword tokens
fn children(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn next_child<'i>(
    pairs: &mut impl Iterator<Item = Pair<'i, Rule>>,
    what: &str,
) -> Result<Pair<'i, Rule>, ParseError> {
    pairs
        .next()
        .ok_or_else(|| ParseError::Syntax(format!("Missing {what}")))
}

fn parse_match_clause(
    pair: Pair<'_, Rule>,
    registry: &EntityRegistry,
) -> Result<(DataSource, BTreeSet<String>), ParseError> {
    let body = next_child(&mut children(pair), "entity")?;
    match body.as_rule() {
        Rule::entity_match => {
            let entity = parse_entity_match(body)?;
            registry.get_entity(&entity.key)?;
            let aliases = BTreeSet::from([entity.alias.clone()]);
            Ok((DataSource::Entity(entity.source()), aliases))
        }
        Rule::relationships => {
            let relationships = body
                .into_inner()
                .map(parse_relationship_match)
                .collect::<Result<Vec<_>, _>>()?;
            let join = join_graph::build_join_clause(&relationships, registry)?;
            let aliases = join
                .get_alias_node_map()
                .keys()
                .map(|alias| alias.to_string())
                .collect();
            Ok((DataSource::Join(join), aliases))
        }
        rule => Err(ParseError::Syntax(format!("Invalid MATCH body: {rule:?}"))),
    }
}

fn parse_entity_match(pair: Pair<'_, Rule>) -> Result<EntityMatch, ParseError> {
    let mut inner = children(pair);
    let alias = next_child(&mut inner, "entity alias")?.as_str().to_string();
    let name = next_child(&mut inner, "entity name")?.as_str();

    let sample_rate = match inner.next() {
        Some(sample) => {
            let rate = next_child(&mut children(sample), "sample rate")?.as_str();
            Some(
                rate.parse::<f64>()
                    .map_err(|_| ParseError::InvalidNumber(rate.to_string()))?,
            )
        }
        None => None,
    };

    Ok(EntityMatch {
        alias,
        key: EntityKey::new(name.to_lowercase()),
        sample_rate,
    })
}

fn parse_relationship_match(pair: Pair<'_, Rule>) -> Result<RelationshipMatch, ParseError> {
    let mut inner = pair.into_inner();
    let lhs = parse_entity_match(next_child(&mut inner, "relationship source")?)?;
    let link = next_child(&mut inner, "relationship")?;
    let relationship = next_child(&mut link.into_inner(), "relationship name")?
        .as_str()
        .to_string();
    let rhs = parse_entity_match(next_child(&mut inner, "relationship target")?)?;
    Ok(RelationshipMatch {
        lhs,
        relationship,
        rhs,
    })
}

fn parse_selected_expression(pair: Pair<'_, Rule>) -> Result<SelectedExpression, ParseError> {
    let text = pair.as_str().trim().to_string();
    let expression = parse_expression(next_child(&mut pair.into_inner(), "expression")?)?;
    let name = expression.alias().map(str::to_string).unwrap_or(text);
    Ok(SelectedExpression::new(name, expression))
}

fn parse_order_item(pair: Pair<'_, Rule>) -> Result<OrderBy, ParseError> {
    let mut inner = pair.into_inner();
    let expression = parse_expression(next_child(&mut inner, "ORDER BY expression")?)?;
    let direction = match next_child(&mut inner, "ORDER BY direction")?.as_rule() {
        Rule::asc => OrderByDirection::Asc,
        _ => OrderByDirection::Desc,
    };
    Ok(OrderBy {
        direction,
        expression,
    })
}

fn parse_condition(pair: Pair<'_, Rule>) -> Result<Expression, ParseError> {
    match pair.as_rule() {
        Rule::or_expression | Rule::and_expression => {
            let combine = if pair.as_rule() == Rule::or_expression {
                dsl::combine_or_conditions
            } else {
                dsl::combine_and_conditions
            };
            let conditions = children(pair)
                .map(parse_condition)
                .collect::<Result<Vec<_>, _>>()?;
            combine(conditions).ok_or_else(|| ParseError::Syntax("Empty condition".to_string()))
        }
        Rule::main_condition => {
            let mut inner = pair.into_inner();
            let lhs = parse_expression(next_child(&mut inner, "condition operand")?)?;
            let op = next_child(&mut inner, "condition operator")?.as_str();
            let rhs = parse_expression(next_child(&mut inner, "condition operand")?)?;
            let function_name = dsl::operator_to_function(op)
                .ok_or_else(|| ParseError::Syntax(format!("Unknown operator: {op}")))?;
            Ok(dsl::binary_condition(function_name, lhs, rhs))
        }
        rule => Err(ParseError::Syntax(format!("Cannot parse condition: {rule:?}"))),
    }
}

fn parse_expression(pair: Pair<'_, Rule>) -> Result<Expression, ParseError> {
    match pair.as_rule() {
        Rule::low_pri_arithmetic | Rule::high_pri_arithmetic => {
            // Flat sequence: term (op term)*, folded left to right
            let mut inner = pair.into_inner();
            let mut lhs = parse_expression(next_child(&mut inner, "operand")?)?;
            while let Some(op) = inner.next() {
                let rhs = parse_expression(next_child(&mut inner, "right operand")?)?;
                lhs = match op.as_str() {
                    "+" => dsl::plus(lhs, rhs, None),
                    "-" => dsl::minus(lhs, rhs, None),
                    "*" => dsl::multiply(lhs, rhs, None),
                    "/" => dsl::div(lhs, rhs, None),
                    other => return Err(ParseError::Syntax(format!("Unknown operator: {other}"))),
                };
            }
            Ok(lhs)
        }
        Rule::function_call => parse_function_call(pair),
        Rule::numeric_literal => parse_numeric(pair.as_str()).map(dsl::literal),
        Rule::quoted_literal => Ok(dsl::literal(unquote(pair.as_str()))),
        Rule::column_name => Ok(dsl::column(None, pair.as_str())),
        rule => Err(ParseError::Syntax(format!("Cannot parse expression: {rule:?}"))),
    }
}

fn parse_function_call(pair: Pair<'_, Rule>) -> Result<Expression, ParseError> {
    let mut inner = children(pair);
    let name = next_child(&mut inner, "function name")?.as_str().to_string();

    let mut parameters = Vec::new();
    let mut alias = None;
    for pair in inner {
        match pair.as_rule() {
            Rule::parameters_list => {
                parameters = pair
                    .into_inner()
                    .map(parse_expression)
                    .collect::<Result<Vec<_>, _>>()?;
            }
            Rule::function_alias => alias = Some(pair.as_str().to_string()),
            rule => return Err(ParseError::Syntax(format!("Invalid function call: {rule:?}"))),
        }
    }

    Ok(dsl::function_call(alias, &name, parameters))
}

fn parse_numeric(text: &str) -> Result<Value, ParseError> {
    let invalid = || ParseError::InvalidNumber(text.to_string());
    if text.contains(|c: char| c == '.' || c == 'e') {
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Value::Float(value)),
            _ => Err(invalid()),
        }
    } else {
        text.parse::<i64>().map(Value::Int).map_err(|_| invalid())
    }
}

fn parse_unsigned(text: &str) -> Result<u64, ParseError> {
    text.parse()
        .map_err(|_| ParseError::InvalidNumber(text.to_string()))
}

fn parse_clause_integer(pair: Pair<'_, Rule>) -> Result<u64, ParseError> {
    parse_unsigned(next_child(&mut children(pair), "integer")?.as_str())
}

fn unquote(text: &str) -> String {
    let body = &text[1..text.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

/// Split `alias.column` references into a qualified column when the prefix
/// names an entity in the MATCH clause
fn qualify_columns(query: &mut Query, aliases: &BTreeSet<String>) {
    query.transform_expressions(|exp| match exp {
        Expression::Column {
            alias,
            table_name: None,
            column_name,
        } => {
            let qualified = column_name
                .split_once('.')
                .filter(|(prefix, _)| aliases.contains(*prefix))
                .map(|(prefix, name)| (prefix.to_string(), name.to_string()));
            match qualified {
                Some((table_name, column_name)) => Expression::Column {
                    alias,
                    table_name: Some(table_name),
                    column_name,
                },
                None => Expression::Column {
                    alias,
                    table_name: None,
                    column_name,
                },
            }
        }
        other => other,
    });
}

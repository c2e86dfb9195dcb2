//! Logical query representation
//!
//! The query object model that sits between parsing and storage translation:
//! expressions, the from-clause data source, and the clause container that
//! query processors rewrite. All types are serializable so processed queries
//! can be inspected and fingerprinted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod data_source;
pub mod dsl;
mod expressions;
mod types;

pub use data_source::*;
pub use expressions::*;
pub use types::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedExpression {
    pub name: String,
    pub expression: Expression,
}

impl SelectedExpression {
    pub fn new(name: impl Into<String>, expression: Expression) -> Self {
        Self {
            name: name.into(),
            expression,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderByDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub direction: OrderByDirection,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitBy {
    pub limit: u64,
    pub expression: Expression,
}

/// Logical query. Owned by exactly one validation/processing pass at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    from_clause: DataSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    selected_columns: Vec<SelectedExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    array_join: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    groupby: Vec<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    having: Option<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limitby: Option<LimitBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    totals: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    granularity: Option<u64>,
}

impl Query {
    pub fn new(from_clause: impl Into<DataSource>) -> Self {
        Self {
            from_clause: from_clause.into(),
            selected_columns: Vec::new(),
            array_join: None,
            condition: None,
            groupby: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limitby: None,
            limit: None,
            offset: 0,
            totals: false,
            granularity: None,
        }
    }

    pub fn get_from_clause(&self) -> &DataSource {
        &self.from_clause
    }

    /// Replace the whole from-clause. Callers build the new value with the
    /// copy-with-override constructors (`DataSource::with_final`, ...).
    pub fn set_from_clause(&mut self, from_clause: DataSource) {
        self.from_clause = from_clause;
    }

    pub fn get_selected_columns(&self) -> &[SelectedExpression] {
        &self.selected_columns
    }

    pub fn set_selected_columns(&mut self, selected_columns: Vec<SelectedExpression>) {
        self.selected_columns = selected_columns;
    }

    pub fn get_arrayjoin(&self) -> Option<&Expression> {
        self.array_join.as_ref()
    }

    pub fn set_arrayjoin(&mut self, array_join: Option<Expression>) {
        self.array_join = array_join;
    }

    pub fn get_condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    pub fn set_condition(&mut self, condition: Option<Expression>) {
        self.condition = condition;
    }

    /// AND `condition` onto the existing condition, if any
    pub fn add_condition(&mut self, condition: Expression) {
        self.condition = match self.condition.take() {
            Some(existing) => Some(dsl::binary_condition(dsl::AND, existing, condition)),
            None => Some(condition),
        };
    }

    pub fn get_groupby(&self) -> &[Expression] {
        &self.groupby
    }

    pub fn set_groupby(&mut self, groupby: Vec<Expression>) {
        self.groupby = groupby;
    }

    pub fn get_having(&self) -> Option<&Expression> {
        self.having.as_ref()
    }

    pub fn set_having(&mut self, having: Option<Expression>) {
        self.having = having;
    }

    pub fn get_orderby(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn set_orderby(&mut self, order_by: Vec<OrderBy>) {
        self.order_by = order_by;
    }

    pub fn get_limitby(&self) -> Option<&LimitBy> {
        self.limitby.as_ref()
    }

    pub fn set_limitby(&mut self, limitby: Option<LimitBy>) {
        self.limitby = limitby;
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    pub fn get_offset(&self) -> u64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub fn has_totals(&self) -> bool {
        self.totals
    }

    pub fn set_totals(&mut self, totals: bool) {
        self.totals = totals;
    }

    pub fn get_granularity(&self) -> Option<u64> {
        self.granularity
    }

    pub fn set_granularity(&mut self, granularity: Option<u64>) {
        self.granularity = granularity;
    }

    /// Root expression of every clause, in clause order
    fn clause_roots(&self) -> impl Iterator<Item = &Expression> {
        self.selected_columns
            .iter()
            .map(|s| &s.expression)
            .chain(self.array_join.iter())
            .chain(self.condition.iter())
            .chain(self.groupby.iter())
            .chain(self.having.iter())
            .chain(self.order_by.iter().map(|o| &o.expression))
            .chain(self.limitby.iter().map(|l| &l.expression))
    }

    /// Every expression node of every clause, each clause tree in prefix order
    pub fn get_all_expressions(&self) -> impl Iterator<Item = &Expression> {
        self.clause_roots().flat_map(Expression::iter)
    }

    /// Rebuild every clause expression through [`Expression::transform`]
    pub fn transform_expressions<F>(&mut self, mut func: F)
    where
        F: FnMut(Expression) -> Expression,
    {
        let mut apply = |e: Expression| e.transform(&mut func);

        self.selected_columns = std::mem::take(&mut self.selected_columns)
            .into_iter()
            .map(|s| SelectedExpression {
                name: s.name,
                expression: apply(s.expression),
            })
            .collect();
        self.array_join = self.array_join.take().map(&mut apply);
        self.condition = self.condition.take().map(&mut apply);
        self.groupby = std::mem::take(&mut self.groupby)
            .into_iter()
            .map(&mut apply)
            .collect();
        self.having = self.having.take().map(&mut apply);
        self.order_by = std::mem::take(&mut self.order_by)
            .into_iter()
            .map(|o| OrderBy {
                direction: o.direction,
                expression: apply(o.expression),
            })
            .collect();
        self.limitby = self.limitby.take().map(|l| LimitBy {
            limit: l.limit,
            expression: apply(l.expression),
        });
    }

    /// SHA-256 over the canonical JSON form
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("query should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::dsl::*;
    use super::*;

    fn spans_query() -> Query {
        let mut query = Query::new(EntitySource::new("spans"));
        query.set_selected_columns(vec![SelectedExpression::new(
            "op",
            column(None, "op"),
        )]);
        query.set_condition(Some(binary_condition(
            EQUALS,
            column(None, "project_id"),
            literal(1i64),
        )));
        query.set_orderby(vec![OrderBy {
            direction: OrderByDirection::Desc,
            expression: function_call(None, "count", vec![]),
        }]);
        query
    }

    #[test]
    fn test_get_all_expressions_order() {
        let query = spans_query();
        let rendered: Vec<String> = query.get_all_expressions().map(|e| e.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["op", "equals(project_id, 1)", "project_id", "1", "count()"]
        );
    }

    #[test]
    fn test_add_condition_combines_with_and() {
        let mut query = spans_query();
        query.add_condition(binary_condition(LESS, column(None, "duration"), literal(10i64)));
        assert_eq!(
            query.get_condition().unwrap().to_string(),
            "and(equals(project_id, 1), less(duration, 10))"
        );
    }

    #[test]
    fn test_transform_expressions_rewrites_every_clause() {
        let mut query = spans_query();
        query.transform_expressions(|e| match e {
            Expression::Column {
                alias,
                column_name,
                ..
            } => Expression::Column {
                alias,
                table_name: Some("sp".to_string()),
                column_name,
            },
            other => other,
        });

        assert_eq!(query.get_selected_columns()[0].expression.to_string(), "sp.op");
        assert_eq!(
            query.get_condition().unwrap().to_string(),
            "equals(sp.project_id, 1)"
        );
        assert_eq!(query.get_orderby()[0].direction, OrderByDirection::Desc);
    }

    #[test]
    fn test_set_from_clause_keeps_other_clauses() {
        let mut query = spans_query();
        let before = query.clone();
        let updated = query.get_from_clause().clone().with_final(true);
        query.set_from_clause(updated);

        assert!(query.get_from_clause().is_final());
        assert_eq!(query.get_condition(), before.get_condition());
        assert_ne!(query.fingerprint(), before.fingerprint());
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let query = spans_query();
        let json = serde_json::to_string(&query).unwrap();
        let parsed: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(query.fingerprint(), parsed.fingerprint());
    }
}

//! What a query reads from: one entity, or a join tree of aliased entities

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataSourceError {
    #[error("Alias {0} is used more than once in the join")]
    DuplicateAlias(String),

    #[error("Join condition references unknown alias {0}")]
    UnknownAlias(String),
}

/// Stable identifier of a registered entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Reference to an entity inside a from-clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySource {
    pub key: EntityKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    #[serde(default)]
    pub r#final: bool,
}

impl EntitySource {
    pub fn new(key: impl Into<EntityKey>) -> Self {
        Self {
            key: key.into(),
            sample_rate: None,
            r#final: false,
        }
    }

    pub fn with_final(self, r#final: bool) -> Self {
        Self { r#final, ..self }
    }

    pub fn with_sample_rate(self, sample_rate: Option<f64>) -> Self {
        Self {
            sample_rate,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualNode {
    pub alias: String,
    pub entity: EntitySource,
}

impl IndividualNode {
    pub fn new(alias: impl Into<String>, entity: EntitySource) -> Self {
        Self {
            alias: alias.into(),
            entity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node")]
pub enum JoinNode {
    Individual(IndividualNode),
    Join(Box<JoinClause>),
}

impl From<IndividualNode> for JoinNode {
    fn from(value: IndividualNode) -> Self {
        JoinNode::Individual(value)
    }
}

impl From<JoinClause> for JoinNode {
    fn from(value: JoinClause) -> Self {
        JoinNode::Join(Box::new(value))
    }
}

/// One side of a join key: `alias.column`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConditionExpression {
    pub table_alias: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCondition {
    pub left: JoinConditionExpression,
    pub right: JoinConditionExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
}

/// Left-deep join tree. Aliases are unique across the whole tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawJoinClause")]
pub struct JoinClause {
    left: JoinNode,
    right: IndividualNode,
    keys: Vec<JoinCondition>,
    join_type: JoinType,
}

#[derive(Deserialize)]
struct RawJoinClause {
    left: JoinNode,
    right: IndividualNode,
    #[serde(default)]
    keys: Vec<JoinCondition>,
    #[serde(default)]
    join_type: JoinType,
}

impl TryFrom<RawJoinClause> for JoinClause {
    type Error = DataSourceError;

    fn try_from(raw: RawJoinClause) -> Result<Self, Self::Error> {
        JoinClause::new(raw.left, raw.right, raw.keys, raw.join_type)
    }
}

impl JoinClause {
    pub fn new(
        left: impl Into<JoinNode>,
        right: IndividualNode,
        keys: Vec<JoinCondition>,
        join_type: JoinType,
    ) -> Result<Self, DataSourceError> {
        let clause = Self {
            left: left.into(),
            right,
            keys,
            join_type,
        };

        let mut seen = HashSet::new();
        for node in clause.nodes() {
            if !seen.insert(node.alias.as_str()) {
                return Err(DataSourceError::DuplicateAlias(node.alias.clone()));
            }
        }
        for key in &clause.keys {
            for side in [&key.left, &key.right] {
                if !seen.contains(side.table_alias.as_str()) {
                    return Err(DataSourceError::UnknownAlias(side.table_alias.clone()));
                }
            }
        }

        Ok(clause)
    }

    pub fn left(&self) -> &JoinNode {
        &self.left
    }

    pub fn right(&self) -> &IndividualNode {
        &self.right
    }

    pub fn keys(&self) -> &[JoinCondition] {
        &self.keys
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    /// Every individual node, left to right
    pub fn nodes(&self) -> Vec<&IndividualNode> {
        let mut nodes = match &self.left {
            JoinNode::Individual(node) => vec![node],
            JoinNode::Join(inner) => inner.nodes(),
        };
        nodes.push(&self.right);
        nodes
    }

    pub fn get_alias_node_map(&self) -> BTreeMap<&str, &EntitySource> {
        self.nodes()
            .into_iter()
            .map(|node| (node.alias.as_str(), &node.entity))
            .collect()
    }

    /// Copy of the tree with `func` applied to every entity reference
    pub fn map_entities<F>(self, func: &mut F) -> Self
    where
        F: FnMut(EntitySource) -> EntitySource,
    {
        let left = match self.left {
            JoinNode::Individual(node) => JoinNode::Individual(IndividualNode {
                alias: node.alias,
                entity: func(node.entity),
            }),
            JoinNode::Join(inner) => JoinNode::Join(Box::new((*inner).map_entities(&mut *func))),
        };
        let right = IndividualNode {
            alias: self.right.alias,
            entity: func(self.right.entity),
        };
        Self {
            left,
            right,
            keys: self.keys,
            join_type: self.join_type,
        }
    }
}

/// A query's from-clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DataSource {
    Entity(EntitySource),
    Join(JoinClause),
}

impl DataSource {
    /// Keys of every entity read by this source, in node order
    pub fn entity_keys(&self) -> Vec<&EntityKey> {
        match self {
            DataSource::Entity(entity) => vec![&entity.key],
            DataSource::Join(join) => join.nodes().into_iter().map(|n| &n.entity.key).collect(),
        }
    }

    pub fn with_final(self, r#final: bool) -> Self {
        match self {
            DataSource::Entity(entity) => DataSource::Entity(entity.with_final(r#final)),
            DataSource::Join(join) => {
                DataSource::Join(join.map_entities(&mut |e| e.with_final(r#final)))
            }
        }
    }

    pub fn is_final(&self) -> bool {
        match self {
            DataSource::Entity(entity) => entity.r#final,
            DataSource::Join(join) => join.nodes().iter().all(|n| n.entity.r#final),
        }
    }
}

impl From<EntitySource> for DataSource {
    fn from(value: EntitySource) -> Self {
        DataSource::Entity(value)
    }
}

impl From<JoinClause> for DataSource {
    fn from(value: JoinClause) -> Self {
        DataSource::Join(value)
    }
}

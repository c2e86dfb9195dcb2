//! Resolves MATCH relationship chains into a left-deep join tree

use std::collections::VecDeque;

use qlayer_ir::{
    EntityKey, EntitySource, IndividualNode, JoinClause, JoinCondition, JoinConditionExpression,
    JoinNode, JoinType,
};
use qlayer_registry::EntityRegistry;

use crate::parser::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EntityMatch {
    pub alias: String,
    pub key: EntityKey,
    pub sample_rate: Option<f64>,
}

impl EntityMatch {
    pub fn source(&self) -> EntitySource {
        EntitySource::new(self.key.clone()).with_sample_rate(self.sample_rate)
    }
}

/// `(lhs) -[relationship]-> (rhs)`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RelationshipMatch {
    pub lhs: EntityMatch,
    pub relationship: String,
    pub rhs: EntityMatch,
}

/// Build the join for a set of relationships.
///
/// Vertices are entity aliases. The graph must have exactly one vertex with
/// no incoming edge; the tree is built breadth-first from it, so every node
/// joins onto a clause that already contains its parent.
pub(crate) fn build_join_clause(
    relationships: &[RelationshipMatch],
    registry: &EntityRegistry,
) -> Result<JoinClause, ParseError> {
    let vertices = collect_vertices(relationships)?;

    let roots: Vec<&EntityMatch> = vertices
        .iter()
        .copied()
        .filter(|v| !relationships.iter().any(|r| r.rhs.alias == v.alias))
        .collect();
    let root = match roots.as_slice() {
        [root] => *root,
        [] => return Err(ParseError::JoinCycle),
        _ => return Err(ParseError::DisconnectedJoin),
    };

    let mut tree = JoinNode::from(IndividualNode::new(root.alias.clone(), root.source()));
    let mut visited = vec![root.alias.as_str()];
    let mut queue = VecDeque::from([root]);
    while let Some(parent) = queue.pop_front() {
        for edge in relationships.iter().filter(|r| r.lhs.alias == parent.alias) {
            if visited.contains(&edge.rhs.alias.as_str()) {
                return Err(qlayer_ir::DataSourceError::DuplicateAlias(edge.rhs.alias.clone()).into());
            }
            let (keys, join_type) = join_keys(edge, registry)?;
            let node = IndividualNode::new(edge.rhs.alias.clone(), edge.rhs.source());
            tree = JoinClause::new(tree, node, keys, join_type)?.into();
            visited.push(&edge.rhs.alias);
            queue.push_back(&edge.rhs);
        }
    }

    // Anything not reached from the root sits on a cycle
    if visited.len() < vertices.len() {
        return Err(ParseError::JoinCycle);
    }

    tracing::debug!(aliases = ?visited, "resolved join graph");
    match tree {
        JoinNode::Join(clause) => Ok(*clause),
        JoinNode::Individual(_) => Err(ParseError::JoinCycle),
    }
}

/// Distinct aliases in order of first appearance
fn collect_vertices(relationships: &[RelationshipMatch]) -> Result<Vec<&EntityMatch>, ParseError> {
    let mut vertices: Vec<&EntityMatch> = Vec::new();
    for entity in relationships.iter().flat_map(|r| [&r.lhs, &r.rhs]) {
        match vertices.iter().find(|v| v.alias == entity.alias) {
            Some(existing) if existing.key != entity.key => {
                return Err(ParseError::ConflictingAlias {
                    alias: entity.alias.clone(),
                    first: existing.key.clone(),
                    second: entity.key.clone(),
                });
            }
            Some(_) => {}
            None => vertices.push(entity),
        }
    }
    Ok(vertices)
}

fn join_keys(
    edge: &RelationshipMatch,
    registry: &EntityRegistry,
) -> Result<(Vec<JoinCondition>, JoinType), ParseError> {
    let lhs = registry.get_entity(&edge.lhs.key)?;
    registry.get_entity(&edge.rhs.key)?;

    let relationship =
        lhs.get_relationship(&edge.relationship)
            .ok_or_else(|| ParseError::UnknownRelationship {
                entity: edge.lhs.key.clone(),
                relationship: edge.relationship.clone(),
            })?;
    if relationship.rhs_entity != edge.rhs.key {
        return Err(ParseError::RelationshipTarget {
            entity: edge.lhs.key.clone(),
            relationship: edge.relationship.clone(),
            expected: relationship.rhs_entity.clone(),
            found: edge.rhs.key.clone(),
        });
    }

    let keys = relationship
        .columns
        .iter()
        .map(|(lhs_column, rhs_column)| JoinCondition {
            left: JoinConditionExpression {
                table_alias: edge.lhs.alias.clone(),
                column: lhs_column.clone(),
            },
            right: JoinConditionExpression {
                table_alias: edge.rhs.alias.clone(),
                column: rhs_column.clone(),
            },
        })
        .collect();
    Ok((keys, relationship.join_type))
}

//! SnQL parser
//!
//! Turns query text such as
//!
//! ```text
//! MATCH (e: events) -[grouped]-> (g: groupedmessage)
//! SELECT count() AS c BY g.status WHERE e.project_id = 1 LIMIT 10
//! ```
//!
//! into a [`qlayer_ir::Query`], resolving entities and relationships
//! against an entity registry.

mod join_graph;
mod parser;

pub use parser::{parse_query, ParseError, Rule, SnqlParser};

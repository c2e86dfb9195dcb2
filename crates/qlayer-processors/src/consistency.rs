use crate::{QueryProcessor, RequestSettings, Result};
use qlayer_ir::Query;

/// Marks the from-clause final so the storage engine merges duplicate rows
/// at read time.
///
/// Only meant for entities backed by mutable, merging storage with few rows.
/// Idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyEnforcerProcessor;

impl QueryProcessor for ConsistencyEnforcerProcessor {
    fn name(&self) -> &'static str {
        "consistency_enforcer"
    }

    fn process_query(&self, query: &mut Query, _settings: &dyn RequestSettings) -> Result<()> {
        let from_clause = query.get_from_clause().clone().with_final(true);
        query.set_from_clause(from_clause);
        Ok(())
    }
}

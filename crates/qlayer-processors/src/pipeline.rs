//! Ordered processor execution

use crate::{QueryProcessor, RequestSettings, Result};
use qlayer_ir::Query;

/// Fixed, ordered list of processors run once per query
#[derive(Default)]
pub struct ProcessorPipeline {
    processors: Vec<Box<dyn QueryProcessor>>,
}

impl ProcessorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processor(mut self, processor: impl QueryProcessor + 'static) -> Self {
        self.push(Box::new(processor));
        self
    }

    pub fn push(&mut self, processor: Box<dyn QueryProcessor>) {
        self.processors.push(processor);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor in order. The first failure aborts the pipeline
    /// and leaves the query with the rewrites applied so far.
    pub fn run(&self, query: &mut Query, settings: &dyn RequestSettings) -> Result<()> {
        for processor in &self.processors {
            let span = tracing::info_span!("query_processor", processor = processor.name());
            let _enter = span.enter();

            if let Err(e) = processor.process_query(query, settings) {
                tracing::error!(error = %e, "query processor failed");
                return Err(e);
            }
        }
        tracing::debug!(
            processors = self.processors.len(),
            referrer = settings.get_referrer(),
            "query processed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ProcessorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

//! Query processors: in-place rewrites applied to a validated query before
//! it is handed to storage translation.

use qlayer_ir::Query;
use thiserror::Error;

mod consistency;
mod pipeline;
mod sampling;
mod settings;

pub use consistency::ConsistencyEnforcerProcessor;
pub use pipeline::ProcessorPipeline;
pub use sampling::SamplingRateProcessor;
pub use settings::{HttpRequestSettings, RequestSettings, SubscriptionRequestSettings};

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Invalid sample rate {0}: expected a value in (0, 1]")]
    InvalidSampleRate(f64),

    #[error("Processor {processor} failed: {message}")]
    Failed {
        processor: &'static str,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ProcessorError>;

/// A single rewrite step. Implementations replace clauses on the query they
/// are handed and document their own idempotence.
pub trait QueryProcessor: Send + Sync {
    /// Stable name used in logs and pipeline configuration
    fn name(&self) -> &'static str;

    fn process_query(&self, query: &mut Query, settings: &dyn RequestSettings) -> Result<()>;
}

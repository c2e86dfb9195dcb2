use crate::{ProcessorError, QueryProcessor, RequestSettings, Result};
use qlayer_ir::{DataSource, Query};

/// Applies a fixed sample rate to turbo queries that did not request one.
///
/// Only single-entity queries are sampled; joins are left untouched.
#[derive(Debug, Clone, Copy)]
pub struct SamplingRateProcessor {
    turbo_sample_rate: f64,
}

impl SamplingRateProcessor {
    pub fn new(turbo_sample_rate: f64) -> Result<Self> {
        if !(turbo_sample_rate > 0.0 && turbo_sample_rate <= 1.0) {
            return Err(ProcessorError::InvalidSampleRate(turbo_sample_rate));
        }
        Ok(Self { turbo_sample_rate })
    }

    pub fn turbo_sample_rate(&self) -> f64 {
        self.turbo_sample_rate
    }
}

impl QueryProcessor for SamplingRateProcessor {
    fn name(&self) -> &'static str {
        "sampling_rate"
    }

    fn process_query(&self, query: &mut Query, settings: &dyn RequestSettings) -> Result<()> {
        if !settings.get_turbo() {
            return Ok(());
        }
        let DataSource::Entity(source) = query.get_from_clause() else {
            return Ok(());
        };
        if source.sample_rate.is_some() {
            return Ok(());
        }

        tracing::debug!(
            entity = %source.key,
            rate = self.turbo_sample_rate,
            "applying turbo sample rate"
        );
        let sampled = source
            .clone()
            .with_sample_rate(Some(self.turbo_sample_rate));
        query.set_from_clause(sampled.into());
        Ok(())
    }
}

//! Assigns the length-based relevance score. The heuristic is a deliberate
//! placeholder: longer cleaned content scores higher, saturating at 1.0.

use async_trait::async_trait;

use super::{PipelineStage, StageContext, StageOutcome};
use crate::error::CrawlError;
use crate::item::CrawlItem;

const DEFAULT_SATURATION_LENGTH: f64 = 5000.0;

/// Third stage of the standard chain: `score = min(1.0, chars / divisor)`.
pub struct RelevanceScorer {
    divisor: f64,
}

impl RelevanceScorer {
    pub fn new() -> Self {
        Self::with_divisor(DEFAULT_SATURATION_LENGTH)
    }

    /// Content length at which the score saturates to 1.0.
    pub fn with_divisor(divisor: f64) -> Self {
        RelevanceScorer {
            divisor: divisor.max(1.0),
        }
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStage for RelevanceScorer {
    fn name(&self) -> &str {
        "relevance_scorer"
    }

    async fn process(
        &self,
        mut item: CrawlItem,
        _ctx: &StageContext,
    ) -> Result<StageOutcome, CrawlError> {
        let length = item.cleaned_content.chars().count() as f64;
        item.relevance_score = (length / self.divisor).min(1.0);
        Ok(StageOutcome::Forward(item))
    }
}

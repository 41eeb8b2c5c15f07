//! Enrichment stage: hands the item to the content analyzer and merges the
//! result. Fail-open: an analyzer failure forwards the item unenriched and
//! is reported through the stat counters, never as a drop.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use log::warn;
use tokio::sync::Semaphore;

use super::{PipelineStage, StageContext, StageOutcome};
use crate::analyzer::ContentAnalyzer;
use crate::error::CrawlError;
use crate::item::CrawlItem;

/// Final stage of the standard chain. Analyzer calls are bounded by their
/// own permit pool, separate from the fetch worker pool, so a slow analyzer
/// never stalls new fetches. The per-call timeout is the analyzer's own.
pub struct AnalyzerStage {
    analyzer: Arc<dyn ContentAnalyzer>,
    permits: Semaphore,
    max_keywords: usize,
}

impl AnalyzerStage {
    pub fn new(analyzer: Arc<dyn ContentAnalyzer>, concurrency: usize, max_keywords: usize) -> Self {
        AnalyzerStage {
            analyzer,
            permits: Semaphore::new(concurrency.max(1)),
            max_keywords,
        }
    }
}

#[async_trait]
impl PipelineStage for AnalyzerStage {
    fn name(&self) -> &str {
        "analyzer"
    }

    async fn process(
        &self,
        mut item: CrawlItem,
        ctx: &StageContext,
    ) -> Result<StageOutcome, CrawlError> {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            // Closed permit pool means shutdown; forward unenriched.
            Err(_) => return Ok(StageOutcome::Forward(item)),
        };

        ctx.state.enrichments_in_flight.fetch_add(1, Ordering::SeqCst);
        let analysis = self
            .analyzer
            .analyze(&item.cleaned_content, &item.url, &item.title)
            .await;
        match analysis {
            Ok(mut enrichment) => {
                enrichment.extracted_keywords = self
                    .analyzer
                    .extract_keywords(&item.cleaned_content, self.max_keywords)
                    .await;
                item.enrichment = enrichment;
                ctx.stats.increment_items_enriched();
            }
            Err(e) => {
                warn!("Enrichment failed for {}, forwarding unenriched: {}", item.url, e);
                ctx.stats.increment_enrichment_failures();
            }
        }
        ctx.state.enrichments_in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(StageOutcome::Forward(item))
    }

    // Closing the permit pool makes any straggler forward unenriched
    // instead of waiting for a permit that will never come.
    async fn close(&self) -> Result<(), CrawlError> {
        self.permits.close();
        Ok(())
    }
}

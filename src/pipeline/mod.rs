//! # Pipeline Module
//!
//! The ordered item-processing chain every scraped item passes through.
//!
//! ## Overview
//!
//! A pipeline is an explicit ordered list of stages, each implementing
//! [`PipelineStage`]. Stages either forward the item (possibly mutated) or
//! drop it with a reason; the first drop short-circuits the chain, so later
//! stages never observe a dropped item. Stage errors are contained here and
//! count as drops; they never unwind into the crawl loop.
//!
//! ## Stage Order
//!
//! The standard chain runs `DuplicateFilter → KeywordMatcher →
//! RelevanceScorer → AnalyzerStage`. The order is data, not behavior: the
//! engine runs whatever list it is given.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crawl_engine::pipeline::{PipelineEngine, StageContext};
//!
//! let engine = PipelineEngine::new(stages, stats, state);
//! if let Some(processed) = engine.process_item(item).await {
//!     rows.push(processed);
//! }
//! ```

mod analyzer_stage;
mod duplicate_filter;
mod keyword_matcher;
mod relevance_scorer;

pub use analyzer_stage::AnalyzerStage;
pub use duplicate_filter::DuplicateFilter;
pub use keyword_matcher::KeywordMatcher;
pub use relevance_scorer::RelevanceScorer;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, error, trace};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CrawlError;
use crate::item::CrawlItem;
use crate::state::CrawlState;
use crate::stats::StatCollector;

/// What a stage decided about one item.
#[derive(Debug)]
pub enum StageOutcome {
    /// Pass the item, possibly mutated, to the next stage.
    Forward(CrawlItem),
    /// Remove the item from the run. The reason lands in the drop counters.
    Drop { reason: String },
}

/// Shared run state handed to every stage invocation.
pub struct StageContext {
    pub stats: Arc<StatCollector>,
    pub state: Arc<CrawlState>,
}

/// One transform/drop step in the item-processing chain.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &str;

    async fn process(
        &self,
        item: CrawlItem,
        ctx: &StageContext,
    ) -> Result<StageOutcome, CrawlError>;

    /// Called once after the crawl loop drains, before the batch export.
    /// The default does nothing.
    async fn close(&self) -> Result<(), CrawlError> {
        Ok(())
    }
}

/// Runs items through an ordered stage list with first-drop short-circuit.
pub struct PipelineEngine {
    stages: Vec<Arc<dyn PipelineStage>>,
    ctx: StageContext,
    stage_timings: RwLock<HashMap<String, (Duration, usize)>>,
}

impl PipelineEngine {
    pub fn new(
        stages: Vec<Arc<dyn PipelineStage>>,
        stats: Arc<StatCollector>,
        state: Arc<CrawlState>,
    ) -> Self {
        PipelineEngine {
            stages,
            ctx: StageContext { stats, state },
            stage_timings: RwLock::new(HashMap::new()),
        }
    }

    /// Processes one item through the chain. Returns the surviving item, or
    /// `None` when a stage dropped it or errored.
    pub async fn process_item(&self, item: CrawlItem) -> Option<CrawlItem> {
        let mut item_to_process = Some(item);
        for (idx, stage) in self.stages.iter().enumerate() {
            let Some(current_item) = item_to_process.take() else {
                break;
            };
            let start_time = Instant::now();
            trace!(
                "Processing item through stage '{}' ({} of {})",
                stage.name(),
                idx + 1,
                self.stages.len()
            );

            match stage.process(current_item, &self.ctx).await {
                Ok(StageOutcome::Forward(next_item)) => {
                    self.record_timing(stage.name(), start_time.elapsed()).await;
                    item_to_process = Some(next_item);
                }
                Ok(StageOutcome::Drop { reason }) => {
                    debug!("Stage '{}' dropped item: {}", stage.name(), reason);
                    self.ctx.stats.record_item_dropped(&reason);
                    self.record_timing(stage.name(), start_time.elapsed()).await;
                    break;
                }
                Err(e) => {
                    error!("Stage '{}' error, dropping item: {:?}", stage.name(), e);
                    self.ctx
                        .stats
                        .record_item_dropped(&format!("{}-error", stage.name()));
                    self.record_timing(stage.name(), start_time.elapsed()).await;
                    break;
                }
            }
        }

        match item_to_process {
            Some(survivor) => {
                trace!("Item passed all {} stages", self.stages.len());
                self.ctx.stats.increment_items_forwarded();
                Some(survivor)
            }
            None => None,
        }
    }

    /// Closes every stage concurrently. Close failures are logged, never
    /// propagated; the batch export still runs.
    pub async fn close_stages(&self) {
        trace!("Closing {} pipeline stages", self.stages.len());
        let closing: Vec<_> = self.stages.iter().map(|stage| stage.close()).collect();
        for (stage, result) in self.stages.iter().zip(join_all(closing).await) {
            if let Err(e) = result {
                error!("Stage '{}' failed to close: {:?}", stage.name(), e);
            }
        }
    }

    async fn record_timing(&self, stage_name: &str, elapsed: Duration) {
        let mut timings = self.stage_timings.write().await;
        let (total_time, count) = timings
            .entry(stage_name.to_string())
            .or_insert((Duration::new(0, 0), 0));
        *total_time += elapsed;
        *count += 1;
    }

    /// Per-stage cumulative processing time and invocation count.
    pub async fn stage_timings(&self) -> HashMap<String, (Duration, usize)> {
        self.stage_timings.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_item(url: &str) -> CrawlItem {
        CrawlItem::new(url, "title", "raw", "cleaned text", 0)
    }

    fn engine_with(stages: Vec<Arc<dyn PipelineStage>>) -> PipelineEngine {
        PipelineEngine::new(stages, Arc::new(StatCollector::default()), CrawlState::new())
    }

    struct CountingStage {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PipelineStage for CountingStage {
        fn name(&self) -> &str {
            "counting"
        }

        async fn process(
            &self,
            item: CrawlItem,
            _ctx: &StageContext,
        ) -> Result<StageOutcome, CrawlError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StageOutcome::Forward(item))
        }
    }

    struct DropAllStage;

    #[async_trait]
    impl PipelineStage for DropAllStage {
        fn name(&self) -> &str {
            "drop_all"
        }

        async fn process(
            &self,
            _item: CrawlItem,
            _ctx: &StageContext,
        ) -> Result<StageOutcome, CrawlError> {
            Ok(StageOutcome::Drop {
                reason: "rejected".to_string(),
            })
        }
    }

    struct FailingStage;

    #[async_trait]
    impl PipelineStage for FailingStage {
        fn name(&self) -> &str {
            "failing"
        }

        async fn process(
            &self,
            _item: CrawlItem,
            _ctx: &StageContext,
        ) -> Result<StageOutcome, CrawlError> {
            Err(CrawlError::Validation("missing field".to_string()))
        }
    }

    #[tokio::test]
    async fn items_flow_through_all_stages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(vec![
            Arc::new(CountingStage { calls: Arc::clone(&calls) }),
            Arc::new(CountingStage { calls: Arc::clone(&calls) }),
        ]);
        let survivor = engine.process_item(test_item("http://a")).await;
        assert!(survivor.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn drop_short_circuits_later_stages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(vec![
            Arc::new(DropAllStage),
            Arc::new(CountingStage { calls: Arc::clone(&calls) }),
        ]);
        let survivor = engine.process_item(test_item("http://a")).await;
        assert!(survivor.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "stage after a drop ran");
    }

    #[tokio::test]
    async fn stage_error_is_contained_as_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(vec![
            Arc::new(FailingStage),
            Arc::new(CountingStage { calls: Arc::clone(&calls) }),
        ]);
        let survivor = engine.process_item(test_item("http://a")).await;
        assert!(survivor.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timings_are_recorded_per_stage() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(vec![Arc::new(CountingStage { calls })]);
        engine.process_item(test_item("http://a")).await;
        engine.process_item(test_item("http://b")).await;
        let timings = engine.stage_timings().await;
        assert_eq!(timings.get("counting").map(|(_, count)| *count), Some(2));
    }

    struct ClosableStage {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PipelineStage for ClosableStage {
        fn name(&self) -> &str {
            "closable"
        }

        async fn process(
            &self,
            item: CrawlItem,
            _ctx: &StageContext,
        ) -> Result<StageOutcome, CrawlError> {
            Ok(StageOutcome::Forward(item))
        }

        async fn close(&self) -> Result<(), CrawlError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn every_stage_is_closed_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(vec![
            Arc::new(ClosableStage { closed: Arc::clone(&closed) }),
            Arc::new(ClosableStage { closed: Arc::clone(&closed) }),
        ]);
        engine.close_stages().await;
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }
}

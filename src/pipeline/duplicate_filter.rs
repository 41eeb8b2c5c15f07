//! Drops items already seen by this crawler instance. The seen-set is keyed
//! by URL and survives across runs, so re-crawling the same manager never
//! exports the same page twice.

use async_trait::async_trait;
use log::debug;
use moka::sync::Cache;

use super::{PipelineStage, StageContext, StageOutcome};
use crate::error::CrawlError;
use crate::item::CrawlItem;

const DEFAULT_SEEN_CAPACITY: u64 = 100_000;

/// First stage of the standard chain: exact-URL deduplication.
pub struct DuplicateFilter {
    seen: Cache<String, ()>,
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SEEN_CAPACITY)
    }

    /// Caps the seen-set; beyond it the oldest entries are evicted, which
    /// trades memory for the small chance of re-admitting an old URL.
    pub fn with_capacity(max_capacity: u64) -> Self {
        DuplicateFilter {
            seen: Cache::new(max_capacity),
        }
    }

    #[cfg(test)]
    pub(crate) fn seen_count(&self) -> u64 {
        self.seen.run_pending_tasks();
        self.seen.entry_count()
    }
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStage for DuplicateFilter {
    fn name(&self) -> &str {
        "duplicate_filter"
    }

    async fn process(
        &self,
        item: CrawlItem,
        _ctx: &StageContext,
    ) -> Result<StageOutcome, CrawlError> {
        let entry = self.seen.entry(item.url.clone()).or_insert(());
        if entry.is_fresh() {
            Ok(StageOutcome::Forward(item))
        } else {
            Ok(StageOutcome::Drop {
                reason: "duplicate".to_string(),
            })
        }
    }

    // The seen-set is kept, not cleared: it is scoped to the crawler
    // instance, not to one run.
    async fn close(&self) -> Result<(), CrawlError> {
        self.seen.run_pending_tasks();
        debug!("Duplicate filter closing with {} URLs seen", self.seen.entry_count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CrawlState;
    use crate::stats::StatCollector;
    use std::sync::Arc;

    fn ctx() -> StageContext {
        StageContext {
            stats: Arc::new(StatCollector::default()),
            state: CrawlState::new(),
        }
    }

    fn item(url: &str) -> CrawlItem {
        CrawlItem::new(url, "t", "raw", "clean", 0)
    }

    #[tokio::test]
    async fn second_occurrence_is_dropped_as_duplicate() {
        let filter = DuplicateFilter::new();
        let ctx = ctx();

        let first = filter.process(item("http://a"), &ctx).await.unwrap();
        assert!(matches!(first, StageOutcome::Forward(_)));

        let second = filter.process(item("http://a"), &ctx).await.unwrap();
        match second {
            StageOutcome::Drop { reason } => assert_eq!(reason, "duplicate"),
            StageOutcome::Forward(_) => panic!("duplicate forwarded"),
        }
    }

    #[tokio::test]
    async fn distinct_urls_all_forward() {
        let filter = DuplicateFilter::new();
        let ctx = ctx();
        for url in ["http://a", "http://b", "http://c"] {
            let outcome = filter.process(item(url), &ctx).await.unwrap();
            assert!(matches!(outcome, StageOutcome::Forward(_)));
        }
        assert_eq!(filter.seen_count(), 3);
    }
}

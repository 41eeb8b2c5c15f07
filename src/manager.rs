//! # Manager Module
//!
//! The central orchestrator for a crawl run.
//!
//! ## Overview
//!
//! `CrawlerManager` ties the frontier coordinator, the fetch worker pool,
//! the item pipeline, and the exporter together and drives them through the
//! crawl lifecycle `IDLE → RUNNING → {COMPLETED, STOPPED}`. It owns all
//! shared run state; collaborators only see their own narrow trait.
//!
//! ## Lifecycle
//!
//! `start_crawl` validates its inputs, seeds the frontier, and spawns the
//! coordinator plus a bounded pool of fetch workers. Each worker pulls URLs
//! from the dispatch channel, fetches, runs every scraped item through the
//! stage chain, and reports back to the coordinator. The manager watches
//! for the run to drain (or for a stop request), shuts the machinery down,
//! and hands the accumulated rows to the exporter in one batch.
//!
//! Per-URL and per-item failures are contained inside the run; only
//! startup validation and the final export can fail the call.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crawl_engine::CrawlerBuilder;
//!
//! let manager = Arc::new(CrawlerBuilder::new().build()?);
//! let report = manager
//!     .start_crawl(
//!         vec!["https://example.com".to_string()],
//!         vec!["rust".to_string()],
//!         vec!["title".to_string(), "url".to_string()],
//!     )
//!     .await?;
//! println!("exported {} rows to {}", report.rows_exported, report.artifact.display());
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crossbeam::queue::SegQueue;
use kanal::AsyncReceiver;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::analyzer::ContentAnalyzer;
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::export::Exporter;
use crate::fetch::Fetcher;
use crate::frontier::{Frontier, FrontierCoordinator, QueuedUrl};
use crate::item::CrawlItem;
use crate::pipeline::{
    AnalyzerStage, DuplicateFilter, KeywordMatcher, PipelineEngine, PipelineStage, RelevanceScorer,
};
use crate::state::CrawlState;
use crate::stats::{StatCollector, StatsSnapshot};

const PHASE_IDLE: u8 = 0;
const PHASE_RUNNING: u8 = 1;
const PHASE_COMPLETED: u8 = 2;
const PHASE_STOPPED: u8 = 3;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle state of a crawl run. `Completed` and `Stopped` are terminal;
/// a manager drives exactly one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrawlPhase {
    Idle,
    Running,
    Completed,
    Stopped,
}

impl CrawlPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            PHASE_RUNNING => CrawlPhase::Running,
            PHASE_COMPLETED => CrawlPhase::Completed,
            PHASE_STOPPED => CrawlPhase::Stopped,
            _ => CrawlPhase::Idle,
        }
    }
}

/// Point-in-time view of a run, queryable from any task.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlStatus {
    pub state: CrawlPhase,
    pub active_workers: usize,
    pub rows_collected: usize,
    pub stats: StatsSnapshot,
}

/// Final outcome of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub state: CrawlPhase,
    pub rows_exported: usize,
    /// Path of the artifact the exporter wrote.
    pub artifact: PathBuf,
    pub stats: StatsSnapshot,
}

/// The central orchestrator: wires collaborators together and drives one
/// crawl run through its lifecycle.
pub struct CrawlerManager {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    analyzer: Arc<dyn ContentAnalyzer>,
    exporter: Arc<dyn Exporter>,
    duplicate_filter: Arc<DuplicateFilter>,
    state: Arc<CrawlState>,
    stats: Arc<StatCollector>,
    rows: Arc<SegQueue<CrawlItem>>,
    phase: AtomicU8,
}

impl CrawlerManager {
    pub(crate) fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn Fetcher>,
        analyzer: Arc<dyn ContentAnalyzer>,
        exporter: Arc<dyn Exporter>,
    ) -> Self {
        CrawlerManager {
            config,
            fetcher,
            analyzer,
            exporter,
            duplicate_filter: Arc::new(DuplicateFilter::new()),
            state: CrawlState::new(),
            stats: Arc::new(StatCollector::default()),
            rows: Arc::new(SegQueue::new()),
            phase: AtomicU8::new(PHASE_IDLE),
        }
    }

    /// Runs one crawl to completion: seeds the frontier, spawns the
    /// coordinator and fetch workers, waits for the run to drain or stop,
    /// and exports the surviving rows exactly once.
    pub async fn start_crawl(
        &self,
        seeds: Vec<String>,
        keywords: Vec<String>,
        fields: Vec<String>,
    ) -> Result<CrawlReport, CrawlError> {
        validate_seeds(&seeds)?;
        validate_fields(&fields)?;

        if self
            .phase
            .compare_exchange(PHASE_IDLE, PHASE_RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CrawlError::Config(
                "crawl already started; a manager drives exactly one run".to_string(),
            ));
        }

        info!(
            "Starting crawl: {} seeds, {} keywords, fetch_workers={}, max_queue_size={}, max_visited={}",
            seeds.len(),
            keywords.len(),
            self.config.fetch_workers,
            self.config.max_queue_size,
            self.config.max_visited
        );

        let engine = Arc::new(PipelineEngine::new(
            self.build_stages(&keywords),
            Arc::clone(&self.stats),
            Arc::clone(&self.state),
        ));

        let mut frontier = Frontier::new(self.config.max_queue_size, self.config.max_visited);
        let admission = frontier.add_urls(seeds, 0);
        self.stats.add_urls_admitted(admission.admitted);
        self.stats.add_urls_rejected_duplicate(admission.duplicates);
        self.stats.add_urls_rejected_capacity(admission.over_capacity);

        let (coordinator, url_rx) = FrontierCoordinator::spawn(
            frontier,
            Arc::clone(&self.state),
            Arc::clone(&self.stats),
            self.config.channel_capacity,
        );

        let worker_ctx = WorkerContext {
            fetcher: Arc::clone(&self.fetcher),
            engine: Arc::clone(&engine),
            coordinator: Arc::clone(&coordinator),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            rows: Arc::clone(&self.rows),
            max_depth: self.config.max_depth,
        };

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.fetch_workers {
            workers.spawn(run_fetch_worker(
                worker_id,
                url_rx.clone(),
                worker_ctx.clone(),
            ));
        }
        drop(url_rx);

        self.wait_until_drained(&coordinator).await;

        let final_phase = if self.state.stop_requested() {
            info!("Stop requested, finishing crawl as STOPPED");
            PHASE_STOPPED
        } else {
            info!("Crawl has become idle, finishing as COMPLETED");
            PHASE_COMPLETED
        };
        self.phase.store(final_phase, Ordering::SeqCst);

        coordinator.shutdown().await;
        self.drain_workers(workers).await;
        engine.close_stages().await;

        if let Some((slowest, (total, count))) = engine
            .stage_timings()
            .await
            .iter()
            .max_by_key(|(_, (total, _))| *total)
        {
            debug!(
                "Slowest stage '{}': {:?} over {} invocations",
                slowest, total, count
            );
        }

        let report = self.export_batch(&fields).await?;

        info!("Crawl finished. {}", self.stats.snapshot());
        Ok(report)
    }

    /// Requests a cooperative stop. Workers observe the flag between URL
    /// pops; in-flight fetch and analyzer calls run to completion.
    pub fn stop_crawling(&self) {
        info!("Stop requested for running crawl");
        self.state.request_stop();
    }

    /// Snapshot of the run as it stands right now.
    pub fn crawl_status(&self) -> CrawlStatus {
        let stats = self.stats.snapshot();
        CrawlStatus {
            state: CrawlPhase::from_u8(self.phase.load(Ordering::SeqCst)),
            active_workers: self.state.active_fetches(),
            rows_collected: self.rows.len() + stats.rows_exported,
            stats,
        }
    }

    fn build_stages(&self, keywords: &[String]) -> Vec<Arc<dyn PipelineStage>> {
        let mut stages: Vec<Arc<dyn PipelineStage>> = vec![
            Arc::clone(&self.duplicate_filter) as Arc<dyn PipelineStage>,
            Arc::new(KeywordMatcher::new(keywords, self.config.strict_filter)),
            Arc::new(RelevanceScorer::new()),
        ];
        if self.config.enrichment_enabled {
            stages.push(Arc::new(AnalyzerStage::new(
                Arc::clone(&self.analyzer),
                self.config.enrichment_concurrency,
                self.config.analyzer.max_keywords,
            )));
        }
        stages
    }

    async fn wait_until_drained(&self, coordinator: &FrontierCoordinator) {
        loop {
            if self.state.stop_requested() {
                break;
            }
            if coordinator.is_idle() && self.state.is_idle() {
                // Idle can flicker while messages are in flight between a
                // worker and the coordinator; confirm before shutting down.
                tokio::time::sleep(Duration::from_millis(50)).await;
                if coordinator.is_idle() && self.state.is_idle() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn drain_workers(&self, mut workers: JoinSet<()>) {
        let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            while let Some(result) = workers.join_next().await {
                if let Err(e) = result {
                    error!("A fetch worker failed: {:?}", e);
                } else {
                    trace!("Fetch worker completed");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "Fetch workers did not finish within {}s, aborting remaining tasks",
                SHUTDOWN_TIMEOUT.as_secs()
            );
            workers.abort_all();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Projects accumulated items onto the field list and writes the
    /// artifact. Runs exactly once per crawl, zero rows included.
    async fn export_batch(&self, fields: &[String]) -> Result<CrawlReport, CrawlError> {
        let mut batch = Vec::new();
        while let Some(item) = self.rows.pop() {
            batch.push(item);
        }

        let mut export_rows = Vec::with_capacity(batch.len());
        for item in &batch {
            match item.to_row(fields) {
                Ok(row) => export_rows.push(row),
                Err(e) => {
                    warn!("Skipping unprojectable item {}: {}", item.url, e);
                    self.stats.record_item_dropped("validation");
                }
            }
        }

        let artifact = self
            .exporter
            .write(fields, &export_rows, &self.config.output_prefix)
            .await?;
        self.stats.add_rows_exported(export_rows.len());

        Ok(CrawlReport {
            state: CrawlPhase::from_u8(self.phase.load(Ordering::SeqCst)),
            rows_exported: export_rows.len(),
            artifact,
            stats: self.stats.snapshot(),
        })
    }
}

fn validate_seeds(seeds: &[String]) -> Result<(), CrawlError> {
    if seeds.is_empty() {
        return Err(CrawlError::Config("seed URL list is empty".to_string()));
    }
    for seed in seeds {
        let parsed = Url::parse(seed)
            .map_err(|e| CrawlError::Config(format!("invalid seed URL '{}': {}", seed, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CrawlError::Config(format!(
                "invalid seed URL '{}': scheme must be http or https",
                seed
            )));
        }
    }
    Ok(())
}

fn validate_fields(fields: &[String]) -> Result<(), CrawlError> {
    if fields.is_empty() {
        return Err(CrawlError::Config("export field list is empty".to_string()));
    }
    for field in fields {
        if !CrawlItem::known_fields().contains(&field.as_str()) {
            return Err(CrawlError::Config(format!(
                "unknown export field '{}', expected one of: {}",
                field,
                CrawlItem::known_fields().join(", ")
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
struct WorkerContext {
    fetcher: Arc<dyn Fetcher>,
    engine: Arc<PipelineEngine>,
    coordinator: Arc<FrontierCoordinator>,
    state: Arc<CrawlState>,
    stats: Arc<StatCollector>,
    rows: Arc<SegQueue<CrawlItem>>,
    max_depth: usize,
}

async fn run_fetch_worker(worker_id: usize, url_rx: AsyncReceiver<QueuedUrl>, ctx: WorkerContext) {
    trace!("Fetch worker {} started", worker_id);
    while let Ok(entry) = url_rx.recv().await {
        // Cooperative stop: finish nothing new once the flag is up, but the
        // fetch already in flight on another worker runs to completion.
        if ctx.state.stop_requested() {
            trace!("Fetch worker {} observed stop request, exiting", worker_id);
            break;
        }
        ctx.state.in_flight_fetches.fetch_add(1, Ordering::SeqCst);
        process_url(&entry, &ctx).await;
        ctx.state.in_flight_fetches.fetch_sub(1, Ordering::SeqCst);
    }
    trace!("Fetch worker {} finished", worker_id);
}

async fn process_url(entry: &QueuedUrl, ctx: &WorkerContext) {
    trace!("Worker fetching URL: {}", entry.url);
    match ctx.fetcher.fetch(&entry.url).await {
        Ok(output) => {
            ctx.stats.increment_urls_fetched();
            if let Some(status) = output.status {
                ctx.stats.record_response_status(status);
            }
            ctx.stats.add_bytes_downloaded(output.bytes_downloaded);

            if entry.depth < ctx.max_depth {
                ctx.coordinator
                    .enqueue_urls(output.discovered_urls, entry.depth + 1)
                    .await;
            }

            for mut item in output.items {
                item.depth = entry.depth;
                ctx.stats.increment_items_scraped();
                if let Err(e) = item.validate() {
                    warn!("Dropping invalid item from {}: {}", entry.url, e);
                    ctx.stats.record_item_dropped("validation");
                    continue;
                }
                ctx.state.items_in_pipeline.fetch_add(1, Ordering::SeqCst);
                let survivor = ctx.engine.process_item(item).await;
                ctx.state.items_in_pipeline.fetch_sub(1, Ordering::SeqCst);
                if let Some(processed) = survivor {
                    ctx.rows.push(processed);
                }
            }

            ctx.coordinator.mark_visited(entry.url.clone()).await;
        }
        Err(e) => {
            error!("Fetch failed for {}: {}", entry.url, e);
            ctx.stats.increment_fetch_errors();
            ctx.coordinator.release(entry.url.clone()).await;
        }
    }
}

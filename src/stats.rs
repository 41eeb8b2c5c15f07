//! # Statistics Module
//!
//! Collects and stores metrics about a crawl run.
//!
//! ## Overview
//!
//! The `StatCollector` tracks counters across the whole crawl: frontier
//! admissions and rejections, fetch outcomes, pipeline drops per reason,
//! enrichment results, and exported rows. These counts are how a partially
//! failing crawl reports its losses without failing the run.
//!
//! ## Key Metrics Tracked
//!
//! - **Frontier Metrics**: admitted, duplicate-rejected, capacity-rejected,
//!   and visit-cap-skipped URLs
//! - **Fetch Metrics**: fetched pages, fetch errors, status code distribution,
//!   downloaded bytes
//! - **Item Metrics**: scraped, forwarded, and dropped items, with a per-reason
//!   drop breakdown
//! - **Enrichment Metrics**: successful and failed analyzer calls
//! - **Export Metrics**: rows written to the final artifact
//!
//! ## Example
//!
//! ```rust,ignore
//! use crawl_engine::StatCollector;
//!
//! let stats = StatCollector::default();
//! stats.increment_urls_fetched();
//! stats.record_item_dropped("duplicate");
//! println!("{}", stats);
//! ```

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use serde::Serialize;

use crate::error::CrawlError;

/// A consistent snapshot of the current statistics, used for reporting and
/// embedded in crawl status responses.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub urls_admitted: usize,
    pub urls_rejected_duplicate: usize,
    pub urls_rejected_capacity: usize,
    pub urls_skipped_visit_cap: usize,
    pub urls_fetched: usize,
    pub fetch_errors: usize,
    pub total_bytes_downloaded: usize,
    pub items_scraped: usize,
    pub items_forwarded: usize,
    pub items_dropped: usize,
    pub drop_reasons: HashMap<String, usize>,
    pub items_enriched: usize,
    pub enrichment_failures: usize,
    pub rows_exported: usize,
    pub response_status_counts: HashMap<u16, usize>,
    pub elapsed_duration: Duration,
}

impl StatsSnapshot {
    fn formatted_duration(&self) -> String {
        format!("{:?}", self.elapsed_duration)
    }

    fn pages_per_second(&self) -> f64 {
        let total_seconds = self.elapsed_duration.as_secs_f64();
        if total_seconds > 0.0 {
            self.urls_fetched as f64 / total_seconds
        } else {
            0.0
        }
    }

    fn items_per_second(&self) -> f64 {
        let total_seconds = self.elapsed_duration.as_secs_f64();
        if total_seconds > 0.0 {
            self.items_scraped as f64 / total_seconds
        } else {
            0.0
        }
    }

    fn formatted_bytes(&self) -> String {
        const KB: usize = 1024;
        const MB: usize = 1024 * KB;
        const GB: usize = 1024 * MB;

        if self.total_bytes_downloaded >= GB {
            format!("{:.2} GB", self.total_bytes_downloaded as f64 / GB as f64)
        } else if self.total_bytes_downloaded >= MB {
            format!("{:.2} MB", self.total_bytes_downloaded as f64 / MB as f64)
        } else if self.total_bytes_downloaded >= KB {
            format!("{:.2} KB", self.total_bytes_downloaded as f64 / KB as f64)
        } else {
            format!("{} B", self.total_bytes_downloaded)
        }
    }
}

/// Collects and stores various statistics about a crawl run.
#[derive(Debug, Serialize)]
pub struct StatCollector {
    #[serde(skip)]
    pub start_time: Instant,

    // Frontier-related metrics
    pub urls_admitted: AtomicUsize,
    pub urls_rejected_duplicate: AtomicUsize,
    pub urls_rejected_capacity: AtomicUsize,
    pub urls_skipped_visit_cap: AtomicUsize,

    // Fetch-related metrics
    pub urls_fetched: AtomicUsize,
    pub fetch_errors: AtomicUsize,
    pub response_status_counts: DashMap<u16, usize>,
    pub total_bytes_downloaded: AtomicUsize,

    // Item-related metrics
    pub items_scraped: AtomicUsize,
    pub items_forwarded: AtomicUsize,
    pub items_dropped: AtomicUsize,
    pub drop_reasons: DashMap<String, usize>,

    // Enrichment-related metrics
    pub items_enriched: AtomicUsize,
    pub enrichment_failures: AtomicUsize,

    // Export-related metrics
    pub rows_exported: AtomicUsize,
}

impl StatCollector {
    /// Creates a new `StatCollector` with all counters initialized to zero.
    pub(crate) fn new() -> Self {
        StatCollector {
            start_time: Instant::now(),
            urls_admitted: AtomicUsize::new(0),
            urls_rejected_duplicate: AtomicUsize::new(0),
            urls_rejected_capacity: AtomicUsize::new(0),
            urls_skipped_visit_cap: AtomicUsize::new(0),
            urls_fetched: AtomicUsize::new(0),
            fetch_errors: AtomicUsize::new(0),
            response_status_counts: DashMap::new(),
            total_bytes_downloaded: AtomicUsize::new(0),
            items_scraped: AtomicUsize::new(0),
            items_forwarded: AtomicUsize::new(0),
            items_dropped: AtomicUsize::new(0),
            drop_reasons: DashMap::new(),
            items_enriched: AtomicUsize::new(0),
            enrichment_failures: AtomicUsize::new(0),
            rows_exported: AtomicUsize::new(0),
        }
    }

    /// Creates a snapshot of the current statistics.
    /// This is the single source of truth for all presentation logic.
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut status_counts: HashMap<u16, usize> = HashMap::new();
        for entry in self.response_status_counts.iter() {
            let (key, value) = entry.pair();
            status_counts.insert(*key, *value);
        }

        let mut drop_reasons: HashMap<String, usize> = HashMap::new();
        for entry in self.drop_reasons.iter() {
            let (key, value) = entry.pair();
            drop_reasons.insert(key.clone(), *value);
        }

        StatsSnapshot {
            urls_admitted: self.urls_admitted.load(Ordering::SeqCst),
            urls_rejected_duplicate: self.urls_rejected_duplicate.load(Ordering::SeqCst),
            urls_rejected_capacity: self.urls_rejected_capacity.load(Ordering::SeqCst),
            urls_skipped_visit_cap: self.urls_skipped_visit_cap.load(Ordering::SeqCst),
            urls_fetched: self.urls_fetched.load(Ordering::SeqCst),
            fetch_errors: self.fetch_errors.load(Ordering::SeqCst),
            total_bytes_downloaded: self.total_bytes_downloaded.load(Ordering::SeqCst),
            items_scraped: self.items_scraped.load(Ordering::SeqCst),
            items_forwarded: self.items_forwarded.load(Ordering::SeqCst),
            items_dropped: self.items_dropped.load(Ordering::SeqCst),
            drop_reasons,
            items_enriched: self.items_enriched.load(Ordering::SeqCst),
            enrichment_failures: self.enrichment_failures.load(Ordering::SeqCst),
            rows_exported: self.rows_exported.load(Ordering::SeqCst),
            response_status_counts: status_counts,
            elapsed_duration: self.start_time.elapsed(),
        }
    }

    /// Adds to the count of URLs admitted to the frontier.
    pub(crate) fn add_urls_admitted(&self, count: usize) {
        self.urls_admitted.fetch_add(count, Ordering::SeqCst);
    }

    /// Adds to the count of URLs rejected as duplicates.
    pub(crate) fn add_urls_rejected_duplicate(&self, count: usize) {
        self.urls_rejected_duplicate.fetch_add(count, Ordering::SeqCst);
    }

    /// Adds to the count of URLs silently dropped at capacity.
    pub(crate) fn add_urls_rejected_capacity(&self, count: usize) {
        self.urls_rejected_capacity.fetch_add(count, Ordering::SeqCst);
    }

    /// Increments the count of popped URLs skipped by the visit cap.
    pub(crate) fn increment_urls_skipped_visit_cap(&self) {
        self.urls_skipped_visit_cap.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of successfully fetched URLs.
    pub(crate) fn increment_urls_fetched(&self) {
        self.urls_fetched.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of failed fetches.
    pub(crate) fn increment_fetch_errors(&self) {
        self.fetch_errors.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a response status code.
    pub(crate) fn record_response_status(&self, status_code: u16) {
        *self.response_status_counts.entry(status_code).or_insert(0) += 1;
    }

    /// Adds to the total bytes downloaded.
    pub(crate) fn add_bytes_downloaded(&self, bytes: usize) {
        self.total_bytes_downloaded.fetch_add(bytes, Ordering::SeqCst);
    }

    /// Increments the count of items produced by the fetcher.
    pub(crate) fn increment_items_scraped(&self) {
        self.items_scraped.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of items that survived the stage chain.
    pub(crate) fn increment_items_forwarded(&self) {
        self.items_forwarded.fetch_add(1, Ordering::SeqCst);
    }

    /// Records an item dropped by a pipeline stage, keyed by drop reason.
    pub(crate) fn record_item_dropped(&self, reason: &str) {
        self.items_dropped.fetch_add(1, Ordering::SeqCst);
        *self.drop_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Increments the count of successfully enriched items.
    pub(crate) fn increment_items_enriched(&self) {
        self.items_enriched.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of swallowed analyzer failures.
    pub(crate) fn increment_enrichment_failures(&self) {
        self.enrichment_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Adds to the count of rows handed to the exporter.
    pub(crate) fn add_rows_exported(&self, count: usize) {
        self.rows_exported.fetch_add(count, Ordering::SeqCst);
    }

    /// Converts the snapshot into a JSON string.
    pub fn to_json_string(&self) -> Result<String, CrawlError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for StatCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nCrawl Statistics")?;
        writeln!(f, "----------------")?;
        writeln!(f, "  duration : {}", self.formatted_duration())?;
        writeln!(
            f,
            "  speed    : pages/s: {:.2}, items/s: {:.2}",
            self.pages_per_second(),
            self.items_per_second()
        )?;
        writeln!(
            f,
            "  frontier : admitted: {}, dup: {}, over_capacity: {}, visit_cap: {}",
            self.urls_admitted,
            self.urls_rejected_duplicate,
            self.urls_rejected_capacity,
            self.urls_skipped_visit_cap
        )?;
        writeln!(
            f,
            "  fetch    : ok: {}, failed: {}, downloaded: {}",
            self.urls_fetched,
            self.fetch_errors,
            self.formatted_bytes()
        )?;
        writeln!(
            f,
            "  items    : scraped: {}, forwarded: {}, dropped: {}",
            self.items_scraped, self.items_forwarded, self.items_dropped
        )?;
        writeln!(
            f,
            "  enrich   : ok: {}, failed: {}",
            self.items_enriched, self.enrichment_failures
        )?;
        writeln!(f, "  export   : rows: {}", self.rows_exported)?;

        let drop_string = if self.drop_reasons.is_empty() {
            "none".to_string()
        } else {
            let mut reasons: Vec<_> = self.drop_reasons.iter().collect();
            reasons.sort();
            reasons
                .iter()
                .map(|(reason, count)| format!("{}: {}", reason, count))
                .collect::<Vec<String>>()
                .join(", ")
        };
        writeln!(f, "  drops    : {}", drop_string)?;

        let status_string = if self.response_status_counts.is_empty() {
            "none".to_string()
        } else {
            let mut codes: Vec<_> = self.response_status_counts.iter().collect();
            codes.sort();
            codes
                .iter()
                .map(|(code, count)| format!("{}: {}", code, count))
                .collect::<Vec<String>>()
                .join(", ")
        };

        writeln!(f, "  status   : {}\n", status_string)
    }
}

impl std::fmt::Display for StatCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

//! Module for tracking the live activity of a crawl run.
//!
//! This module defines the `CrawlState` struct, a centralized set of atomic
//! counters describing what the crawl workers are doing right now:
//! - The number of fetches currently in flight.
//! - The number of items currently moving through the pipeline stages.
//! - The number of enrichment calls currently outstanding.
//!
//! It also carries the cooperative stop flag. Setting it requests an early
//! finish; the coordinator observes it only between frontier pops, so work
//! already in flight always completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Shared activity counters for the crawl workers.
#[derive(Debug, Default)]
pub struct CrawlState {
    /// The number of URLs currently being fetched.
    pub in_flight_fetches: AtomicUsize,
    /// The number of items currently inside the stage chain.
    pub items_in_pipeline: AtomicUsize,
    /// The number of analyzer calls currently outstanding.
    pub enrichments_in_flight: AtomicUsize,
    stop_requested: AtomicBool,
}

impl CrawlState {
    /// Creates a new, atomically reference-counted `CrawlState`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Checks if all crawl activities are idle.
    pub fn is_idle(&self) -> bool {
        self.in_flight_fetches.load(Ordering::SeqCst) == 0
            && self.items_in_pipeline.load(Ordering::SeqCst) == 0
            && self.enrichments_in_flight.load(Ordering::SeqCst) == 0
    }

    /// Requests a cooperative stop of the crawl loop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Whether a cooperative stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Number of workers currently fetching, for status snapshots.
    pub fn active_fetches(&self) -> usize {
        self.in_flight_fetches.load(Ordering::SeqCst)
    }
}

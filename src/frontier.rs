//! # Frontier Module
//!
//! Implements the bounded, deduplicating URL frontier and the coordinator
//! task that owns it during a crawl.
//!
//! ## Overview
//!
//! The `Frontier` is a FIFO queue of URLs awaiting fetch, plus the visited
//! set that prevents re-crawling. It is deliberately a plain, single-owner
//! value: all mutation happens inside the coordinator task, and fetch workers
//! interact with it only through message passing. That single-writer shape is
//! what keeps the no-duplicate-enqueue and capacity invariants intact under
//! concurrent workers.
//!
//! ## Key Responsibilities
//!
//! - **Admission Control**: URLs beyond the queue capacity are silently
//!   dropped at enqueue time, not errored and not retried
//! - **Duplicate Detection**: a URL is admitted at most once per run, whether
//!   it is still queued, in flight, or already visited
//! - **Visit Accounting**: popping a URL does not mark it visited; workers
//!   report back after successful processing so re-discovered URLs stay out
//! - **Completion Tracking**: the coordinator counts outstanding work units
//!   so the crawl manager can detect when the run has drained
//!
//! ## Architecture
//!
//! `FrontierCoordinator::spawn` moves a seeded `Frontier` into a background
//! task and returns a handle plus the dispatch channel workers pull URLs
//! from. Workers report completions and discovered links over an internal
//! control channel, mirroring an actor-style message loop.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crawl_engine::frontier::{Frontier, FrontierCoordinator};
//!
//! let mut frontier = Frontier::new(200, 200);
//! frontier.add_urls(vec!["https://example.com".to_string()], 0);
//!
//! let (coordinator, url_rx) = FrontierCoordinator::spawn(frontier, state, stats, 100);
//! while let Ok(entry) = url_rx.recv().await {
//!     // fetch entry.url, then:
//!     coordinator.mark_visited(entry.url).await;
//! }
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use kanal::{AsyncReceiver, AsyncSender, bounded_async, unbounded_async};
use tracing::{debug, error, info, trace, warn};

use crate::state::CrawlState;
use crate::stats::StatCollector;

/// One queued unit of crawl work: the URL and its discovery depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    pub url: String,
    pub depth: usize,
}

/// Outcome of one `add_urls` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: usize,
    pub duplicates: usize,
    pub over_capacity: usize,
}

/// Bounded, deduplicating FIFO queue of URLs awaiting fetch.
///
/// Not internally synchronized. During a crawl it is owned by the
/// coordinator task; direct use is for construction-time seeding and tests.
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
    /// Every URL ever enqueued this run, queued, in flight, or visited.
    admitted: HashSet<String>,
    visited: HashSet<String>,
    max_queue_size: usize,
    max_visited: usize,
}

impl Frontier {
    pub fn new(max_queue_size: usize, max_visited: usize) -> Self {
        Frontier {
            queue: VecDeque::new(),
            admitted: HashSet::new(),
            visited: HashSet::new(),
            max_queue_size,
            max_visited,
        }
    }

    /// Enqueues each URL that is neither visited nor already admitted,
    /// subject to the queue capacity. Over-capacity URLs are silently
    /// dropped; that is admission control, not an error.
    pub fn add_urls<I>(&mut self, urls: I, depth: usize) -> Admission
    where
        I: IntoIterator<Item = String>,
    {
        let mut outcome = Admission::default();
        for url in urls {
            if self.visited.contains(&url) || self.admitted.contains(&url) {
                trace!("URL already admitted, skipping: {}", url);
                outcome.duplicates += 1;
                continue;
            }
            if self.queue.len() >= self.max_queue_size {
                trace!("Queue at capacity ({}), dropping: {}", self.max_queue_size, url);
                outcome.over_capacity += 1;
                continue;
            }
            self.admitted.insert(url.clone());
            self.queue.push_back(QueuedUrl { url, depth });
            outcome.admitted += 1;
        }
        outcome
    }

    /// Pops the next URL in FIFO order. Popping does not mark the URL
    /// visited; callers report back via [`Frontier::mark_visited`] after
    /// successful processing.
    pub fn next_url(&mut self) -> Option<QueuedUrl> {
        self.queue.pop_front()
    }

    /// Records a URL as visited.
    pub fn mark_visited(&mut self, url: &str) {
        self.visited.insert(url.to_string());
    }

    /// True iff the URL has not been visited and the visit cap still has
    /// room.
    pub fn should_visit(&self, url: &str) -> bool {
        !self.visited.contains(url) && self.visited.len() < self.max_visited
    }

    /// Returns the number of URLs waiting in the queue.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Checks if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of URLs marked visited so far.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

enum FrontierMessage {
    Enqueue { urls: Vec<String>, depth: usize },
    MarkVisited(String),
    Release(String),
    Shutdown,
}

/// Handle to the coordinator task that owns the frontier during a crawl.
///
/// Workers use it to report results; the crawl manager uses it for idle
/// detection and shutdown. All counters are mirrors maintained by the
/// coordinator loop, so readers never touch frontier state directly.
pub struct FrontierCoordinator {
    tx_internal: AsyncSender<FrontierMessage>,
    queued_urls: AtomicUsize,
    visited_urls: AtomicUsize,
    /// Work units admitted but not yet reported finished: queued, in the
    /// dispatch channel, or inside a worker.
    outstanding: AtomicUsize,
    pub(crate) is_shutting_down: AtomicBool,
}

impl FrontierCoordinator {
    /// Moves a seeded frontier into a background task and returns the
    /// coordinator handle together with the dispatch channel workers pull
    /// URLs from.
    pub fn spawn(
        frontier: Frontier,
        state: Arc<CrawlState>,
        stats: Arc<StatCollector>,
        dispatch_capacity: usize,
    ) -> (Arc<Self>, AsyncReceiver<QueuedUrl>) {
        let (tx_internal, rx_internal) = unbounded_async();
        let (tx_url_out, rx_url_out) = bounded_async(dispatch_capacity.max(1));

        let coordinator = Arc::new(FrontierCoordinator {
            tx_internal,
            queued_urls: AtomicUsize::new(frontier.len()),
            visited_urls: AtomicUsize::new(frontier.visited_count()),
            outstanding: AtomicUsize::new(frontier.len()),
            is_shutting_down: AtomicBool::new(false),
        });

        let coordinator_clone = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator_clone
                .run_loop(frontier, state, stats, rx_internal, tx_url_out)
                .await;
        });

        (coordinator, rx_url_out)
    }

    async fn run_loop(
        &self,
        mut frontier: Frontier,
        state: Arc<CrawlState>,
        stats: Arc<StatCollector>,
        rx_internal: AsyncReceiver<FrontierMessage>,
        tx_url_out: AsyncSender<QueuedUrl>,
    ) {
        info!(
            "Frontier loop started: queue capacity {}, visit cap {}",
            frontier.max_queue_size, frontier.max_visited
        );
        loop {
            // Cooperative stop is observed here, between pops, never inside
            // a fetch or analyzer call.
            if state.stop_requested() {
                info!("Stop requested, frontier halting URL dispatch");
                break;
            }

            // Drain control messages before dispatching more work.
            if let Ok(Some(msg)) = rx_internal.try_recv() {
                trace!("Processing pending frontier message");
                if !self.handle_message(&mut frontier, &stats, msg) {
                    break;
                }
                continue;
            }

            let maybe_entry = if !tx_url_out.is_closed() {
                frontier.next_url()
            } else {
                None
            };
            self.sync_counts(&frontier);

            if let Some(entry) = maybe_entry {
                if !frontier.should_visit(&entry.url) {
                    debug!("Skipping {}: visit cap reached or already visited", entry.url);
                    stats.increment_urls_skipped_visit_cap();
                    self.finish_unit();
                    continue;
                }
                trace!("Dispatching URL to fetch workers: {}", entry.url);
                // Workers drain this channel until it closes, so a full
                // channel always makes progress; control messages queue up
                // meanwhile and are drained at the top of the loop.
                if tx_url_out.send(entry).await.is_err() {
                    error!("Fetch worker receiver dropped. Frontier can no longer dispatch URLs.");
                    self.finish_unit();
                }
            } else {
                trace!("No queued URLs, waiting for frontier message");
                match rx_internal.recv().await {
                    Ok(msg) => {
                        if !self.handle_message(&mut frontier, &stats, msg) {
                            break;
                        }
                    }
                    Err(_) => {
                        warn!("Frontier control channel closed. Exiting loop.");
                        break;
                    }
                }
            }
        }
        self.is_shutting_down.store(true, Ordering::SeqCst);
        self.sync_counts(&frontier);
        info!(
            "Frontier loop finished: {} queued, {} visited, {} outstanding",
            frontier.len(),
            frontier.visited_count(),
            self.outstanding.load(Ordering::SeqCst)
        );
    }

    fn handle_message(
        &self,
        frontier: &mut Frontier,
        stats: &StatCollector,
        msg: FrontierMessage,
    ) -> bool {
        match msg {
            FrontierMessage::Enqueue { urls, depth } => {
                let admission = frontier.add_urls(urls, depth);
                trace!(
                    "Enqueue handled: {} admitted, {} duplicate, {} over capacity",
                    admission.admitted,
                    admission.duplicates,
                    admission.over_capacity
                );
                stats.add_urls_admitted(admission.admitted);
                stats.add_urls_rejected_duplicate(admission.duplicates);
                stats.add_urls_rejected_capacity(admission.over_capacity);
                self.outstanding.fetch_add(admission.admitted, Ordering::SeqCst);
                self.sync_counts(frontier);
                true
            }
            FrontierMessage::MarkVisited(url) => {
                trace!("Marking URL as visited: {}", url);
                frontier.mark_visited(&url);
                self.finish_unit();
                self.sync_counts(frontier);
                true
            }
            FrontierMessage::Release(url) => {
                debug!("Releasing failed URL without visit mark: {}", url);
                self.finish_unit();
                true
            }
            FrontierMessage::Shutdown => {
                info!("Frontier received shutdown signal. Exiting loop.");
                false
            }
        }
    }

    fn sync_counts(&self, frontier: &Frontier) {
        self.queued_urls.store(frontier.len(), Ordering::SeqCst);
        self.visited_urls.store(frontier.visited_count(), Ordering::SeqCst);
    }

    fn finish_unit(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "outstanding underflow");
    }

    /// Submits URLs for admission, typically links discovered while
    /// processing a page.
    pub async fn enqueue_urls(&self, urls: Vec<String>, depth: usize) {
        if urls.is_empty() {
            return;
        }
        if self
            .tx_internal
            .send(FrontierMessage::Enqueue { urls, depth })
            .await
            .is_err()
            && !self.is_shutting_down.load(Ordering::SeqCst)
        {
            warn!("Frontier control channel closed, discovered URLs dropped");
        }
    }

    /// Reports successful processing of a URL so it is marked visited.
    pub async fn mark_visited(&self, url: String) {
        if self
            .tx_internal
            .send(FrontierMessage::MarkVisited(url.clone()))
            .await
            .is_err()
            && !self.is_shutting_down.load(Ordering::SeqCst)
        {
            warn!("Frontier control channel closed, visit mark lost for {}", url);
        }
    }

    /// Reports a failed fetch. The work unit completes but the URL is not
    /// marked visited; the admitted set still prevents re-enqueue.
    pub async fn release(&self, url: String) {
        if self
            .tx_internal
            .send(FrontierMessage::Release(url))
            .await
            .is_err()
            && !self.is_shutting_down.load(Ordering::SeqCst)
        {
            warn!("Frontier control channel closed, release message lost");
        }
    }

    /// Asks the coordinator loop to exit. Queued URLs are discarded.
    pub async fn shutdown(&self) {
        self.is_shutting_down.store(true, Ordering::SeqCst);
        if !self.tx_internal.is_closed()
            && self.tx_internal.send(FrontierMessage::Shutdown).await.is_err()
        {
            debug!("Frontier loop already exited, skipping shutdown signal");
        }
    }

    /// Returns the number of URLs waiting in the queue.
    #[inline]
    pub fn queued_len(&self) -> usize {
        self.queued_urls.load(Ordering::SeqCst)
    }

    /// Returns the number of URLs marked visited so far.
    #[inline]
    pub fn visited_len(&self) -> usize {
        self.visited_urls.load(Ordering::SeqCst)
    }

    /// Work units admitted but not yet finished.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Checks if every admitted work unit has been reported finished.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }
}

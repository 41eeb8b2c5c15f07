//! End-to-end crawl runs over scripted collaborators.
//!
//! These tests drive `CrawlerManager` through whole runs with a scripted
//! fetcher and a capturing exporter, checking what a caller observes: the
//! final lifecycle state, which rows reached the exporter, and that the
//! export happens exactly once per run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crawl_engine::export::ExportRow;
use crawl_engine::fetch::FetchOutput;
use crawl_engine::prelude::*;
use crawl_engine::{CrawlPhase, Enrichment};

enum PageScript {
    Page {
        title: &'static str,
        text: &'static str,
        links: &'static [&'static str],
    },
    NetworkFailure,
}

/// Fetcher that replays scripted pages instead of touching the network.
/// URLs without a script behave like unreachable hosts.
struct ScriptedFetcher {
    pages: HashMap<String, PageScript>,
    fetches: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(pages: Vec<(&str, PageScript)>) -> Self {
        ScriptedFetcher {
            pages: pages
                .into_iter()
                .map(|(url, script)| (url.to_string(), script))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, CrawlError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(PageScript::Page { title, text, links }) => {
                let item = CrawlItem::new(url, *title, format!("<html>{}</html>", text), *text, 0);
                Ok(FetchOutput {
                    items: vec![item],
                    discovered_urls: links.iter().map(|link| link.to_string()).collect(),
                    status: Some(200),
                    bytes_downloaded: text.len(),
                })
            }
            Some(PageScript::NetworkFailure) | None => Err(CrawlError::Network {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

/// Requests a cooperative stop as soon as its first fetch returns, before
/// the worker loop can pick up another URL.
struct StoppingFetcher {
    inner: ScriptedFetcher,
    manager: OnceLock<Arc<CrawlerManager>>,
}

#[async_trait]
impl Fetcher for StoppingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, CrawlError> {
        let output = self.inner.fetch(url).await;
        if let Some(manager) = self.manager.get() {
            manager.stop_crawling();
        }
        output
    }
}

/// Exporter that records what it was handed instead of writing files.
#[derive(Default)]
struct CapturingExporter {
    calls: AtomicUsize,
    fields: Mutex<Vec<String>>,
    rows: Mutex<Vec<ExportRow>>,
}

impl CapturingExporter {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn captured_fields(&self) -> Vec<String> {
        self.fields.lock().unwrap().clone()
    }

    fn captured_rows(&self) -> Vec<ExportRow> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exporter for CapturingExporter {
    async fn write(
        &self,
        fields: &[String],
        rows: &[ExportRow],
        destination: &str,
    ) -> Result<PathBuf, CrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.fields.lock().unwrap() = fields.to_vec();
        *self.rows.lock().unwrap() = rows.to_vec();
        Ok(PathBuf::from(format!("{}.captured", destination)))
    }
}

/// Analyzer whose every call fails, for exercising the fail-open contract.
struct FailingAnalyzer;

#[async_trait]
impl ContentAnalyzer for FailingAnalyzer {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        _content: &str,
        _url: &str,
        _title: &str,
    ) -> Result<Enrichment, CrawlError> {
        Err(CrawlError::Analyzer("scripted outage".to_string()))
    }

    async fn extract_keywords(&self, _content: &str, _max_keywords: usize) -> Vec<String> {
        Vec::new()
    }
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn row_urls(rows: &[ExportRow]) -> Vec<String> {
    let mut urls: Vec<String> = rows
        .iter()
        .map(|row| row["url"].as_str().unwrap().to_string())
        .collect();
    urls.sort();
    urls
}

fn three_healthy_pages() -> Vec<(&'static str, PageScript)> {
    vec![
        (
            "http://a",
            PageScript::Page {
                title: "Rust Guide",
                text: "intro to rust basics",
                links: &[],
            },
        ),
        (
            "http://b",
            PageScript::Page {
                title: "Tokio Primer",
                text: "async rust with tokio",
                links: &[],
            },
        ),
        (
            "http://c",
            PageScript::Page {
                title: "Cooking",
                text: "a great soup recipe",
                links: &[],
            },
        ),
    ]
}

#[tokio::test]
async fn seeds_crawl_to_completion_and_export_once() {
    let fetcher = Arc::new(ScriptedFetcher::new(three_healthy_pages()));
    let exporter = Arc::new(CapturingExporter::default());

    let manager = CrawlerBuilder::new()
        .fetch_workers(2)
        .output_prefix("smoke")
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();

    let report = manager
        .start_crawl(
            strings(&["http://a", "http://b", "http://c"]),
            strings(&["rust", "python"]),
            strings(&["url", "title", "matched_keywords", "sentiment"]),
        )
        .await
        .unwrap();

    assert_eq!(report.state, CrawlPhase::Completed);
    assert_eq!(report.rows_exported, 3);
    assert_eq!(report.artifact, PathBuf::from("smoke.captured"));
    assert_eq!(fetcher.fetch_count(), 3);
    assert_eq!(exporter.call_count(), 1);
    assert_eq!(report.stats.urls_fetched, 3);
    assert_eq!(report.stats.fetch_errors, 0);

    let rows = exporter.captured_rows();
    assert_eq!(row_urls(&rows), strings(&["http://a", "http://b", "http://c"]));
    for row in &rows {
        let sentiment = row["sentiment"].as_str().unwrap();
        assert!(["positive", "neutral", "negative"].contains(&sentiment));
    }
    let rust_page = rows
        .iter()
        .find(|row| row["url"].as_str() == Some("http://a"))
        .unwrap();
    assert_eq!(rust_page["matched_keywords"], serde_json::json!(["rust"]));
}

#[tokio::test]
async fn failed_fetch_is_contained_and_the_run_completes() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        (
            "http://a",
            PageScript::Page {
                title: "A",
                text: "page a",
                links: &[],
            },
        ),
        ("http://b", PageScript::NetworkFailure),
        (
            "http://c",
            PageScript::Page {
                title: "C",
                text: "page c",
                links: &[],
            },
        ),
    ]));
    let exporter = Arc::new(CapturingExporter::default());

    let manager = CrawlerBuilder::new()
        .fetch_workers(2)
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();

    let report = manager
        .start_crawl(
            strings(&["http://a", "http://b", "http://c"]),
            vec![],
            strings(&["url"]),
        )
        .await
        .unwrap();

    assert_eq!(report.state, CrawlPhase::Completed);
    assert_eq!(report.rows_exported, 2);
    assert_eq!(exporter.call_count(), 1);
    assert_eq!(
        row_urls(&exporter.captured_rows()),
        strings(&["http://a", "http://c"])
    );
    assert_eq!(report.stats.fetch_errors, 1);
    assert_eq!(report.stats.urls_fetched, 2);
}

#[tokio::test]
async fn duplicate_seeds_are_fetched_once() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![(
        "http://a",
        PageScript::Page {
            title: "A",
            text: "page a",
            links: &[],
        },
    )]));
    let exporter = Arc::new(CapturingExporter::default());

    let manager = CrawlerBuilder::new()
        .fetch_workers(2)
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();

    let report = manager
        .start_crawl(
            strings(&["http://a", "http://a"]),
            vec![],
            strings(&["url"]),
        )
        .await
        .unwrap();

    assert_eq!(report.state, CrawlPhase::Completed);
    assert_eq!(fetcher.fetch_count(), 1);
    assert_eq!(report.rows_exported, 1);
    assert_eq!(report.stats.urls_rejected_duplicate, 1);
}

#[tokio::test]
async fn links_are_followed_one_hop_and_never_refetched() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        (
            "http://a",
            PageScript::Page {
                title: "A",
                text: "page a",
                links: &["http://b", "http://c", "http://a"],
            },
        ),
        (
            "http://b",
            PageScript::Page {
                title: "B",
                text: "page b",
                links: &["http://d"],
            },
        ),
        (
            "http://c",
            PageScript::Page {
                title: "C",
                text: "page c",
                links: &[],
            },
        ),
        (
            "http://d",
            PageScript::Page {
                title: "D",
                text: "page d",
                links: &[],
            },
        ),
    ]));
    let exporter = Arc::new(CapturingExporter::default());

    let manager = CrawlerBuilder::new()
        .fetch_workers(2)
        .max_depth(1)
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();

    let report = manager
        .start_crawl(strings(&["http://a"]), vec![], strings(&["url", "depth"]))
        .await
        .unwrap();

    // One hop past the seed: b and c are fetched, d stays out, and the
    // self-link back to a is rejected as a duplicate.
    assert_eq!(report.state, CrawlPhase::Completed);
    assert_eq!(fetcher.fetch_count(), 3);
    let rows = exporter.captured_rows();
    assert_eq!(row_urls(&rows), strings(&["http://a", "http://b", "http://c"]));
    for row in &rows {
        let expected_depth = if row["url"].as_str() == Some("http://a") { 0 } else { 1 };
        assert_eq!(row["depth"], serde_json::json!(expected_depth));
    }
}

#[tokio::test]
async fn cooperative_stop_exports_the_rows_collected_so_far() {
    let stopping = Arc::new(StoppingFetcher {
        inner: ScriptedFetcher::new(vec![
            (
                "http://a",
                PageScript::Page {
                    title: "A",
                    text: "page a",
                    links: &[],
                },
            ),
            (
                "http://b",
                PageScript::Page {
                    title: "B",
                    text: "page b",
                    links: &[],
                },
            ),
            (
                "http://c",
                PageScript::Page {
                    title: "C",
                    text: "page c",
                    links: &[],
                },
            ),
        ]),
        manager: OnceLock::new(),
    });
    let exporter = Arc::new(CapturingExporter::default());

    let manager = Arc::new(
        CrawlerBuilder::new()
            .fetch_workers(1)
            .with_fetcher(Arc::clone(&stopping) as Arc<dyn Fetcher>)
            .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
            .build()
            .unwrap(),
    );
    let _ = stopping.manager.set(Arc::clone(&manager));

    let report = manager
        .start_crawl(
            strings(&["http://a", "http://b", "http://c"]),
            vec![],
            strings(&["url"]),
        )
        .await
        .unwrap();

    // The stop lands before the single worker can pick up a second URL, so
    // exactly the first URL's row is collected and still exported.
    assert_eq!(report.state, CrawlPhase::Stopped);
    assert_eq!(report.rows_exported, 1);
    assert_eq!(exporter.call_count(), 1);
    assert_eq!(stopping.inner.fetch_count(), 1);
    assert_eq!(row_urls(&exporter.captured_rows()), strings(&["http://a"]));

    let status = manager.crawl_status();
    assert_eq!(status.state, CrawlPhase::Stopped);
    assert_eq!(status.rows_collected, 1);
}

#[tokio::test]
async fn strict_filter_with_no_matches_still_exports_an_artifact() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        (
            "http://a",
            PageScript::Page {
                title: "Cooking",
                text: "a soup recipe",
                links: &[],
            },
        ),
        (
            "http://b",
            PageScript::Page {
                title: "Baking",
                text: "a bread recipe",
                links: &[],
            },
        ),
    ]));
    let exporter = Arc::new(CapturingExporter::default());

    let manager = CrawlerBuilder::new()
        .fetch_workers(2)
        .strict_filter(true)
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();

    let report = manager
        .start_crawl(
            strings(&["http://a", "http://b"]),
            strings(&["quantum"]),
            strings(&["url", "title"]),
        )
        .await
        .unwrap();

    assert_eq!(report.state, CrawlPhase::Completed);
    assert_eq!(report.rows_exported, 0);
    assert_eq!(exporter.call_count(), 1);
    assert!(exporter.captured_rows().is_empty());
    // The field list still reaches the exporter so the artifact carries its
    // header even with zero rows.
    assert_eq!(exporter.captured_fields(), strings(&["url", "title"]));
    assert_eq!(report.stats.items_scraped, 2);
    assert_eq!(report.stats.drop_reasons.get("no-keyword-match"), Some(&2));
}

#[tokio::test]
async fn broken_analyzer_never_changes_the_survivor_count() {
    let exporter = Arc::new(CapturingExporter::default());
    let manager = CrawlerBuilder::new()
        .fetch_workers(2)
        .with_fetcher(Arc::new(ScriptedFetcher::new(three_healthy_pages())))
        .with_analyzer(Arc::new(FailingAnalyzer))
        .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();

    let report = manager
        .start_crawl(
            strings(&["http://a", "http://b", "http://c"]),
            vec![],
            strings(&["url", "summary", "sentiment"]),
        )
        .await
        .unwrap();

    assert_eq!(report.state, CrawlPhase::Completed);
    assert_eq!(report.rows_exported, 3);
    assert_eq!(report.stats.enrichment_failures, 3);
    assert_eq!(report.stats.items_enriched, 0);
    for row in exporter.captured_rows() {
        assert_eq!(row["summary"].as_str(), Some(""));
        assert_eq!(row["sentiment"].as_str(), Some("neutral"));
    }

    // Same crawl with enrichment disabled outright: the survivor count is
    // identical, only the enrichment fields could ever differ.
    let disabled_exporter = Arc::new(CapturingExporter::default());
    let disabled = CrawlerBuilder::new()
        .fetch_workers(2)
        .enrichment_enabled(false)
        .with_fetcher(Arc::new(ScriptedFetcher::new(three_healthy_pages())))
        .with_exporter(Arc::clone(&disabled_exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();
    let disabled_report = disabled
        .start_crawl(
            strings(&["http://a", "http://b", "http://c"]),
            vec![],
            strings(&["url", "summary", "sentiment"]),
        )
        .await
        .unwrap();
    assert_eq!(disabled_report.rows_exported, report.rows_exported);
    assert_eq!(disabled_report.stats.enrichment_failures, 0);
}

#[tokio::test]
async fn over_capacity_seeds_are_silently_dropped() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        (
            "http://a",
            PageScript::Page {
                title: "A",
                text: "page a",
                links: &[],
            },
        ),
        (
            "http://b",
            PageScript::Page {
                title: "B",
                text: "page b",
                links: &[],
            },
        ),
    ]));
    let exporter = Arc::new(CapturingExporter::default());

    let manager = CrawlerBuilder::new()
        .fetch_workers(1)
        .max_queue_size(2)
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();

    let report = manager
        .start_crawl(
            strings(&["http://a", "http://b", "http://c", "http://d", "http://e"]),
            vec![],
            strings(&["url"]),
        )
        .await
        .unwrap();

    // Seeds beyond the queue capacity never become work: admission control,
    // not an error.
    assert_eq!(report.state, CrawlPhase::Completed);
    assert_eq!(fetcher.fetch_count(), 2);
    assert_eq!(report.rows_exported, 2);
    assert_eq!(report.stats.urls_rejected_capacity, 3);
}

#[tokio::test]
async fn a_manager_drives_exactly_one_run() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![(
        "http://a",
        PageScript::Page {
            title: "A",
            text: "page a",
            links: &[],
        },
    )]));
    let exporter = Arc::new(CapturingExporter::default());

    let manager = CrawlerBuilder::new()
        .fetch_workers(1)
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .with_exporter(Arc::clone(&exporter) as Arc<dyn Exporter>)
        .build()
        .unwrap();

    let first = manager
        .start_crawl(strings(&["http://a"]), vec![], strings(&["url"]))
        .await
        .unwrap();
    assert_eq!(first.state, CrawlPhase::Completed);

    let second = manager
        .start_crawl(strings(&["http://a"]), vec![], strings(&["url"]))
        .await;
    assert!(matches!(second, Err(CrawlError::Config(_))));
    assert_eq!(exporter.call_count(), 1);
}

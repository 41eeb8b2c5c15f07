//! # Config Module
//!
//! Provides `CrawlConfig` and the `CrawlerBuilder`, a fluent API for
//! constructing and configuring `CrawlerManager` instances.
//!
//! ## Overview
//!
//! The `CrawlerBuilder` assembles the crawl-engine components into a fully
//! configured manager. Configuration is captured once at build time and is
//! immutable for the duration of a crawl run; there is no process-wide
//! mutable settings object.
//!
//! ## Key Features
//!
//! - **Concurrency Configuration**: Control the fetch worker pool and the
//!   separately bounded enrichment pool
//! - **Frontier Limits**: Queue capacity, visit cap, and link-follow depth
//! - **Collaborator Registration**: Swap in custom `Fetcher`,
//!   `ContentAnalyzer`, or `Exporter` implementations
//! - **Analyzer Settings**: Remote endpoint, model, API key, and per-call
//!   timeout for LLM-backed enrichment
//! - **Default Handling**: Sensible defaults mirroring a small polite crawl
//!
//! ## Example
//!
//! ```rust,ignore
//! use crawl_engine::CrawlerBuilder;
//! use crawl_engine::export::ExportFormat;
//!
//! let manager = CrawlerBuilder::new()
//!     .fetch_workers(4)
//!     .strict_filter(true)
//!     .export_format(ExportFormat::Json)
//!     .build()?;
//!
//! manager.start_crawl(seeds, keywords, fields).await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use num_cpus;

use crate::analyzer::{ContentAnalyzer, FallbackAnalyzer, LlmAnalyzer};
use crate::error::CrawlError;
use crate::export::{ColumnarExporter, CsvExporter, ExportFormat, Exporter, JsonExporter};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::manager::CrawlerManager;

/// Settings for the remote content analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// API key for the remote analyzer. `None` selects heuristic fallback
    /// analysis.
    pub api_key: Option<String>,
    /// Base URL of the chat-completions endpoint.
    pub base_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Per-call timeout enforced around every analyzer request.
    pub request_timeout: Duration,
    /// Maximum number of keywords to extract per item.
    pub max_keywords: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            api_key: None,
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            request_timeout: Duration::from_secs(30),
            max_keywords: 10,
        }
    }
}

/// Configuration for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Drop items with no keyword match instead of forwarding them.
    pub strict_filter: bool,
    /// Run the enrichment stage. When false, items pass through unanalyzed.
    pub enrichment_enabled: bool,
    /// Maximum number of URLs waiting in the frontier queue.
    pub max_queue_size: usize,
    /// Maximum number of URLs marked visited over the run.
    pub max_visited: usize,
    /// How many link hops past the seeds to follow. Zero crawls seeds only.
    pub max_depth: usize,
    /// Width of the fetch worker pool.
    pub fetch_workers: usize,
    /// Maximum concurrent analyzer calls, bounded separately from fetches.
    pub enrichment_concurrency: usize,
    /// Capacity of the URL dispatch channel between frontier and workers.
    pub channel_capacity: usize,
    /// HTTP timeout per fetch.
    pub fetch_timeout: Duration,
    /// User-Agent header sent with every fetch.
    pub user_agent: String,
    /// Remote analyzer settings.
    pub analyzer: AnalyzerConfig,
    /// Artifact format written at the end of the run.
    pub export_format: ExportFormat,
    /// Destination name prefix for the export artifact.
    pub output_prefix: String,
    /// Directory the export artifact is written into.
    pub output_dir: PathBuf,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            strict_filter: false,
            enrichment_enabled: true,
            max_queue_size: 200,
            max_visited: 200,
            max_depth: 0,
            fetch_workers: num_cpus::get().clamp(1, 8),
            enrichment_concurrency: 2,
            channel_capacity: 100,
            fetch_timeout: Duration::from_secs(15),
            user_agent: concat!("crawl-engine/", env!("CARGO_PKG_VERSION")).to_string(),
            analyzer: AnalyzerConfig::default(),
            export_format: ExportFormat::Csv,
            output_prefix: "crawl_results".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Default)]
pub struct CrawlerBuilder {
    config: CrawlConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    analyzer: Option<Arc<dyn ContentAnalyzer>>,
    exporter: Option<Arc<dyn Exporter>>,
}

impl CrawlerBuilder {
    /// Creates a new `CrawlerBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables strict keyword filtering.
    pub fn strict_filter(mut self, strict: bool) -> Self {
        self.config.strict_filter = strict;
        self
    }

    /// Enables or disables the enrichment stage.
    pub fn enrichment_enabled(mut self, enabled: bool) -> Self {
        self.config.enrichment_enabled = enabled;
        self
    }

    /// Sets the maximum number of URLs waiting in the frontier queue.
    pub fn max_queue_size(mut self, limit: usize) -> Self {
        self.config.max_queue_size = limit;
        self
    }

    /// Sets the maximum number of URLs visited over the run.
    pub fn max_visited(mut self, limit: usize) -> Self {
        self.config.max_visited = limit;
        self
    }

    /// Sets how many link hops past the seeds to follow.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Sets the width of the fetch worker pool.
    pub fn fetch_workers(mut self, limit: usize) -> Self {
        self.config.fetch_workers = limit;
        self
    }

    /// Sets the maximum number of concurrent analyzer calls.
    pub fn enrichment_concurrency(mut self, limit: usize) -> Self {
        self.config.enrichment_concurrency = limit;
        self
    }

    /// Sets the capacity of the URL dispatch channel.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Sets the HTTP timeout per fetch.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Sets the User-Agent header sent with every fetch.
    pub fn user_agent<S: Into<String>>(mut self, agent: S) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Sets the remote analyzer API key. `None` selects fallback analysis.
    pub fn analyzer_api_key(mut self, key: Option<String>) -> Self {
        self.config.analyzer.api_key = key;
        self
    }

    /// Sets the base URL of the analyzer endpoint.
    pub fn analyzer_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.analyzer.base_url = url.into();
        self
    }

    /// Sets the analyzer model identifier.
    pub fn analyzer_model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.analyzer.model = model.into();
        self
    }

    /// Sets the per-call analyzer timeout.
    pub fn analyzer_timeout(mut self, timeout: Duration) -> Self {
        self.config.analyzer.request_timeout = timeout;
        self
    }

    /// Sets the maximum number of keywords extracted per item.
    pub fn max_keywords(mut self, limit: usize) -> Self {
        self.config.analyzer.max_keywords = limit;
        self
    }

    /// Sets the export artifact format.
    pub fn export_format(mut self, format: ExportFormat) -> Self {
        self.config.export_format = format;
        self
    }

    /// Sets the destination name prefix for the export artifact.
    pub fn output_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    /// Sets the directory the export artifact is written into.
    pub fn output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets a custom fetcher collaborator.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets a custom content analyzer collaborator.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Sets a custom exporter collaborator.
    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Builds the `CrawlerManager`, wiring default collaborators for any
    /// not provided.
    pub fn build(mut self) -> Result<CrawlerManager, CrawlError> {
        self.validate_config()?;

        let fetcher: Arc<dyn Fetcher> = match self.fetcher.take() {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&self.config)?),
        };

        let analyzer: Arc<dyn ContentAnalyzer> = match self.analyzer.take() {
            Some(analyzer) => analyzer,
            None if self.config.analyzer.api_key.is_some() => {
                Arc::new(LlmAnalyzer::new(self.config.analyzer.clone())?)
            }
            None => Arc::new(FallbackAnalyzer::new()),
        };

        let exporter: Arc<dyn Exporter> = match self.exporter.take() {
            Some(exporter) => exporter,
            None => match self.config.export_format {
                ExportFormat::Csv => Arc::new(CsvExporter::new(&self.config.output_dir)),
                ExportFormat::Json => Arc::new(JsonExporter::new(&self.config.output_dir)),
                ExportFormat::Columnar => Arc::new(ColumnarExporter::new(&self.config.output_dir)),
            },
        };

        Ok(CrawlerManager::new(self.config, fetcher, analyzer, exporter))
    }

    fn validate_config(&self) -> Result<(), CrawlError> {
        if self.config.fetch_workers == 0 {
            return Err(CrawlError::Config(
                "fetch_workers must be greater than 0.".to_string(),
            ));
        }
        if self.config.enrichment_concurrency == 0 {
            return Err(CrawlError::Config(
                "enrichment_concurrency must be greater than 0.".to_string(),
            ));
        }
        if self.config.max_queue_size == 0 {
            return Err(CrawlError::Config(
                "max_queue_size must be greater than 0.".to_string(),
            ));
        }
        if self.config.max_visited == 0 {
            return Err(CrawlError::Config(
                "max_visited must be greater than 0.".to_string(),
            ));
        }
        Ok(())
    }
}

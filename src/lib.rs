//! # crawl-engine
//!
//! Bounded-frontier crawl orchestration engine with an ordered item pipeline
//! and batch export.
//!
//! Provides the main components: `CrawlerManager`, `Frontier`, the
//! `PipelineStage` chain, and the collaborator traits (`Fetcher`,
//! `ContentAnalyzer`, `Exporter`) the manager composes at construction time.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crawl_engine::CrawlerBuilder;
//! use crawl_engine::export::ExportFormat;
//!
//! async fn run_crawl() -> Result<(), crawl_engine::CrawlError> {
//!     let manager = CrawlerBuilder::new()
//!         .fetch_workers(4)
//!         .strict_filter(true)
//!         .export_format(ExportFormat::Json)
//!         .build()?;
//!
//!     let report = manager
//!         .start_crawl(
//!             vec!["https://example.com".to_string()],
//!             vec!["rust".to_string()],
//!             vec!["title".to_string(), "url".to_string()],
//!         )
//!         .await?;
//!
//!     println!("exported {} rows to {}", report.rows_exported, report.artifact.display());
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod frontier;
pub mod item;
pub mod manager;
pub mod pipeline;
pub mod prelude;
pub mod state;
pub mod stats;
pub mod text;

pub use config::{AnalyzerConfig, CrawlConfig, CrawlerBuilder};
pub use error::CrawlError;
pub use item::{CrawlItem, Enrichment, Sentiment};
pub use manager::{CrawlPhase, CrawlReport, CrawlStatus, CrawlerManager};
pub use stats::{StatCollector, StatsSnapshot};

pub use async_trait::async_trait;
pub use tokio;

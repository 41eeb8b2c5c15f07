//! A "prelude" for users of the `crawl-engine` crate.
//!
//! This prelude re-exports the most commonly used traits and structs
//! so that they can be easily imported.
//!
//! # Example
//!
//! ```
//! use crawl_engine::prelude::*;
//! ```

pub use crate::{
    // Core structs
    CrawlError,
    CrawlItem,
    CrawlReport,
    CrawlStatus,
    CrawlerBuilder,
    CrawlerManager,
    // Collaborator traits
    analyzer::ContentAnalyzer,
    export::Exporter,
    fetch::Fetcher,
    pipeline::PipelineStage,
    // Essential re-export for trait implementation
    async_trait,
};

//! # Error Module
//!
//! Defines the error taxonomy for the crawl engine.
//!
//! Failures are classified by how far they are allowed to propagate:
//! network, validation, and analyzer errors are contained inside the crawl
//! loop (skip the URL, drop the item, or pass it through unenriched), while
//! export and configuration errors are fatal and surface to the caller.

use thiserror::Error;

/// Errors produced by the crawl engine and its collaborators.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Fetch failure (connect, timeout, non-success status). Recoverable: the
    /// URL is skipped and the crawl continues.
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// A processed record is missing a required field. Recoverable: the item
    /// is dropped and the crawl continues.
    #[error("validation error: {0}")]
    Validation(String),

    /// Content analyzer failure (timeout, malformed response, transport).
    /// Recoverable: the item passes through unenriched.
    #[error("analyzer error: {0}")]
    Analyzer(String),

    /// Failure writing the export artifact. Fatal for the run.
    #[error("export error: {0}")]
    Export(String),

    /// Invalid configuration (seed list, field spec, capacities). Fatal at
    /// startup, before any fetch begins.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CrawlError {
    /// Whether the crawl loop is allowed to continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CrawlError::Network { .. } | CrawlError::Validation(_) | CrawlError::Analyzer(_)
        )
    }
}

impl From<csv::Error> for CrawlError {
    fn from(err: csv::Error) -> Self {
        CrawlError::Export(err.to_string())
    }
}

impl From<serde_json::Error> for CrawlError {
    fn from(err: serde_json::Error) -> Self {
        CrawlError::Export(err.to_string())
    }
}

impl From<std::io::Error> for CrawlError {
    fn from(err: std::io::Error) -> Self {
        CrawlError::Export(err.to_string())
    }
}

//! # Export Module
//!
//! Batch persistence of accumulated rows behind the `Exporter` collaborator
//! trait.
//!
//! ## Overview
//!
//! Export happens exactly once per crawl run, after the loop drains: the
//! manager projects every surviving item onto the configured field list and
//! hands the whole batch to one exporter. Zero rows still produce an
//! artifact, so a filtered-to-nothing crawl leaves evidence it ran.
//!
//! Artifacts are named deterministically from the destination prefix and
//! the run timestamp, one file per run, never appended.
//!
//! ## Formats
//!
//! - **CSV**: fixed column header matching the configured fields;
//!   list-valued fields join with `", "`
//! - **JSON**: array of row objects
//! - **Columnar**: one array per field, column-major, row order preserved

mod columnar_exporter;
mod csv_exporter;
mod json_exporter;

pub use columnar_exporter::ColumnarExporter;
pub use csv_exporter::CsvExporter;
pub use json_exporter::JsonExporter;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Local;

use crate::error::CrawlError;

/// One export row: configured field names mapped to their values.
pub type ExportRow = serde_json::Map<String, serde_json::Value>;

/// Artifact format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Columnar,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Columnar => "columnar",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "columnar" => Ok(ExportFormat::Columnar),
            other => Err(CrawlError::Config(format!(
                "unknown export format '{}', expected csv, json, or columnar",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborator that persists the final row batch to a durable artifact.
///
/// `fields` fixes the column set even when `rows` is empty. Returns the
/// path written; any failure is fatal for the run.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn write(
        &self,
        fields: &[String],
        rows: &[ExportRow],
        destination: &str,
    ) -> Result<PathBuf, CrawlError>;
}

/// `<dir>/<destination>_<timestamp>.<extension>`, one artifact per run.
pub(crate) fn artifact_path(dir: &Path, destination: &str, extension: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{}_{}.{}", destination, timestamp, extension))
}

//! CSV artifact writer. The header row always matches the configured
//! fields, even for a zero-row run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{ExportRow, Exporter, artifact_path};
use crate::error::CrawlError;

pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        CsvExporter {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Exporter for CsvExporter {
    async fn write(
        &self,
        fields: &[String],
        rows: &[ExportRow],
        destination: &str,
    ) -> Result<PathBuf, CrawlError> {
        let path = artifact_path(&self.output_dir, destination, "csv");
        let mut writer = csv::Writer::from_path(&path)?;

        writer.write_record(fields)?;
        for row in rows {
            let record: Vec<String> = fields
                .iter()
                .map(|field| row.get(field).map(csv_cell).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;

        info!("Exported {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}

/// Flattens a row value into one CSV cell. Lists join with `", "`; nested
/// objects stay as compact JSON.
fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

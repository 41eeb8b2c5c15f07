//! Column-major artifact writer: one value array per configured field,
//! with row order preserved across columns.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{ExportRow, Exporter, artifact_path};
use crate::error::CrawlError;

pub struct ColumnarExporter {
    output_dir: PathBuf,
}

impl ColumnarExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        ColumnarExporter {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Exporter for ColumnarExporter {
    async fn write(
        &self,
        fields: &[String],
        rows: &[ExportRow],
        destination: &str,
    ) -> Result<PathBuf, CrawlError> {
        let mut columns = ExportRow::new();
        for field in fields {
            let column: Vec<Value> = rows
                .iter()
                .map(|row| row.get(field).cloned().unwrap_or(Value::Null))
                .collect();
            columns.insert(field.clone(), Value::Array(column));
        }

        let path = artifact_path(&self.output_dir, destination, "columns.json");
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &columns)?;

        info!(
            "Exported {} rows as {} columns to {}",
            rows.len(),
            fields.len(),
            path.display()
        );
        Ok(path)
    }
}

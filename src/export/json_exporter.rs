//! JSON artifact writer: one array of row objects per run.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{ExportRow, Exporter, artifact_path};
use crate::error::CrawlError;

pub struct JsonExporter {
    output_dir: PathBuf,
}

impl JsonExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        JsonExporter {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Exporter for JsonExporter {
    async fn write(
        &self,
        _fields: &[String],
        rows: &[ExportRow],
        destination: &str,
    ) -> Result<PathBuf, CrawlError> {
        let path = artifact_path(&self.output_dir, destination, "json");
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), rows)?;

        info!("Exported {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}

//! CLI entry point for the `crawl` binary.
//!
//! Parses the command line, wires a crawler through `CrawlerBuilder`, runs
//! one crawl to completion, and prints the final statistics snapshot.
//! Exits zero on a completed or stopped crawl, zero-row runs included;
//! fatal configuration and export failures exit non-zero.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crawl_engine::export::ExportFormat;
use crawl_engine::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "crawl",
    version,
    about = "Crawl a bounded seed list, filter and enrich the pages, export the survivors"
)]
struct Cli {
    /// Comma-separated seed URLs
    #[arg(long, required = true)]
    urls: String,

    /// Comma-separated keywords to match against page text
    #[arg(long, default_value = "")]
    keywords: String,

    /// Comma-separated export fields
    #[arg(long, default_value = "title,url")]
    fields: String,

    /// Destination name stem for the export artifact
    #[arg(long, default_value = "crawl_results")]
    output: String,

    /// Export format: csv, json, or columnar
    #[arg(long, default_value = "csv")]
    format: String,

    /// Directory the export artifact is written into
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Drop items with no keyword match instead of forwarding them
    #[arg(long)]
    strict: bool,

    /// Width of the fetch worker pool
    #[arg(long)]
    concurrency: Option<usize>,

    /// Maximum number of URLs waiting in the frontier queue
    #[arg(long)]
    max_queue: Option<usize>,

    /// Maximum number of URLs visited over the run
    #[arg(long)]
    max_visited: Option<usize>,

    /// How many link hops past the seeds to follow
    #[arg(long, default_value_t = 0)]
    max_depth: usize,

    /// Seconds allowed per page fetch
    #[arg(long, default_value_t = 15)]
    fetch_timeout: u64,

    /// DeepSeek API key; falls back to the DEEPSEEK_API_KEY environment
    /// variable. Without a key the rule-based fallback analyzer runs.
    #[arg(long)]
    api_key: Option<String>,

    /// Skip the enrichment stage entirely
    #[arg(long)]
    no_enrich: bool,
}

fn init_telemetry() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crawl_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Splits a comma list, trimming whitespace and dropping empty entries.
fn comma_split(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry();
    let cli = Cli::parse();

    let seeds = comma_split(&cli.urls);
    let keywords = comma_split(&cli.keywords);
    let fields = comma_split(&cli.fields);
    let format: ExportFormat = cli.format.parse()?;
    let api_key = cli
        .api_key
        .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
        .filter(|key| !key.trim().is_empty());

    let mut builder = CrawlerBuilder::new()
        .strict_filter(cli.strict)
        .enrichment_enabled(!cli.no_enrich)
        .max_depth(cli.max_depth)
        .fetch_timeout(Duration::from_secs(cli.fetch_timeout))
        .analyzer_api_key(api_key)
        .export_format(format)
        .output_prefix(cli.output)
        .output_dir(&cli.output_dir);
    if let Some(workers) = cli.concurrency {
        builder = builder.fetch_workers(workers);
    }
    if let Some(limit) = cli.max_queue {
        builder = builder.max_queue_size(limit);
    }
    if let Some(limit) = cli.max_visited {
        builder = builder.max_visited(limit);
    }

    std::fs::create_dir_all(&cli.output_dir)?;
    let manager = Arc::new(builder.build()?);

    // Ctrl-C requests a cooperative stop: in-flight work completes and the
    // rows collected so far are still exported.
    let stopper = Arc::clone(&manager);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, requesting cooperative stop");
            stopper.stop_crawling();
        }
    });

    info!("Crawling {} seed URLs", seeds.len());
    let report = manager.start_crawl(seeds, keywords, fields).await?;

    println!("{}", report.stats);
    println!(
        "{:?}: {} rows exported to {}",
        report.state,
        report.rows_exported,
        report.artifact.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_lists_trim_and_drop_empties() {
        assert_eq!(comma_split(" a, b ,, c,"), vec!["a", "b", "c"]);
        assert!(comma_split("").is_empty());
        assert!(comma_split(" , ").is_empty());
    }

    #[test]
    fn cli_defaults_match_the_documented_surface() {
        let cli = Cli::parse_from(["crawl", "--urls", "http://a"]);
        assert_eq!(cli.fields, "title,url");
        assert_eq!(cli.format, "csv");
        assert_eq!(cli.output, "crawl_results");
        assert!(!cli.strict);
        assert_eq!(cli.max_depth, 0);
    }
}

//! # Item Module
//!
//! The record type produced per fetched page, together with the structured
//! enrichment sub-record attached by the content-analysis stage.
//!
//! Items are created by the fetcher, mutated in place by pipeline stages, and
//! become immutable once they reach the exporter. Export rows are projected
//! from an item through [`CrawlItem::to_row`] against the configured field
//! list.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CrawlError;

/// Sentiment classification attached by the content analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form facts the analyzer classifies about a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructuredFacts {
    pub word_count: usize,
    pub content_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub difficulty_level: String,
}

/// Structured fields produced by the content analyzer.
///
/// The default value marks an item the analyzer never touched; `parser` is
/// only set by a successful analyzer call, so a failed or disabled analyzer
/// leaves the record distinguishable from an analyzed-but-empty one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Enrichment {
    pub summary: String,
    pub entities: Vec<String>,
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    pub key_points: Vec<String>,
    pub structured: StructuredFacts,
    pub extracted_keywords: Vec<String>,
    /// Name of the analyzer that produced this record, empty when untouched.
    pub parser: String,
}

impl Enrichment {
    pub fn is_analyzed(&self) -> bool {
        !self.parser.is_empty()
    }
}

/// One crawled unit: a page-level record with derived pipeline fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlItem {
    pub url: String,
    pub title: String,
    pub raw_content: String,
    pub cleaned_content: String,
    pub depth: usize,
    pub matched_keywords: Vec<String>,
    pub relevance_score: f64,
    pub enrichment: Enrichment,
    pub crawl_timestamp: DateTime<Utc>,
    pub fetch_latency: Duration,
}

impl CrawlItem {
    /// Creates an item for a freshly fetched page. Derived fields start at
    /// their defaults and are filled in by the pipeline stages.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        raw_content: impl Into<String>,
        cleaned_content: impl Into<String>,
        depth: usize,
    ) -> Self {
        CrawlItem {
            url: url.into(),
            title: title.into(),
            raw_content: raw_content.into(),
            cleaned_content: cleaned_content.into(),
            depth,
            matched_keywords: Vec::new(),
            relevance_score: 0.0,
            enrichment: Enrichment::default(),
            crawl_timestamp: Utc::now(),
            fetch_latency: Duration::ZERO,
        }
    }

    /// Checks the fields every exported record must carry.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.url.trim().is_empty() {
            return Err(CrawlError::Validation("item has an empty url".into()));
        }
        Ok(())
    }

    /// Looks up a single export field by name. Returns `None` for names that
    /// are not part of the export vocabulary.
    pub fn field_value(&self, field: &str) -> Option<Value> {
        let value = match field {
            "url" => Value::String(self.url.clone()),
            "title" => Value::String(self.title.clone()),
            "raw_content" => Value::String(self.raw_content.clone()),
            "cleaned_content" => Value::String(self.cleaned_content.clone()),
            "depth" => Value::from(self.depth),
            "matched_keywords" => Value::from(self.matched_keywords.clone()),
            "relevance_score" => Value::from(self.relevance_score),
            "crawl_timestamp" => Value::String(self.crawl_timestamp.to_rfc3339()),
            "fetch_latency_ms" => Value::from(self.fetch_latency.as_millis() as u64),
            "summary" => Value::String(self.enrichment.summary.clone()),
            "entities" => Value::from(self.enrichment.entities.clone()),
            "topics" => Value::from(self.enrichment.topics.clone()),
            "sentiment" => Value::String(self.enrichment.sentiment.to_string()),
            "key_points" => Value::from(self.enrichment.key_points.clone()),
            "structured_data" => serde_json::to_value(&self.enrichment.structured).ok()?,
            "extracted_keywords" => Value::from(self.enrichment.extracted_keywords.clone()),
            _ => return None,
        };
        Some(value)
    }

    /// Projects the item onto the configured field list, in order.
    pub fn to_row(&self, fields: &[String]) -> Result<crate::export::ExportRow, CrawlError> {
        let mut row = crate::export::ExportRow::new();
        for field in fields {
            let value = self.field_value(field).ok_or_else(|| {
                CrawlError::Validation(format!("field {} missing from record for {}", field, self.url))
            })?;
            row.insert(field.clone(), value);
        }
        Ok(row)
    }

    /// Every export field name an item can be projected onto.
    pub fn known_fields() -> &'static [&'static str] {
        &[
            "url",
            "title",
            "raw_content",
            "cleaned_content",
            "depth",
            "matched_keywords",
            "relevance_score",
            "crawl_timestamp",
            "fetch_latency_ms",
            "summary",
            "entities",
            "topics",
            "sentiment",
            "key_points",
            "structured_data",
            "extracted_keywords",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> CrawlItem {
        let mut item = CrawlItem::new(
            "http://example.com/post",
            "Rust Guide",
            "<html>raw</html>",
            "intro to rust basics",
            1,
        );
        item.matched_keywords = vec!["rust".to_string()];
        item.relevance_score = 0.25;
        item
    }

    #[test]
    fn row_projection_follows_field_order() {
        let item = sample_item();
        let fields = vec!["title".to_string(), "url".to_string(), "depth".to_string()];
        let row = item.to_row(&fields).unwrap();
        assert_eq!(row.get("title"), Some(&Value::String("Rust Guide".into())));
        assert_eq!(
            row.get("url"),
            Some(&Value::String("http://example.com/post".into()))
        );
        assert_eq!(row.get("depth"), Some(&Value::from(1)));
    }

    #[test]
    fn unknown_field_is_a_validation_error() {
        let item = sample_item();
        let err = item.to_row(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, CrawlError::Validation(_)));
    }

    #[test]
    fn empty_url_fails_validation() {
        let item = CrawlItem::new("  ", "t", "r", "c", 0);
        assert!(matches!(
            item.validate(),
            Err(CrawlError::Validation(_))
        ));
    }

    #[test]
    fn enrichment_defaults_are_untouched() {
        let item = sample_item();
        assert!(!item.enrichment.is_analyzed());
        assert_eq!(item.enrichment.sentiment, Sentiment::Neutral);
        assert_eq!(item.field_value("sentiment"), Some(Value::String("neutral".into())));
    }

    #[test]
    fn every_known_field_projects() {
        let item = sample_item();
        for field in CrawlItem::known_fields() {
            assert!(item.field_value(field).is_some(), "missing field {}", field);
        }
    }
}

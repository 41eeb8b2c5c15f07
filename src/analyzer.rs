//! # Analyzer Module
//!
//! Content analysis behind the `ContentAnalyzer` collaborator trait.
//!
//! ## Overview
//!
//! An analyzer turns page text into the structured [`Enrichment`] record:
//! summary, entities, topics, sentiment, key points, and classified facts.
//! Two implementations are provided:
//!
//! - **`LlmAnalyzer`**: calls an OpenAI-compatible chat-completions endpoint
//!   and parses the structured JSON out of the model reply. Transport
//!   failures, non-success statuses, and malformed replies surface as
//!   `CrawlError::Analyzer`; the pipeline contains them, so a broken
//!   endpoint never drops items.
//! - **`FallbackAnalyzer`**: rule-based heuristics over the text itself.
//!   Used when no API key is configured, and reports `is_enabled() == false`
//!   while still producing a complete enrichment record.
//!
//! Keyword extraction is infallible at the trait boundary: the LLM path
//! falls back to frequency analysis on any failure.
//!
//! The per-call timeout is enforced here, by the HTTP client, not by the
//! pipeline stage that invokes the analyzer.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::error::CrawlError;
use crate::item::{Enrichment, Sentiment, StructuredFacts};
use crate::text;

/// Widest brace-to-brace span in a model reply; models often wrap JSON in
/// prose or code fences.
static JSON_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("Failed to compile JSON object regex"));

static JSON_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("Failed to compile JSON array regex"));

const ANALYSIS_CONTENT_CHARS: usize = 3000;
const KEYWORDS_CONTENT_CHARS: usize = 2000;

/// Collaborator that enriches crawled text with structured analysis.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Whether a remote analyzer is configured. A disabled analyzer still
    /// answers `analyze` with a complete fallback record.
    fn is_enabled(&self) -> bool;

    async fn analyze(&self, content: &str, url: &str, title: &str)
    -> Result<Enrichment, CrawlError>;

    /// Extracts up to `max_keywords` keywords. Never fails; implementations
    /// degrade to frequency analysis.
    async fn extract_keywords(&self, content: &str, max_keywords: usize) -> Vec<String>;
}

/// Analyzer backed by an OpenAI-compatible chat-completions endpoint.
pub struct LlmAnalyzer {
    client: Client,
    endpoint: String,
    model: String,
}

impl LlmAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, CrawlError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| CrawlError::Config("analyzer API key is missing".to_string()))?;

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| CrawlError::Config(format!("invalid analyzer API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| CrawlError::Config(format!("failed to build analyzer client: {}", e)))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Ok(LlmAnalyzer {
            client,
            endpoint,
            model: config.model,
        })
    }

    async fn chat(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CrawlError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| CrawlError::Analyzer(format!("analyzer request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(CrawlError::Analyzer(format!(
                "analyzer request failed ({}): {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CrawlError::Analyzer(format!("failed to parse analyzer response: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CrawlError::Analyzer("analyzer returned no choices".to_string()))
    }
}

#[async_trait]
impl ContentAnalyzer for LlmAnalyzer {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        content: &str,
        url: &str,
        title: &str,
    ) -> Result<Enrichment, CrawlError> {
        let prompt = build_analysis_prompt(content, url, title);
        let reply = self
            .chat(
                "You are an expert content analyzer. Provide structured analysis of web content.",
                &prompt,
                0.3,
                1000,
            )
            .await?;
        let mut enrichment = parse_enrichment_reply(&reply)?;
        enrichment.parser = "deepseek".to_string();
        debug!("LLM analysis complete for {}", url);
        Ok(enrichment)
    }

    async fn extract_keywords(&self, content: &str, max_keywords: usize) -> Vec<String> {
        let prompt = build_keywords_prompt(content, max_keywords);
        match self
            .chat("You are a keyword extraction expert.", &prompt, 0.1, 200)
            .await
        {
            Ok(reply) => match parse_keyword_reply(&reply, max_keywords) {
                Some(keywords) => keywords,
                None => {
                    warn!("Keyword reply held no JSON list, using frequency fallback");
                    text::extract_keywords(content, max_keywords)
                }
            },
            Err(e) => {
                warn!("AI keyword extraction failed: {}", e);
                text::extract_keywords(content, max_keywords)
            }
        }
    }
}

/// Rule-based analyzer used when no remote analyzer is configured.
#[derive(Debug, Default)]
pub struct FallbackAnalyzer;

impl FallbackAnalyzer {
    pub fn new() -> Self {
        FallbackAnalyzer
    }
}

#[async_trait]
impl ContentAnalyzer for FallbackAnalyzer {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn analyze(
        &self,
        content: &str,
        _url: &str,
        _title: &str,
    ) -> Result<Enrichment, CrawlError> {
        Ok(fallback_enrichment(content))
    }

    async fn extract_keywords(&self, content: &str, max_keywords: usize) -> Vec<String> {
        text::extract_keywords(content, max_keywords)
    }
}

/// Heuristic enrichment over the text itself. Topics and key points stay
/// empty; those require the remote analyzer.
pub fn fallback_enrichment(content: &str) -> Enrichment {
    Enrichment {
        summary: text::summarize(content),
        entities: text::extract_entities(content),
        topics: Vec::new(),
        sentiment: text::sentiment_of(content),
        key_points: Vec::new(),
        structured: StructuredFacts {
            word_count: text::word_count(content),
            content_type: "webpage".to_string(),
            ..StructuredFacts::default()
        },
        extracted_keywords: Vec::new(),
        parser: "fallback".to_string(),
    }
}

fn build_analysis_prompt(content: &str, url: &str, title: &str) -> String {
    let content = truncate_with_ellipsis(content, ANALYSIS_CONTENT_CHARS);
    format!(
        r#"Analyze the following web content and provide a structured response in JSON format:

URL: {url}
Title: {title}

Content:
{content}

Please provide analysis in this JSON structure:
{{
    "summary": "Brief 2-3 sentence summary of the content",
    "entities": ["list", "of", "key", "entities", "people", "organizations"],
    "topics": ["main", "topics", "covered"],
    "sentiment": "positive/neutral/negative",
    "key_points": ["bullet", "point", "list", "of", "main", "points"],
    "structured_data": {{
        "category": "content category",
        "difficulty_level": "beginner/intermediate/advanced",
        "content_type": "article/tutorial/news/documentation/etc"
    }}
}}

Focus on accuracy and relevance. Extract only information that is clearly present in the content."#
    )
}

fn build_keywords_prompt(content: &str, max_keywords: usize) -> String {
    let content: String = content.chars().take(KEYWORDS_CONTENT_CHARS).collect();
    format!(
        r#"Extract the most important keywords from this text. Return only a JSON list of keywords.

Text: {content}

Return format: ["keyword1", "keyword2", "keyword3", ...]
Maximum {max_keywords} keywords."#
    )
}

fn truncate_with_ellipsis(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    } else {
        content.to_string()
    }
}

/// Pulls the JSON object out of a model reply and maps it onto the
/// enrichment record. Malformed replies are an analyzer error, not a
/// silent default.
fn parse_enrichment_reply(reply: &str) -> Result<Enrichment, CrawlError> {
    let json_str = JSON_OBJECT_RE
        .find(reply)
        .map(|m| m.as_str())
        .ok_or_else(|| CrawlError::Analyzer("analyzer reply held no JSON object".to_string()))?;
    let parsed: Value = serde_json::from_str(json_str)
        .map_err(|e| CrawlError::Analyzer(format!("analyzer reply held invalid JSON: {}", e)))?;

    let structured = parsed.get("structured_data").cloned().unwrap_or_default();
    Ok(Enrichment {
        summary: string_field(&parsed, "summary"),
        entities: string_list_field(&parsed, "entities"),
        topics: string_list_field(&parsed, "topics"),
        sentiment: sentiment_field(&parsed),
        key_points: string_list_field(&parsed, "key_points"),
        structured: StructuredFacts {
            word_count: structured
                .get("word_count")
                .and_then(Value::as_u64)
                .unwrap_or_default() as usize,
            content_type: string_field(&structured, "content_type"),
            category: string_field(&structured, "category"),
            difficulty_level: string_field(&structured, "difficulty_level"),
        },
        extracted_keywords: Vec::new(),
        parser: String::new(),
    })
}

fn parse_keyword_reply(reply: &str, max_keywords: usize) -> Option<Vec<String>> {
    let json_str = JSON_ARRAY_RE.find(reply)?.as_str();
    let parsed: Value = serde_json::from_str(json_str).ok()?;
    let keywords = parsed
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .take(max_keywords)
        .collect();
    Some(keywords)
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list_field(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn sentiment_field(value: &Value) -> Sentiment {
    match value.get("sentiment").and_then(Value::as_str) {
        Some("positive") => Sentiment::Positive,
        Some("negative") => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

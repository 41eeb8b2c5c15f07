//! # Text Module
//!
//! Content cleaning and rule-based analysis helpers.
//!
//! The cleaning functions normalize fetched HTML before extraction: oversized
//! bodies are clamped, script and iframe blocks are stripped, and whitespace
//! runs collapse to single spaces. The analysis functions implement the
//! deterministic fallback used when no remote analyzer is configured:
//! word-list sentiment, capitalized-word entities, first-sentence summaries,
//! and frequency-ranked keyword extraction.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::item::Sentiment;

/// Raw bodies beyond this size are truncated before parsing.
pub const MAX_RAW_BYTES: usize = 800_000;

/// Character cap for a fallback summary.
const SUMMARY_MAX_CHARS: usize = 200;

/// Distinct entities kept by the fallback extractor.
const MAX_ENTITIES: usize = 10;

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("Failed to compile script regex")
});

static IFRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<iframe[^>]*>.*?</iframe>").expect("Failed to compile iframe regex")
});

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("Failed to compile entity regex"));

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("Failed to compile word regex"));

const POSITIVE_WORDS: &[&str] = &["good", "great", "excellent", "amazing", "wonderful", "fantastic"];

const NEGATIVE_WORDS: &[&str] = &["bad", "terrible", "awful", "horrible", "poor", "disappointing"];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must", "shall", "this", "that", "these", "those",
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
];

/// Collapses whitespace runs to single spaces and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Removes script and iframe blocks, which carry no extractable prose and
/// routinely confuse downstream text heuristics.
pub fn strip_noise_tags(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, "");
    IFRAME_RE.replace_all(&without_scripts, "").into_owned()
}

/// Truncates to at most [`MAX_RAW_BYTES`], respecting char boundaries.
pub fn clamp_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Word-list sentiment: counts which positive and negative markers appear in
/// the lowercased content and compares the two tallies.
pub fn sentiment_of(content: &str) -> Sentiment {
    let lower = content.to_lowercase();
    let pos = POSITIVE_WORDS.iter().filter(|w| lower.contains(**w)).count();
    let neg = NEGATIVE_WORDS.iter().filter(|w| lower.contains(**w)).count();
    if pos > neg {
        Sentiment::Positive
    } else if neg > pos {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Capitalized single words, deduplicated in first-seen order, capped at ten.
pub fn extract_entities(content: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in ENTITY_RE.find_iter(content) {
        let word = m.as_str();
        if !seen.iter().any(|s: &String| s == word) {
            seen.push(word.to_string());
            if seen.len() == MAX_ENTITIES {
                break;
            }
        }
    }
    seen
}

/// First sentence of the content, capped at 200 chars with a `...` marker.
pub fn summarize(content: &str) -> String {
    let first = content
        .split(['.', '!', '?'])
        .next()
        .unwrap_or("")
        .trim();
    if first.chars().count() > SUMMARY_MAX_CHARS {
        let capped: String = first.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{}...", capped.trim_end())
    } else {
        first.to_string()
    }
}

/// Number of whitespace-separated words.
pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Frequency-ranked keywords: lowercased words of three or more letters,
/// stop words removed, ties broken by first appearance.
pub fn extract_keywords(content: &str, max_keywords: usize) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for m in WORD_RE.find_iter(&lower) {
        let word = m.as_str();
        if STOP_WORDS.contains(&word) {
            continue;
        }
        let entry = counts.entry(word).or_insert(0);
        if *entry == 0 {
            order.push(word);
        }
        *entry += 1;
    }
    order.sort_by_key(|w| std::cmp::Reverse(counts[w]));
    order
        .into_iter()
        .take(max_keywords)
        .map(|w| w.to_string())
        .collect()
}

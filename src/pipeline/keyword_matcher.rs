//! Matches configured keywords against item text. In strict mode an item
//! with no match is dropped; otherwise the match list is attached and the
//! item forwards regardless.

use async_trait::async_trait;

use super::{PipelineStage, StageContext, StageOutcome};
use crate::error::CrawlError;
use crate::item::CrawlItem;

/// Second stage of the standard chain: case-insensitive substring matching
/// of each configured keyword against `title + " " + cleaned_content`.
pub struct KeywordMatcher {
    /// Lower-cased at construction; matching never re-normalizes them.
    keywords: Vec<String>,
    strict: bool,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String], strict: bool) -> Self {
        KeywordMatcher {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            strict,
        }
    }
}

#[async_trait]
impl PipelineStage for KeywordMatcher {
    fn name(&self) -> &str {
        "keyword_matcher"
    }

    async fn process(
        &self,
        mut item: CrawlItem,
        _ctx: &StageContext,
    ) -> Result<StageOutcome, CrawlError> {
        let haystack = format!("{} {}", item.title, item.cleaned_content).to_lowercase();
        let matched: Vec<String> = self
            .keywords
            .iter()
            .filter(|keyword| haystack.contains(keyword.as_str()))
            .cloned()
            .collect();

        if self.strict && matched.is_empty() {
            return Ok(StageOutcome::Drop {
                reason: "no-keyword-match".to_string(),
            });
        }
        item.matched_keywords = matched;
        Ok(StageOutcome::Forward(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CrawlState;
    use crate::stats::StatCollector;
    use std::sync::Arc;

    fn ctx() -> StageContext {
        StageContext {
            stats: Arc::new(StatCollector::default()),
            state: CrawlState::new(),
        }
    }

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn item(title: &str, content: &str) -> CrawlItem {
        CrawlItem::new("http://a", title, "raw", content, 0)
    }

    #[tokio::test]
    async fn matches_are_case_insensitive_substrings() {
        let matcher = KeywordMatcher::new(&keywords(&["python", "rust"]), false);
        let outcome = matcher
            .process(item("Python Guide", "intro to python basics"), &ctx())
            .await
            .unwrap();
        match outcome {
            StageOutcome::Forward(item) => {
                assert_eq!(item.matched_keywords, vec!["python"]);
            }
            StageOutcome::Drop { .. } => panic!("matching item dropped"),
        }
    }

    #[tokio::test]
    async fn strict_mode_drops_unmatched_items() {
        let matcher = KeywordMatcher::new(&keywords(&["kubernetes"]), true);
        let outcome = matcher
            .process(item("Cooking", "a recipe for bread"), &ctx())
            .await
            .unwrap();
        match outcome {
            StageOutcome::Drop { reason } => assert_eq!(reason, "no-keyword-match"),
            StageOutcome::Forward(_) => panic!("unmatched item forwarded in strict mode"),
        }
    }

    #[tokio::test]
    async fn lenient_mode_forwards_with_empty_matches() {
        let matcher = KeywordMatcher::new(&keywords(&["kubernetes"]), false);
        let outcome = matcher
            .process(item("Cooking", "a recipe for bread"), &ctx())
            .await
            .unwrap();
        match outcome {
            StageOutcome::Forward(item) => assert!(item.matched_keywords.is_empty()),
            StageOutcome::Drop { .. } => panic!("lenient mode dropped an item"),
        }
    }

    #[tokio::test]
    async fn matched_keywords_are_a_subset_of_configured() {
        let configured = keywords(&["rust", "async", "tokio"]);
        let matcher = KeywordMatcher::new(&configured, false);
        let outcome = matcher
            .process(item("Async Rust", "tokio runtime internals"), &ctx())
            .await
            .unwrap();
        if let StageOutcome::Forward(item) = outcome {
            for matched in &item.matched_keywords {
                assert!(configured.contains(matched));
            }
            assert_eq!(item.matched_keywords, vec!["rust", "async", "tokio"]);
        } else {
            panic!("item dropped");
        }
    }

    #[tokio::test]
    async fn blank_keywords_are_ignored_at_construction() {
        let matcher = KeywordMatcher::new(&keywords(&["  ", "", "rust "]), false);
        let outcome = matcher
            .process(item("Rust", "notes"), &ctx())
            .await
            .unwrap();
        if let StageOutcome::Forward(item) = outcome {
            assert_eq!(item.matched_keywords, vec!["rust"]);
        } else {
            panic!("item dropped");
        }
    }
}

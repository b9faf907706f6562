//! Keyword volume research.
//!
//! Given seed keywords and/or a page URL, fetch related keyword ideas with
//! their monthly search volume and competition level, drop the long tail,
//! and rank what is left for the outline's target keyword.

pub mod ads;
pub mod ideas;

pub use ads::{AdsConfig, AdsKeywordPlanner};
pub use ideas::{Competition, KeywordFilter, KeywordIdea, KeywordReport, filter_and_rank};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KeywordError;

/// Seeds for a keyword ideas query. At least one of the two must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRequest {
    pub keywords: Vec<String>,
    pub page_url: Option<String>,
}

impl KeywordRequest {
    /// A request seeded with a single keyword.
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keywords: vec![keyword.into()],
            page_url: None,
        }
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }
}

/// Source of raw keyword ideas.
#[async_trait]
pub trait KeywordSource: Send + Sync {
    async fn keyword_ideas(
        &self,
        request: &KeywordRequest,
    ) -> Result<Vec<KeywordIdea>, KeywordError>;
}

/// Fetch ideas from `source` and reduce them to a ranked report.
pub async fn research(
    source: &dyn KeywordSource,
    request: &KeywordRequest,
    filter: &KeywordFilter,
) -> Result<KeywordReport, KeywordError> {
    let ideas = source.keyword_ideas(request).await?;
    let fetched = ideas.len();
    let report = KeywordReport::new(ideas, filter);
    tracing::debug!(fetched, kept = report.ideas.len(), "Ranked keyword ideas");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Vec<KeywordIdea>);

    #[async_trait]
    impl KeywordSource for FixedSource {
        async fn keyword_ideas(
            &self,
            request: &KeywordRequest,
        ) -> Result<Vec<KeywordIdea>, KeywordError> {
            if request.keywords.is_empty() && request.page_url.is_none() {
                return Err(KeywordError::NoSeed);
            }
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn research_filters_and_ranks() {
        let source = FixedSource(vec![
            KeywordIdea::new("a", 50, Competition::Low),
            KeywordIdea::new("b", 150, Competition::High),
            KeywordIdea::new("c", 300, Competition::Medium),
        ]);
        let report = research(
            &source,
            &KeywordRequest::keyword("btob"),
            &KeywordFilter::default(),
        )
        .await
        .unwrap();
        let texts: Vec<&str> = report.ideas.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn research_without_seed_fails() {
        let source = FixedSource(vec![]);
        let result = research(&source, &KeywordRequest::default(), &KeywordFilter::default()).await;
        assert!(matches!(result, Err(KeywordError::NoSeed)));
    }

    #[test]
    fn request_builder_sets_url() {
        let req = KeywordRequest::keyword("kw").with_page_url("https://example.com");
        assert_eq!(req.keywords, vec!["kw".to_string()]);
        assert_eq!(req.page_url.as_deref(), Some("https://example.com"));
    }
}

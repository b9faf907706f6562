//! Keyword ideas: filtering, ranking, and markdown rendering.

use std::cmp::Ordering;
use std::path::Path;

use comfy_table::Table;
use comfy_table::presets::ASCII_MARKDOWN;
use serde::{Deserialize, Serialize};

use crate::error::KeywordError;

/// Advertiser competition level reported for a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Competition {
    Low,
    Medium,
    High,
    #[default]
    #[serde(other)]
    Unspecified,
}

impl Competition {
    /// Sort rank: lower competition first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Unspecified => 3,
        }
    }
}

impl std::fmt::Display for Competition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Unspecified => write!(f, "UNSPECIFIED"),
        }
    }
}

/// One candidate keyword with its monthly volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordIdea {
    pub text: String,
    pub avg_monthly_searches: i64,
    pub competition: Competition,
}

impl KeywordIdea {
    pub fn new(
        text: impl Into<String>,
        avg_monthly_searches: i64,
        competition: Competition,
    ) -> Self {
        Self {
            text: text.into(),
            avg_monthly_searches,
            competition,
        }
    }
}

/// Which ideas survive into the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFilter {
    /// Ideas must have strictly more monthly searches than this.
    pub min_volume: i64,
    /// Keep ideas whose competition level is unspecified.
    pub include_unspecified: bool,
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self {
            min_volume: 100,
            include_unspecified: false,
        }
    }
}

/// Order by competition rank ascending, then volume descending.
pub fn compare_ideas(a: &KeywordIdea, b: &KeywordIdea) -> Ordering {
    a.competition
        .rank()
        .cmp(&b.competition.rank())
        .then_with(|| b.avg_monthly_searches.cmp(&a.avg_monthly_searches))
}

/// Drop ideas the filter rejects and sort the rest.
pub fn filter_and_rank(ideas: Vec<KeywordIdea>, filter: &KeywordFilter) -> Vec<KeywordIdea> {
    let mut kept: Vec<KeywordIdea> = ideas
        .into_iter()
        .filter(|idea| idea.avg_monthly_searches > filter.min_volume)
        .filter(|idea| filter.include_unspecified || idea.competition != Competition::Unspecified)
        .collect();
    kept.sort_by(compare_ideas);
    kept
}

/// Ranked keyword ideas ready for display.
#[derive(Debug, Clone, Default)]
pub struct KeywordReport {
    pub ideas: Vec<KeywordIdea>,
}

impl KeywordReport {
    pub fn new(ideas: Vec<KeywordIdea>, filter: &KeywordFilter) -> Self {
        Self {
            ideas: filter_and_rank(ideas, filter),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ideas.is_empty()
    }

    /// Render as a markdown table.
    pub fn to_markdown(&self) -> String {
        let mut table = Table::new();
        table.load_preset(ASCII_MARKDOWN);
        table.set_header(vec!["キーワード", "月平均検索ボリューム", "広告競合度"]);
        for idea in &self.ideas {
            table.add_row(vec![
                idea.text.clone(),
                idea.avg_monthly_searches.to_string(),
                idea.competition.to_string(),
            ]);
        }
        table.to_string()
    }

    /// Write the markdown table to `path`.
    pub fn write_markdown(&self, path: &Path) -> Result<(), KeywordError> {
        std::fs::write(path, self.to_markdown()).map_err(|e| KeywordError::Output {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_low_volume_and_orders_by_competition() {
        let ideas = vec![
            KeywordIdea::new("a", 50, Competition::Low),
            KeywordIdea::new("b", 150, Competition::High),
            KeywordIdea::new("c", 300, Competition::Medium),
        ];
        let ranked = filter_and_rank(ideas, &KeywordFilter::default());
        let order: Vec<(i64, Competition)> = ranked
            .iter()
            .map(|i| (i.avg_monthly_searches, i.competition))
            .collect();
        assert_eq!(
            order,
            vec![(300, Competition::Medium), (150, Competition::High)]
        );
    }

    #[test]
    fn volume_breaks_ties_descending() {
        let ideas = vec![
            KeywordIdea::new("small", 200, Competition::Low),
            KeywordIdea::new("big", 5000, Competition::Low),
            KeywordIdea::new("mid", 800, Competition::Low),
        ];
        let ranked = filter_and_rank(ideas, &KeywordFilter::default());
        let texts: Vec<&str> = ranked.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["big", "mid", "small"]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let ideas = vec![
            KeywordIdea::new("edge", 100, Competition::Low),
            KeywordIdea::new("over", 101, Competition::Low),
        ];
        let ranked = filter_and_rank(ideas, &KeywordFilter::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].text, "over");
    }

    #[test]
    fn unspecified_dropped_unless_requested() {
        let ideas = vec![
            KeywordIdea::new("x", 1000, Competition::Unspecified),
            KeywordIdea::new("y", 500, Competition::High),
        ];
        let default = filter_and_rank(ideas.clone(), &KeywordFilter::default());
        assert_eq!(default.len(), 1);

        let keep = KeywordFilter {
            include_unspecified: true,
            ..Default::default()
        };
        let all = filter_and_rank(ideas, &keep);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].competition, Competition::Unspecified);
    }

    #[test]
    fn competition_parses_api_names() {
        let low: Competition = serde_json::from_str("\"LOW\"").unwrap();
        assert_eq!(low, Competition::Low);
        let unknown: Competition = serde_json::from_str("\"UNKNOWN\"").unwrap();
        assert_eq!(unknown, Competition::Unspecified);
    }

    #[test]
    fn markdown_lists_rows_in_rank_order() {
        let report = KeywordReport::new(
            vec![
                KeywordIdea::new("btob マーケティング", 1900, Competition::Medium),
                KeywordIdea::new("デジタル マーケティング", 12100, Competition::Low),
            ],
            &KeywordFilter::default(),
        );
        let md = report.to_markdown();
        assert!(md.contains("キーワード"));
        assert!(md.contains("広告競合度"));
        let low = md.find("デジタル マーケティング").unwrap();
        let medium = md.find("btob マーケティング").unwrap();
        assert!(low < medium);
        assert!(md.contains("12100"));
    }

    #[test]
    fn write_markdown_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyword_ideas.md");
        let report = KeywordReport::new(
            vec![KeywordIdea::new("kw", 300, Competition::Low)],
            &KeywordFilter::default(),
        );
        report.write_markdown(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, report.to_markdown());
    }
}

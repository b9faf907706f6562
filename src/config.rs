//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::{ContextKeys, TableNames};
use crate::error::ConfigError;
use crate::keywords::KeywordFilter;

/// Target keyword used when none is given.
pub const DEFAULT_TARGET_KEYWORD: &str = "btob デジタル マーケティング";

/// How a reviewer's free-form answer is turned into accept/reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictPolicy {
    /// Only the literal `yes` accepts; everything else rejects.
    #[default]
    Exact,
    /// Case- and whitespace-insensitive; `yes` and `y` accept.
    Lenient,
    /// Like lenient, but only `no`/`n` reject. Anything else is an error.
    Strict,
}

impl std::fmt::Display for VerdictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Exact => "exact",
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        };
        write!(f, "{s}")
    }
}

impl FromStr for VerdictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::InvalidValue {
                key: "verdict_policy".to_string(),
                message: format!("unknown policy '{other}' (expected exact, lenient or strict)"),
            }),
        }
    }
}

/// Everything a pipeline run needs besides its collaborators.
///
/// Passed by reference into each step; there is no process-wide copy.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Identifier tuple new sessions are scoped to.
    pub keys: ContextKeys,
    /// Keyword the outline is optimised for.
    pub target_keyword: String,
    /// Directory holding the CSV tables.
    pub data_dir: PathBuf,
    /// CSV file names inside `data_dir`.
    pub tables: TableNames,
    pub verdict_policy: VerdictPolicy,
    /// Stop after this many drafts have been rejected. `None` loops forever.
    pub max_drafts: Option<u32>,
    /// Fetch keyword volume before the first draft.
    pub keyword_research: bool,
    /// Optional landing page used as an extra keyword seed.
    pub page_url: Option<String>,
    pub keyword_filter: KeywordFilter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keys: ContextKeys {
                site_id: "c15000000001".to_string(),
                company_id: 1,
                product_id: 1,
                persona_id: 1,
            },
            target_keyword: DEFAULT_TARGET_KEYWORD.to_string(),
            data_dir: PathBuf::from("db"),
            tables: TableNames::default(),
            verdict_policy: VerdictPolicy::default(),
            max_drafts: None,
            keyword_research: false,
            page_url: None,
            keyword_filter: KeywordFilter::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings that can never produce a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_drafts == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "max_drafts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.target_keyword.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "target_keyword".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_account() {
        let config = PipelineConfig::default();
        assert_eq!(config.keys.site_id, "c15000000001");
        assert_eq!(config.keys.company_id, 1);
        assert_eq!(config.target_keyword, DEFAULT_TARGET_KEYWORD);
        assert_eq!(config.verdict_policy, VerdictPolicy::Exact);
        assert!(config.max_drafts.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Strict".parse::<VerdictPolicy>().unwrap(), VerdictPolicy::Strict);
        assert_eq!(" lenient ".parse::<VerdictPolicy>().unwrap(), VerdictPolicy::Lenient);
        assert!("loose".parse::<VerdictPolicy>().is_err());
    }

    #[test]
    fn policy_display_matches_serde() {
        for policy in [VerdictPolicy::Exact, VerdictPolicy::Lenient, VerdictPolicy::Strict] {
            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(json, format!("\"{policy}\""));
        }
    }

    #[test]
    fn zero_max_drafts_is_invalid() {
        let config = PipelineConfig {
            max_drafts: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}

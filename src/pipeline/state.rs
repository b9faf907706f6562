//! Session state machine: tracks where an outline session is in its
//! draft/review cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ContextKeys;
use crate::error::PipelineError;
use crate::llm::ChatMessage;

use super::prompts;

/// The phases of a session.
///
/// Gathering → AwaitingFeedback, then either Accepted / Exhausted, or
/// Redrafting → AwaitingFeedback for another round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Context collected, first draft not yet produced.
    #[default]
    Gathering,
    /// A draft is waiting for the reviewer.
    AwaitingFeedback,
    /// The last draft was rejected; a new one is due.
    Redrafting,
    Accepted,
    /// Rejected at the configured draft limit.
    Exhausted,
}

impl SessionPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, target),
            (Gathering, AwaitingFeedback)
                | (AwaitingFeedback, Accepted)
                | (AwaitingFeedback, Redrafting)
                | (AwaitingFeedback, Exhausted)
                | (Redrafting, AwaitingFeedback)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted)
    }

    /// Whether the next step is an LLM call.
    pub fn needs_draft(&self) -> bool {
        matches!(self, Self::Gathering | Self::Redrafting)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gathering => "gathering",
            Self::AwaitingFeedback => "awaiting_feedback",
            Self::Redrafting => "redrafting",
            Self::Accepted => "accepted",
            Self::Exhausted => "exhausted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SessionPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gathering" => Ok(Self::Gathering),
            "awaiting_feedback" => Ok(Self::AwaitingFeedback),
            "redrafting" => Ok(Self::Redrafting),
            "accepted" => Ok(Self::Accepted),
            "exhausted" => Ok(Self::Exhausted),
            other => Err(format!("unknown session phase: {other}")),
        }
    }
}

/// The reviewer's last decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown verdict: {other}")),
        }
    }
}

/// One outline session, persisted between review rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub keys: ContextKeys,
    pub target_keyword: String,
    /// Append-only conversation history.
    pub history: Vec<ChatMessage>,
    /// Latest outline produced.
    pub draft: Option<String>,
    pub verdict: Verdict,
    /// Set after a rejection, cleared on acceptance.
    pub remake_flag: bool,
    /// Number of drafts produced so far.
    pub revision_count: u32,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(keys: ContextKeys, target_keyword: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            keys,
            target_keyword: target_keyword.into(),
            history: vec![ChatMessage::user(prompts::INITIAL_REQUEST)],
            draft: None,
            verdict: Verdict::Pending,
            remake_flag: false,
            revision_count: 0,
            phase: SessionPhase::Gathering,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `target`, rejecting transitions the state machine forbids.
    pub fn transition(&mut self, target: SessionPhase) -> Result<(), PipelineError> {
        if !self.phase.can_transition_to(target) {
            return Err(PipelineError::InvalidTransition {
                id: self.id,
                phase: self.phase.to_string(),
                target: target.to_string(),
            });
        }
        self.phase = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append a message to the history.
    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
        self.updated_at = Utc::now();
    }

    /// Store a freshly produced draft and wait for the reviewer.
    pub fn record_draft(&mut self, draft: String) -> Result<(), PipelineError> {
        self.transition(SessionPhase::AwaitingFeedback)?;
        self.push(ChatMessage::assistant(draft.clone()));
        self.draft = Some(draft);
        self.verdict = Verdict::Pending;
        self.revision_count += 1;
        Ok(())
    }

    /// Error out unless the session is still in progress.
    pub fn ensure_open(&self) -> Result<(), PipelineError> {
        if self.phase.is_terminal() {
            return Err(PipelineError::AlreadyFinished {
                id: self.id,
                phase: self.phase.to_string(),
            });
        }
        Ok(())
    }
}

//! Outline pipeline: drives a session through context gathering,
//! drafting, and review.
//!
//! Every step that waits on something external (the LLM, the reviewer)
//! is preceded by a save, so a session can be picked up again by id from
//! any process.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::context::{self, ContextKeys, ContextProvider, NOT_FOUND};
use crate::error::PipelineError;
use crate::keywords::{self, KeywordRequest, KeywordSource};
use crate::llm::{ChatMessage, LlmProvider};
use crate::review::ReviewGate;
use crate::store::{LlmCallRecord, LlmCostSummary, SessionStore};

use super::controller::RevisionController;
use super::drafter::OutlineDrafter;
use super::prompts;
use super::state::{Session, SessionPhase};

/// Where a session stands after a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Suspended until a verdict arrives.
    AwaitingFeedback {
        session_id: Uuid,
        draft: String,
        revision: u32,
    },
    Accepted {
        session_id: Uuid,
        draft: String,
        revision: u32,
    },
    /// Rejected at the draft limit; the last draft is kept for reference.
    Exhausted {
        session_id: Uuid,
        draft: String,
        revision: u32,
    },
}

impl StepOutcome {
    /// The outcome a session at rest represents, or `None` if a draft is owed.
    pub fn from_session(session: &Session) -> Option<Self> {
        let session_id = session.id;
        let draft = session.draft.clone().unwrap_or_default();
        let revision = session.revision_count;
        match session.phase {
            SessionPhase::AwaitingFeedback => Some(Self::AwaitingFeedback {
                session_id,
                draft,
                revision,
            }),
            SessionPhase::Accepted => Some(Self::Accepted {
                session_id,
                draft,
                revision,
            }),
            SessionPhase::Exhausted => Some(Self::Exhausted {
                session_id,
                draft,
                revision,
            }),
            SessionPhase::Gathering | SessionPhase::Redrafting => None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        match self {
            Self::AwaitingFeedback { session_id, .. }
            | Self::Accepted { session_id, .. }
            | Self::Exhausted { session_id, .. } => *session_id,
        }
    }

    pub fn draft(&self) -> &str {
        match self {
            Self::AwaitingFeedback { draft, .. }
            | Self::Accepted { draft, .. }
            | Self::Exhausted { draft, .. } => draft,
        }
    }

    pub fn revision(&self) -> u32 {
        match self {
            Self::AwaitingFeedback { revision, .. }
            | Self::Accepted { revision, .. }
            | Self::Exhausted { revision, .. } => *revision,
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::AwaitingFeedback { .. })
    }
}

/// The outline pipeline and its collaborators.
pub struct OutlinePipeline {
    config: PipelineConfig,
    store: Arc<dyn SessionStore>,
    providers: Vec<Arc<dyn ContextProvider>>,
    /// Absent when no LLM is configured; such a pipeline can only settle
    /// sessions that need no further draft.
    drafter: Option<OutlineDrafter>,
    controller: RevisionController,
    keywords: Option<Arc<dyn KeywordSource>>,
}

impl OutlinePipeline {
    /// Build a pipeline reading the standard CSV tables from `config.data_dir`.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn SessionStore>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let mut pipeline = Self::without_llm(config, store);
        pipeline.drafter = Some(OutlineDrafter::new(llm));
        pipeline
    }

    /// Build a pipeline that records verdicts but cannot draft.
    ///
    /// Accepting a draft needs no LLM call; a verdict that asks for a
    /// redraft fails with `DrafterUnavailable` and leaves the stored
    /// session as it was.
    pub fn without_llm(config: PipelineConfig, store: Arc<dyn SessionStore>) -> Self {
        let providers = context::default_providers(&config.data_dir, &config.tables);
        let controller = RevisionController::new(config.verdict_policy, config.max_drafts);
        Self {
            config,
            store,
            providers,
            drafter: None,
            controller,
            keywords: None,
        }
    }

    /// Attach a keyword source, used when keyword research is enabled.
    pub fn with_keyword_source(mut self, source: Arc<dyn KeywordSource>) -> Self {
        self.keywords = Some(source);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start a session for the configured keys and keyword.
    pub async fn start(&self) -> Result<StepOutcome, PipelineError> {
        self.start_session(self.config.keys.clone(), &self.config.target_keyword)
            .await
    }

    /// Start a session for explicit keys and keyword, run it up to the first
    /// review, and return once the draft is waiting.
    pub async fn start_session(
        &self,
        keys: ContextKeys,
        target_keyword: &str,
    ) -> Result<StepOutcome, PipelineError> {
        let mut session = Session::new(keys, target_keyword);
        info!(
            session_id = %session.id,
            site_id = %session.keys.site_id,
            keyword = %session.target_keyword,
            "Starting outline session"
        );

        self.gather_context(&mut session).await?;
        self.store.save_session(&session).await?;
        self.draft_next(&mut session).await
    }

    /// Apply a reviewer verdict to a suspended session and run it to the
    /// next suspension point.
    pub async fn resume(&self, id: Uuid, verdict: &str) -> Result<StepOutcome, PipelineError> {
        let mut session = self.session(id).await?;
        let phase = self.controller.apply(&mut session, verdict)?;
        if phase.needs_draft() && self.drafter.is_none() {
            return Err(PipelineError::DrafterUnavailable { id });
        }
        self.store.save_session(&session).await?;
        info!(session_id = %id, %phase, revision = session.revision_count, "Verdict applied");

        if phase.needs_draft() {
            return self.draft_next(&mut session).await;
        }
        self.settled(&session)
    }

    /// Bring a session back to a resting point without a verdict: produce the
    /// draft that is owed (after an interrupted LLM call), or report where it
    /// already stands.
    pub async fn continue_session(&self, id: Uuid) -> Result<StepOutcome, PipelineError> {
        let mut session = self.session(id).await?;
        if session.phase.needs_draft() {
            debug!(session_id = %id, phase = %session.phase, "Producing owed draft");
            return self.draft_next(&mut session).await;
        }
        self.settled(&session)
    }

    /// Drive `outcome` to a terminal state, asking `gate` for each verdict.
    ///
    /// Answers the verdict policy refuses are asked again.
    pub async fn run_with_gate(
        &self,
        mut outcome: StepOutcome,
        gate: &dyn ReviewGate,
    ) -> Result<StepOutcome, PipelineError> {
        loop {
            let StepOutcome::AwaitingFeedback {
                session_id,
                ref draft,
                revision,
            } = outcome
            else {
                return Ok(outcome);
            };

            let verdict = gate.review(draft, revision).await?;
            match self.resume(session_id, &verdict).await {
                Ok(next) => outcome = next,
                Err(PipelineError::InvalidVerdict { verdict }) => {
                    warn!(session_id = %session_id, ?verdict, "Unrecognised verdict, asking again");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Load a session or fail with `SessionNotFound`.
    pub async fn session(&self, id: Uuid) -> Result<Session, PipelineError> {
        self.store
            .get_session(id)
            .await?
            .ok_or(PipelineError::SessionNotFound { id })
    }

    /// LLM usage for a session.
    pub async fn cost(&self, id: Uuid) -> Result<LlmCostSummary, PipelineError> {
        Ok(self.store.get_session_cost(id).await?)
    }

    async fn gather_context(&self, session: &mut Session) -> Result<(), PipelineError> {
        for provider in &self.providers {
            let block = provider.render(&session.keys)?;
            debug!(
                session_id = %session.id,
                provider = provider.name(),
                found = block != NOT_FOUND,
                "Context lookup"
            );
            session.push(ChatMessage::user(block));
        }

        if !self.config.keyword_research {
            return Ok(());
        }
        let Some(ref source) = self.keywords else {
            warn!("Keyword research enabled but no keyword source configured");
            return Ok(());
        };

        let mut request = KeywordRequest::keyword(session.target_keyword.clone());
        request.page_url = self.config.page_url.clone();
        let report =
            keywords::research(source.as_ref(), &request, &self.config.keyword_filter).await?;
        let block = if report.is_empty() {
            NOT_FOUND.to_string()
        } else {
            prompts::keyword_table_message(&report.to_markdown())
        };
        session.push(ChatMessage::user(block));
        Ok(())
    }

    /// Produce the next draft, then persist and suspend for review.
    async fn draft_next(&self, session: &mut Session) -> Result<StepOutcome, PipelineError> {
        let Some(ref drafter) = self.drafter else {
            return Err(PipelineError::DrafterUnavailable { id: session.id });
        };
        let draft = drafter
            .draft(&session.history, &session.target_keyword)
            .await?;

        self.store
            .record_llm_call(&LlmCallRecord {
                session_id: Some(session.id),
                model: &draft.model,
                input_tokens: draft.input_tokens,
                output_tokens: draft.output_tokens,
                cost: draft.cost,
                purpose: Some("outline"),
            })
            .await?;

        session.record_draft(draft.content)?;
        self.store.save_session(session).await?;
        info!(
            session_id = %session.id,
            revision = session.revision_count,
            input_tokens = draft.input_tokens,
            output_tokens = draft.output_tokens,
            "Draft ready for review"
        );
        self.settled(session)
    }

    fn settled(&self, session: &Session) -> Result<StepOutcome, PipelineError> {
        StepOutcome::from_session(session).ok_or_else(|| PipelineError::InvalidTransition {
            id: session.id,
            phase: session.phase.to_string(),
            target: "review".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_in(phase: SessionPhase) -> Session {
        let mut session = Session::new(
            ContextKeys {
                site_id: "s".into(),
                company_id: 1,
                product_id: 1,
                persona_id: 1,
            },
            "kw",
        );
        session.draft = Some("d".into());
        session.revision_count = 2;
        session.phase = phase;
        session
    }

    #[test]
    fn outcome_mirrors_resting_phases() {
        let outcome =
            StepOutcome::from_session(&session_in(SessionPhase::AwaitingFeedback)).unwrap();
        assert!(!outcome.is_finished());
        assert_eq!(outcome.draft(), "d");
        assert_eq!(outcome.revision(), 2);

        let accepted = StepOutcome::from_session(&session_in(SessionPhase::Accepted)).unwrap();
        assert!(matches!(accepted, StepOutcome::Accepted { .. }));
        assert!(accepted.is_finished());

        let exhausted = StepOutcome::from_session(&session_in(SessionPhase::Exhausted)).unwrap();
        assert!(matches!(exhausted, StepOutcome::Exhausted { .. }));
    }

    #[test]
    fn no_outcome_while_a_draft_is_owed() {
        assert!(StepOutcome::from_session(&session_in(SessionPhase::Gathering)).is_none());
        assert!(StepOutcome::from_session(&session_in(SessionPhase::Redrafting)).is_none());
    }
}

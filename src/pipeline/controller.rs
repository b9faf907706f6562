//! Revision controller: decides, after each review, whether the session
//! ends or another draft is produced.

use crate::config::VerdictPolicy;
use crate::error::PipelineError;
use crate::llm::ChatMessage;

use super::prompts;
use super::state::{Session, SessionPhase, Verdict};

/// Where the session goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Terminate,
    Redraft,
}

/// Outcome of evaluating one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub route: Route,
    /// Whether another pass is needed; mirrors `route`.
    pub remake_flag: bool,
}

impl Decision {
    fn terminate() -> Self {
        Self {
            route: Route::Terminate,
            remake_flag: false,
        }
    }

    fn redraft() -> Self {
        Self {
            route: Route::Redraft,
            remake_flag: true,
        }
    }
}

/// Answers that carry no comment beyond accept/reject.
fn is_bare_answer(verdict: &str) -> bool {
    matches!(
        verdict.trim().to_lowercase().as_str(),
        "" | "yes" | "y" | "no" | "n"
    )
}

/// Routes sessions on the reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevisionController {
    policy: VerdictPolicy,
    max_drafts: Option<u32>,
}

impl RevisionController {
    pub fn new(policy: VerdictPolicy, max_drafts: Option<u32>) -> Self {
        Self { policy, max_drafts }
    }

    /// Map a raw verdict to a routing decision. Pure: the same input always
    /// yields the same decision.
    pub fn evaluate(&self, verdict: &str) -> Result<Decision, PipelineError> {
        match self.policy {
            VerdictPolicy::Exact => Ok(if verdict == "yes" {
                Decision::terminate()
            } else {
                Decision::redraft()
            }),
            VerdictPolicy::Lenient => {
                let normalized = verdict.trim().to_lowercase();
                Ok(if matches!(normalized.as_str(), "yes" | "y") {
                    Decision::terminate()
                } else {
                    Decision::redraft()
                })
            }
            VerdictPolicy::Strict => match verdict.trim().to_lowercase().as_str() {
                "yes" | "y" => Ok(Decision::terminate()),
                "no" | "n" => Ok(Decision::redraft()),
                _ => Err(PipelineError::InvalidVerdict {
                    verdict: verdict.to_string(),
                }),
            },
        }
    }

    /// Evaluate `verdict` against `session` and apply the resulting state
    /// update. Returns the phase the session moved to.
    ///
    /// The session is left untouched when the verdict is invalid.
    pub fn apply(
        &self,
        session: &mut Session,
        verdict: &str,
    ) -> Result<SessionPhase, PipelineError> {
        session.ensure_open()?;
        if session.phase != SessionPhase::AwaitingFeedback {
            return Err(PipelineError::InvalidTransition {
                id: session.id,
                phase: session.phase.to_string(),
                target: "review".to_string(),
            });
        }

        let decision = self.evaluate(verdict)?;

        let next = match decision.route {
            Route::Terminate => {
                session.verdict = Verdict::Accepted;
                session.remake_flag = decision.remake_flag;
                SessionPhase::Accepted
            }
            Route::Redraft => {
                session.verdict = Verdict::Rejected;
                match self.max_drafts {
                    // No redraft follows: the flag stays down, feedback is dropped.
                    Some(max) if session.revision_count >= max => {
                        session.remake_flag = false;
                        SessionPhase::Exhausted
                    }
                    _ => {
                        session.remake_flag = decision.remake_flag;
                        if !is_bare_answer(verdict) {
                            session.push(ChatMessage::user(prompts::feedback_message(verdict)));
                        }
                        SessionPhase::Redrafting
                    }
                }
            }
        };
        session.transition(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextKeys;

    fn awaiting() -> Session {
        let mut session = Session::new(
            ContextKeys {
                site_id: "c15000000001".into(),
                company_id: 1,
                product_id: 1,
                persona_id: 1,
            },
            "kw",
        );
        session.record_draft("outline".into()).unwrap();
        session
    }

    #[test]
    fn exact_terminates_only_on_literal_yes() {
        let controller = RevisionController::default();
        assert_eq!(controller.evaluate("yes").unwrap().route, Route::Terminate);
        for verdict in ["Yes", "YES", " yes", "y", "", "no", "maybe", "はい"] {
            let decision = controller.evaluate(verdict).unwrap();
            assert_eq!(decision.route, Route::Redraft, "verdict {verdict:?}");
            assert!(decision.remake_flag);
        }
    }

    #[test]
    fn evaluate_is_idempotent() {
        let controller = RevisionController::default();
        for verdict in ["yes", "no", "garbage"] {
            assert_eq!(
                controller.evaluate(verdict).unwrap(),
                controller.evaluate(verdict).unwrap()
            );
        }
    }

    #[test]
    fn lenient_normalizes_case_and_whitespace() {
        let controller = RevisionController::new(VerdictPolicy::Lenient, None);
        assert_eq!(controller.evaluate(" Yes\n").unwrap().route, Route::Terminate);
        assert_eq!(controller.evaluate("Y").unwrap().route, Route::Terminate);
        assert_eq!(controller.evaluate("nope").unwrap().route, Route::Redraft);
    }

    #[test]
    fn strict_rejects_unrecognised_answers() {
        let controller = RevisionController::new(VerdictPolicy::Strict, None);
        assert_eq!(controller.evaluate("No").unwrap().route, Route::Redraft);
        assert!(matches!(
            controller.evaluate("maybe"),
            Err(PipelineError::InvalidVerdict { .. })
        ));
    }

    #[test]
    fn apply_accept_clears_flag() {
        let mut session = awaiting();
        session.remake_flag = true;
        let phase = RevisionController::default().apply(&mut session, "yes").unwrap();
        assert_eq!(phase, SessionPhase::Accepted);
        assert_eq!(session.verdict, Verdict::Accepted);
        assert!(!session.remake_flag);
    }

    #[test]
    fn apply_reject_records_feedback_only_when_substantive() {
        let controller = RevisionController::default();

        let mut bare = awaiting();
        let before = bare.history.len();
        assert_eq!(controller.apply(&mut bare, "no").unwrap(), SessionPhase::Redrafting);
        assert_eq!(bare.history.len(), before);
        assert!(bare.remake_flag);

        let mut commented = awaiting();
        controller
            .apply(&mut commented, "導入事例の章を追加して")
            .unwrap();
        let last = commented.history.last().unwrap();
        assert!(last.content.contains("導入事例の章を追加して"));
    }

    #[test]
    fn apply_hits_draft_limit() {
        let controller = RevisionController::new(VerdictPolicy::Exact, Some(1));
        let mut session = awaiting();
        assert_eq!(controller.apply(&mut session, "no").unwrap(), SessionPhase::Exhausted);
        assert!(session.phase.is_terminal());
        assert!(matches!(
            controller.apply(&mut session, "yes"),
            Err(PipelineError::AlreadyFinished { .. })
        ));
    }

    #[test]
    fn exhausted_session_drops_remake_flag_and_feedback() {
        let controller = RevisionController::new(VerdictPolicy::Exact, Some(1));
        let mut session = awaiting();
        let history = session.history.len();

        let phase = controller.apply(&mut session, "見出しを増やして").unwrap();
        assert_eq!(phase, SessionPhase::Exhausted);
        assert_eq!(session.verdict, Verdict::Rejected);
        assert!(!session.remake_flag);
        assert_eq!(session.history.len(), history);
    }

    #[test]
    fn invalid_verdict_leaves_session_unchanged() {
        let controller = RevisionController::new(VerdictPolicy::Strict, None);
        let mut session = awaiting();
        let history = session.history.len();
        assert!(controller.apply(&mut session, "???").is_err());
        assert_eq!(session.phase, SessionPhase::AwaitingFeedback);
        assert_eq!(session.verdict, Verdict::Pending);
        assert_eq!(session.history.len(), history);
    }

    #[test]
    fn apply_requires_a_pending_draft() {
        let controller = RevisionController::default();
        let mut session = awaiting();
        controller.apply(&mut session, "no").unwrap();
        assert!(matches!(
            controller.apply(&mut session, "yes"),
            Err(PipelineError::InvalidTransition { .. })
        ));
    }
}

//! Outline pipeline.
//!
//! Each session flows through:
//! 1. Context providers: company, product, persona blocks (plus keyword
//!    volume when enabled)
//! 2. `OutlineDrafter::draft()`: one LLM call producing the outline
//! 3. Review: the session is saved and suspended until a verdict arrives
//! 4. `RevisionController::apply()`: accept and finish, or redraft

pub mod controller;
pub mod drafter;
pub mod prompts;
pub mod runner;
pub mod state;

pub use controller::{Decision, RevisionController, Route};
pub use drafter::{Draft, OutlineDrafter};
pub use runner::{OutlinePipeline, StepOutcome};
pub use state::{Session, SessionPhase, Verdict};

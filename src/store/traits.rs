//! `SessionStore` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::state::{Session, SessionPhase};

/// One row of the session listing.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: Uuid,
    pub target_keyword: String,
    pub phase: SessionPhase,
    pub revision_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// A single LLM call to record.
#[derive(Debug, Clone)]
pub struct LlmCallRecord<'a> {
    pub session_id: Option<Uuid>,
    pub model: &'a str,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: Decimal,
    pub purpose: Option<&'a str>,
}

/// Aggregated LLM usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmCostSummary {
    pub total_cost: Decimal,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub call_count: u64,
}

/// Backend-agnostic persistence for outline sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Insert or update a session. History rows already stored are kept;
    /// only new ones are appended.
    async fn save_session(&self, session: &Session) -> Result<(), DatabaseError>;

    /// Load a session with its full history.
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, DatabaseError>;

    /// Most recently updated sessions first.
    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, DatabaseError>;

    // ── LLM call tracking ───────────────────────────────────────────

    async fn record_llm_call(&self, record: &LlmCallRecord<'_>) -> Result<Uuid, DatabaseError>;

    /// Usage totals for one session.
    async fn get_session_cost(&self, session_id: Uuid) -> Result<LlmCostSummary, DatabaseError>;
}

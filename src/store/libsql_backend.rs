//! libSQL backend: async `SessionStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::ContextKeys;
use crate::error::DatabaseError;
use crate::llm::{ChatMessage, Role};
use crate::pipeline::state::{Session, SessionPhase, Verdict};
use crate::store::migrations;
use crate::store::traits::{LlmCallRecord, LlmCostSummary, SessionStore, SessionSummary};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn load_history(&self, id: Uuid) -> Result<Vec<ChatMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT role, content FROM session_messages WHERE session_id = ?1 ORDER BY seq",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_history: {e}")))?;

        let mut history = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("load_history: {e}")))?
        {
            let role: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("load_history role: {e}")))?;
            let content: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("load_history content: {e}")))?;
            let role = Role::from_str(&role).map_err(DatabaseError::Serialization)?;
            history.push(ChatMessage { role, content });
        }
        Ok(history)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(value: Option<&str>) -> libsql::Value {
    match value {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("bad uuid {s}: {e}")))
}

const SESSION_COLUMNS: &str = "id, site_id, company_id, product_id, persona_id, target_keyword, draft, verdict, remake_flag, revision_count, phase, created_at, updated_at";

/// Map a libsql Row to a Session without its history.
///
/// Column order matches SESSION_COLUMNS.
fn row_to_session(row: &libsql::Row) -> Result<Session, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("session row: {e}"));

    let id: String = row.get(0).map_err(get_err)?;
    let verdict: String = row.get(7).map_err(get_err)?;
    let phase: String = row.get(10).map_err(get_err)?;
    let created: String = row.get(11).map_err(get_err)?;
    let updated: String = row.get(12).map_err(get_err)?;

    Ok(Session {
        id: parse_uuid(&id)?,
        keys: ContextKeys {
            site_id: row.get(1).map_err(get_err)?,
            company_id: row.get(2).map_err(get_err)?,
            product_id: row.get(3).map_err(get_err)?,
            persona_id: row.get(4).map_err(get_err)?,
        },
        target_keyword: row.get(5).map_err(get_err)?,
        history: Vec::new(),
        draft: row.get::<String>(6).ok(),
        verdict: Verdict::from_str(&verdict).map_err(DatabaseError::Serialization)?,
        remake_flag: row.get::<i64>(8).map_err(get_err)? != 0,
        revision_count: row.get::<i64>(9).map_err(get_err)? as u32,
        phase: SessionPhase::from_str(&phase).map_err(DatabaseError::Serialization)?,
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn save_session(&self, session: &Session) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (id, site_id, company_id, product_id, persona_id, target_keyword, draft, verdict, remake_flag, revision_count, phase, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT (id) DO UPDATE SET
                draft = ?7, verdict = ?8, remake_flag = ?9, revision_count = ?10, phase = ?11, updated_at = ?13",
            params![
                session.id.to_string(),
                session.keys.site_id.clone(),
                session.keys.company_id,
                session.keys.product_id,
                session.keys.persona_id,
                session.target_keyword.clone(),
                opt_text(session.draft.as_deref()),
                session.verdict.to_string(),
                session.remake_flag as i64,
                session.revision_count as i64,
                session.phase.to_string(),
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("save_session: {e}")))?;

        // History is append-only: rows already stored are left as they are.
        for (seq, message) in session.history.iter().enumerate() {
            conn.execute(
                "INSERT OR IGNORE INTO session_messages (session_id, seq, role, content) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.id.to_string(),
                    seq as i64,
                    message.role.as_str(),
                    message.content.clone(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_session message: {e}")))?;
        }

        debug!(
            session_id = %session.id,
            phase = %session.phase,
            messages = session.history.len(),
            "Session saved"
        );
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?
        else {
            return Ok(None);
        };

        let mut session = row_to_session(&row)?;
        session.history = self.load_history(id).await?;
        Ok(Some(session))
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, target_keyword, phase, revision_count, updated_at FROM sessions ORDER BY updated_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_sessions: {e}")))?;

        let get_err = |e: libsql::Error| DatabaseError::Query(format!("list_sessions: {e}"));
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await.map_err(get_err)? {
            let id: String = row.get(0).map_err(get_err)?;
            let phase: String = row.get(2).map_err(get_err)?;
            let updated: String = row.get(4).map_err(get_err)?;
            sessions.push(SessionSummary {
                id: parse_uuid(&id)?,
                target_keyword: row.get(1).map_err(get_err)?,
                phase: SessionPhase::from_str(&phase).map_err(DatabaseError::Serialization)?,
                revision_count: row.get::<i64>(3).map_err(get_err)? as u32,
                updated_at: parse_datetime(&updated),
            });
        }
        Ok(sessions)
    }

    // ── LLM Call Tracking ────────────────────────────────────────────

    async fn record_llm_call(&self, record: &LlmCallRecord<'_>) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let session_id = record.session_id.map(|s| s.to_string());
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO llm_calls (id, session_id, model, input_tokens, output_tokens, cost, purpose, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    opt_text(session_id.as_deref()),
                    record.model,
                    record.input_tokens as i64,
                    record.output_tokens as i64,
                    record.cost.to_string(),
                    opt_text(record.purpose),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_llm_call: {e}")))?;

        Ok(id)
    }

    async fn get_session_cost(&self, session_id: Uuid) -> Result<LlmCostSummary, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT cost, input_tokens, output_tokens FROM llm_calls WHERE session_id = ?1",
                params![session_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session_cost: {e}")))?;

        // Summed in Rust so the decimal cost text never goes through f64.
        let get_err = |e: libsql::Error| DatabaseError::Query(format!("get_session_cost: {e}"));
        let mut summary = LlmCostSummary::default();
        while let Some(row) = rows.next().await.map_err(get_err)? {
            let cost: String = row.get(0).map_err(get_err)?;
            summary.total_cost += Decimal::from_str(&cost)
                .map_err(|e| DatabaseError::Serialization(format!("bad cost {cost}: {e}")))?;
            summary.total_input_tokens += row.get::<i64>(1).map_err(get_err)? as u64;
            summary.total_output_tokens += row.get::<i64>(2).map_err(get_err)? as u64;
            summary.call_count += 1;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn keys(company_id: i64) -> ContextKeys {
        ContextKeys {
            site_id: "c15000000001".into(),
            company_id,
            product_id: 1,
            persona_id: 1,
        }
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let db = test_db().await;
        let mut session = Session::new(keys(1), "btob デジタル マーケティング");
        session.push(ChatMessage::user("# 会社情報"));
        session.record_draft("# アウトライン".into()).unwrap();
        db.save_session(&session).await.unwrap();

        let loaded = db.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.keys, session.keys);
        assert_eq!(loaded.history, session.history);
        assert_eq!(loaded.draft.as_deref(), Some("# アウトライン"));
        assert_eq!(loaded.phase, SessionPhase::AwaitingFeedback);
        assert_eq!(loaded.revision_count, 1);
        assert_eq!(loaded.verdict, Verdict::Pending);
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let db = test_db().await;
        assert!(db.get_session(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_twice_does_not_duplicate_history() {
        let db = test_db().await;
        let mut session = Session::new(keys(1), "kw");
        db.save_session(&session).await.unwrap();
        db.save_session(&session).await.unwrap();

        session.push(ChatMessage::user("more"));
        db.save_session(&session).await.unwrap();

        let loaded = db.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.history.len(), 2);
        assert_eq!(loaded.history[1].content, "more");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let db = test_db().await;
        let mut a = Session::new(keys(1), "a");
        let mut b = Session::new(keys(2), "b");
        a.push(ChatMessage::user("only in a"));
        b.record_draft("draft b".into()).unwrap();
        db.save_session(&a).await.unwrap();
        db.save_session(&b).await.unwrap();

        let loaded_a = db.get_session(a.id).await.unwrap().unwrap();
        let loaded_b = db.get_session(b.id).await.unwrap().unwrap();
        assert!(loaded_a.history.iter().all(|m| m.content != "draft b"));
        assert!(loaded_b.history.iter().all(|m| m.content != "only in a"));
        assert_eq!(loaded_a.keys.company_id, 1);
        assert_eq!(loaded_b.keys.company_id, 2);
    }

    #[tokio::test]
    async fn list_is_most_recent_first() {
        let db = test_db().await;
        let mut older = Session::new(keys(1), "older");
        older.updated_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = Session::new(keys(1), "newer");
        db.save_session(&older).await.unwrap();
        db.save_session(&newer).await.unwrap();

        let listed = db.list_sessions(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].target_keyword, "newer");
        assert_eq!(listed[1].target_keyword, "older");

        assert_eq!(db.list_sessions(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn session_cost_sums_only_that_session() {
        let db = test_db().await;
        let session = Uuid::new_v4();
        let record = LlmCallRecord {
            session_id: Some(session),
            model: "gpt-4o-mini",
            input_tokens: 1000,
            output_tokens: 500,
            cost: dec!(0.00045),
            purpose: Some("outline"),
        };
        db.record_llm_call(&record).await.unwrap();
        db.record_llm_call(&record).await.unwrap();
        db.record_llm_call(&LlmCallRecord {
            session_id: None,
            ..record.clone()
        })
        .await
        .unwrap();

        let summary = db.get_session_cost(session).await.unwrap();
        assert_eq!(summary.call_count, 2);
        assert_eq!(summary.total_input_tokens, 2000);
        assert_eq!(summary.total_output_tokens, 1000);
        assert_eq!(summary.total_cost, dec!(0.0009));

        let empty = db.get_session_cost(Uuid::new_v4()).await.unwrap();
        assert_eq!(empty, LlmCostSummary::default());
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("outline.db");
        let session = Session::new(keys(1), "kw");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.save_session(&session).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let loaded = db.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.target_keyword, "kw");
    }
}

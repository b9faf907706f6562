//! Error types for the outline pipeline.

use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reading the CSV-backed context tables.
///
/// A lookup that simply matches no row is not an error; these cover
/// tables that cannot be read at all.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Failed to open table {path}: {reason}")]
    TableUnavailable { path: PathBuf, reason: String },

    #[error("Malformed row {row} in {path}: {reason}")]
    MalformedRow {
        path: PathBuf,
        row: usize,
        reason: String,
    },
}

/// A single error entry reported by the ads API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdsErrorDetail {
    pub message: String,
    pub field_path: Vec<String>,
}

/// Keyword planner errors.
#[derive(Debug, thiserror::Error)]
pub enum KeywordError {
    #[error("At least one of keywords or page URL is required, but neither was specified")]
    NoSeed,

    #[error("OAuth token exchange failed: {0}")]
    Auth(String),

    #[error("{}", format_api_failure(*status, request_id.as_deref(), errors))]
    Api {
        status: u16,
        request_id: Option<String>,
        errors: Vec<AdsErrorDetail>,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to write keyword table to {path}: {reason}")]
    Output { path: PathBuf, reason: String },
}

fn format_api_failure(status: u16, request_id: Option<&str>, errors: &[AdsErrorDetail]) -> String {
    let mut out = format!(
        "Request with ID \"{}\" failed with status {}",
        request_id.unwrap_or("unknown"),
        status
    );
    if !errors.is_empty() {
        out.push_str(" and includes the following errors:");
    }
    for error in errors {
        out.push_str(&format!("\n\tError with message \"{}\".", error.message));
        for field in &error.field_path {
            out.push_str(&format!("\n\t\tOn field: {}", field));
        }
    }
    out
}

/// Review gate errors.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Reviewer input closed before a verdict was given")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Session {id} not found")]
    SessionNotFound { id: Uuid },

    #[error("Session {id} is in phase {phase}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        phase: String,
        target: String,
    },

    #[error("Session {id} already finished ({phase})")]
    AlreadyFinished { id: Uuid, phase: String },

    #[error("Unrecognised verdict {verdict:?}: answer yes or no")]
    InvalidVerdict { verdict: String },

    #[error("Session {id} needs a new draft but no LLM provider is configured")]
    DrafterUnavailable { id: Uuid },

    #[error("Context lookup failed: {0}")]
    Context(#[from] ContextError),

    #[error("Keyword research failed: {0}")]
    Keyword(#[from] KeywordError),

    #[error("Draft failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Store failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Review failed: {0}")]
    Review(#[from] ReviewError),
}

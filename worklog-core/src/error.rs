//! Error types for worklog-core

use std::path::PathBuf;
use thiserror::Error;

use crate::types::PlanStatus;

/// Main error type for the worklog-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Search query was empty or whitespace-only
    #[error("search query is empty; provide at least one term")]
    EmptyQuery,

    /// Search scope outside the enumerated set
    #[error("invalid search scope '{0}'; choose one of: all, plans, sessions, learned")]
    InvalidScope(String),

    /// Status value outside the enumerated set for its document kind
    #[error("invalid status '{value}'; choose one of: {expected}")]
    InvalidStatus {
        value: String,
        expected: &'static str,
    },

    /// Disallowed plan status transition
    #[error("invalid status transition {from} -> {to}")]
    InvalidStatusTransition { from: PlanStatus, to: PlanStatus },

    /// A session document already exists for this date
    #[error("session for {date} already exists at {}; pass force to add a disambiguated entry", .path.display())]
    DuplicateSession { date: String, path: PathBuf },

    /// A plan document already exists under this slug
    #[error("plan '{0}' already exists; pick a different title")]
    DuplicatePlan(String),

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Plan not found
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    /// Body anchor for insert_after/insert_before not found
    #[error("section anchor not found in document body: '{anchor}'")]
    SectionNotFound { anchor: String },

    /// Workspace root missing or lacking the expected layout
    #[error("workspace root not found or missing sessions/ and plans/: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Parse failure on an existing document
    #[error("malformed document {}: {message}", .path.display())]
    MalformedDocument { path: PathBuf, message: String },

    /// Embedded database written by a newer schema than this build supports
    #[error("index database schema version {found} is newer than supported version {supported}; upgrade worklog or delete the .worklog/index.db file and rebuild")]
    SchemaVersionMismatch { found: i32, supported: i32 },

    /// Bad input shape (empty title, unparseable date, ...)
    #[error("validation failed for {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for worklog-core
pub type Result<T> = std::result::Result<T, Error>;

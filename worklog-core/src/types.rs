//! Core domain types for worklog
//!
//! Documents on disk are the source of truth; everything here is the typed
//! view of those documents plus the filter/result shapes used by the
//! storage adapters.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | A dated work-log entry, one document per (date, optional suffix) |
//! | **Plan** | A longer-lived unit of work, one document per title slug |
//! | **Plan Pointer** | A per-author record naming that author's current plan |
//! | **Learned note** | A free-form note under `learned/`, visible to search only |
//! | **Team Index** | The generated `plans/INDEX.md` summarizing all pointers |

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================
// Session
// ============================================

/// Status of a session entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Work is ongoing
    InProgress,
    /// Work finished
    Complete,
    /// Work stopped without finishing
    Abandoned,
}

impl SessionStatus {
    pub const EXPECTED: &'static str = "in-progress, complete, abandoned";

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in-progress",
            SessionStatus::Complete => "complete",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-progress" => Ok(SessionStatus::InProgress),
            "complete" => Ok(SessionStatus::Complete),
            "abandoned" => Ok(SessionStatus::Abandoned),
            _ => Err(format!("unknown session status: {}", s)),
        }
    }
}

/// A dated work-log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Calendar date of the session
    pub date: NaiveDate,
    /// Disambiguator when several sessions share a date ("2", "3", ...)
    pub suffix: Option<String>,
    /// Short topic tags, no duplicates
    pub topics: Vec<String>,
    /// Referenced plan id, if any
    pub plan: Option<String>,
    /// Ordered work phases, no duplicates
    pub phases: Vec<String>,
    /// Files touched during the session
    pub files: Vec<String>,
    /// Duration in minutes, if recorded
    pub duration_minutes: Option<i64>,
    /// Current status
    pub status: SessionStatus,
    /// Free-form body text
    pub body: String,
    /// Document path on disk
    pub path: PathBuf,
    /// Unknown frontmatter keys, preserved verbatim on round-trip
    pub extra: toml::Table,
}

impl SessionRecord {
    /// Timestamp used for search recency tie-breaks
    pub fn recency(&self) -> DateTime<Utc> {
        self.date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Searchable title: the file stem (date plus suffix)
    pub fn title(&self) -> String {
        match &self.suffix {
            Some(s) => format!("{}-{}", self.date, s),
            None => self.date.to_string(),
        }
    }
}

// ============================================
// Plan
// ============================================

/// Lifecycle status of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanStatus {
    Planned,
    Active,
    Paused,
    Complete,
    Cancelled,
}

impl PlanStatus {
    pub const EXPECTED: &'static str = "PLANNED, ACTIVE, PAUSED, COMPLETE, CANCELLED";

    pub const ALL: [PlanStatus; 5] = [
        PlanStatus::Planned,
        PlanStatus::Active,
        PlanStatus::Paused,
        PlanStatus::Complete,
        PlanStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Planned => "PLANNED",
            PlanStatus::Active => "ACTIVE",
            PlanStatus::Paused => "PAUSED",
            PlanStatus::Complete => "COMPLETE",
            PlanStatus::Cancelled => "CANCELLED",
        }
    }

    /// COMPLETE and CANCELLED are terminal; nothing transitions out of them
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Complete | PlanStatus::Cancelled)
    }

    /// The allowed transition table:
    /// PLANNED -> ACTIVE | CANCELLED
    /// ACTIVE  -> PAUSED | COMPLETE | CANCELLED
    /// PAUSED  -> ACTIVE | CANCELLED
    pub fn can_transition_to(&self, to: PlanStatus) -> bool {
        use PlanStatus::*;
        matches!(
            (self, to),
            (Planned, Active)
                | (Planned, Cancelled)
                | (Active, Paused)
                | (Active, Complete)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Cancelled)
        )
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLANNED" => Ok(PlanStatus::Planned),
            "ACTIVE" => Ok(PlanStatus::Active),
            "PAUSED" => Ok(PlanStatus::Paused),
            "COMPLETE" => Ok(PlanStatus::Complete),
            "CANCELLED" => Ok(PlanStatus::Cancelled),
            _ => Err(format!("unknown plan status: {}", s)),
        }
    }
}

/// One timestamped note in a plan's progress log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// When the note was appended
    pub at: DateTime<Utc>,
    /// The note itself
    pub note: String,
}

/// A longer-lived unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    /// Stable slug derived from the title
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Lifecycle status
    pub status: PlanStatus,
    /// Who owns the plan
    pub author: String,
    /// Short topic tags
    pub topics: Vec<String>,
    /// When the plan was created
    pub created_at: DateTime<Utc>,
    /// Set on the first transition into ACTIVE, never cleared
    pub started_at: Option<DateTime<Utc>>,
    /// Set on transition into COMPLETE or CANCELLED
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered timestamped notes
    pub progress: Vec<ProgressEntry>,
    /// Free-form body text
    pub body: String,
    /// Document path on disk
    pub path: PathBuf,
    /// Unknown frontmatter keys, preserved verbatim on round-trip
    pub extra: toml::Table,
}

impl PlanRecord {
    /// Timestamp used for search recency tie-breaks: last progress note,
    /// falling back to creation time
    pub fn recency(&self) -> DateTime<Utc> {
        self.progress
            .last()
            .map(|p| p.at)
            .unwrap_or(self.created_at)
    }
}

/// A per-author pointer at that author's current plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPointer {
    /// Author this pointer belongs to (one pointer per author)
    pub author: String,
    /// Referenced plan id; None means "no active plan"
    pub plan: Option<String>,
    /// Status snapshot of the referenced plan at last write
    pub status: Option<PlanStatus>,
    /// When the pointer was last rewritten
    pub last_updated: DateTime<Utc>,
    /// Document path on disk
    pub path: PathBuf,
}

// ============================================
// Learned notes
// ============================================

/// A free-form note under `learned/`; participates in search only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedRecord {
    /// Title from frontmatter, falling back to the file stem
    pub title: String,
    /// Topic tags, if any
    pub topics: Vec<String>,
    /// Optional last-updated date from frontmatter
    pub updated: Option<NaiveDate>,
    /// Free-form body text
    pub body: String,
    /// Document path on disk
    pub path: PathBuf,
}

impl LearnedRecord {
    /// Timestamp used for search recency tie-breaks
    pub fn recency(&self) -> DateTime<Utc> {
        self.updated
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
    }
}

// ============================================
// Filters
// ============================================

/// Filters for plan queries; absent fields impose no constraint
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    /// Exact status match
    pub status: Option<PlanStatus>,
    /// Exact author match
    pub author: Option<String>,
    /// Case-insensitive substring over the topics list
    pub topic_contains: Option<String>,
}

impl PlanFilter {
    pub fn matches(&self, plan: &PlanRecord) -> bool {
        if let Some(status) = self.status {
            if plan.status != status {
                return false;
            }
        }
        if let Some(author) = &self.author {
            if &plan.author != author {
                return false;
            }
        }
        if let Some(needle) = &self.topic_contains {
            if !topic_contains(&plan.topics, needle) {
                return false;
            }
        }
        true
    }
}

/// Filters for session queries; absent fields impose no constraint
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Lookback window in days; defaults to 30 when absent
    pub since_days: Option<i64>,
    /// Case-insensitive substring over the topics list
    pub topic_contains: Option<String>,
    /// Exact plan reference match
    pub plan: Option<String>,
    /// Reference date for the lookback window; defaults to today
    pub as_of: Option<NaiveDate>,
}

/// Default lookback window for session queries
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

impl SessionFilter {
    pub fn matches(&self, session: &SessionRecord) -> bool {
        let as_of = self.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let since = self.since_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
        // "last N days" counts back from and includes as_of
        if (as_of - session.date).num_days() >= since || session.date > as_of {
            return false;
        }
        if let Some(needle) = &self.topic_contains {
            if !topic_contains(&session.topics, needle) {
                return false;
            }
        }
        if let Some(plan) = &self.plan {
            if session.plan.as_deref() != Some(plan.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Case-insensitive substring test over a topic list
fn topic_contains(topics: &[String], needle: &str) -> bool {
    let needle = needle.to_lowercase();
    topics.iter().any(|t| t.to_lowercase().contains(&needle))
}

// ============================================
// Query and search results
// ============================================

/// Result of a filtered plan query
#[derive(Debug, Clone, Serialize)]
pub struct PlanQuery {
    pub count: usize,
    pub plans: Vec<PlanRecord>,
}

/// Result of a filtered session query, sorted by date descending
#[derive(Debug, Clone, Serialize)]
pub struct SessionQuery {
    pub count: usize,
    pub sessions: Vec<SessionRecord>,
}

/// Which document kinds a full-text search scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    All,
    Plans,
    Sessions,
    Learned,
}

impl SearchScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchScope::All => "all",
            SearchScope::Plans => "plans",
            SearchScope::Sessions => "sessions",
            SearchScope::Learned => "learned",
        }
    }
}

impl std::fmt::Display for SearchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SearchScope {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SearchScope::All),
            "plans" => Ok(SearchScope::Plans),
            "sessions" => Ok(SearchScope::Sessions),
            "learned" => Ok(SearchScope::Learned),
            other => Err(crate::error::Error::InvalidScope(other.to_string())),
        }
    }
}

/// Kind of document a search match came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Plan,
    Session,
    Learned,
}

impl DocKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::Plan => "plan",
            DocKind::Session => "session",
            DocKind::Learned => "learned",
        }
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One full-text search match
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    /// Kind of document matched
    #[serde(rename = "type")]
    pub kind: DocKind,
    /// Document path
    pub file: PathBuf,
    /// Short excerpt around the first match
    pub context: String,
    /// Relevance score; non-decreasing in query-term occurrence count
    pub relevance: f64,
}

/// Full-text search results, sorted by relevance descending
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub scope: SearchScope,
    pub count: usize,
    pub matches: Vec<SearchMatch>,
}

/// Outcome of an index rebuild; parse failures are collected per file
/// rather than aborting the rebuild
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildReport {
    /// Documents successfully indexed
    pub documents_indexed: usize,
    /// (path, message) for each document that failed to parse
    pub errors: Vec<(PathBuf, String)>,
}

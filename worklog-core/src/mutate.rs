//! Mutation engine: document writes with read-your-writes consistency
//!
//! Every mutation follows the same shape: build or edit the typed record,
//! render it, write the document atomically, then fold the changed file into
//! the open storage adapter before returning. A query issued through the
//! same adapter immediately after a mutation sees that mutation.

use crate::document::{slugify, Document};
use crate::error::{Error, Result};
use crate::store::StorageAdapter;
use crate::types::*;
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;

// ============================================
// Inputs
// ============================================

/// Input for creating a session entry
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    /// Session date; defaults to today
    pub date: Option<NaiveDate>,
    pub topics: Vec<String>,
    pub plan: Option<String>,
    pub phases: Vec<String>,
    pub files: Vec<String>,
    pub duration_minutes: Option<i64>,
    /// Defaults to in-progress
    pub status: Option<SessionStatus>,
    pub body: String,
    /// Allow a second entry on an already-used date, under a `-2`, `-3`...
    /// suffix
    pub force: bool,
}

/// Edits applied to an existing session; absent fields leave the document
/// untouched
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub set_status: Option<SessionStatus>,
    /// Topics to add; ones already present are skipped
    pub add_topics: Vec<String>,
    /// Files to add; ones already present are skipped
    pub add_files: Vec<String>,
    pub set_duration_minutes: Option<i64>,
    pub edits: Vec<BodyEdit>,
}

/// Input for creating a plan
#[derive(Debug, Clone, Default)]
pub struct NewPlan {
    pub title: String,
    pub author: String,
    pub topics: Vec<String>,
    pub body: String,
}

/// Outcome of a plan creation
#[derive(Debug, Clone)]
pub struct PlanCreated {
    pub plan_id: String,
    pub path: PathBuf,
    pub pointer_path: PathBuf,
}

/// Edits applied to an existing plan; absent fields leave the document
/// untouched
#[derive(Debug, Clone, Default)]
pub struct PlanUpdate {
    /// Requested status transition, checked against the transition table
    pub set_status: Option<PlanStatus>,
    pub add_topics: Vec<String>,
    /// Note to append to the progress log, timestamped now
    pub append_progress: Option<String>,
    pub edits: Vec<BodyEdit>,
}

/// One positional edit to a document body
#[derive(Debug, Clone)]
pub enum BodyEdit {
    Append(String),
    Prepend(String),
    /// Insert after the first line matching `anchor`
    InsertAfter { anchor: String, text: String },
    /// Insert before the first line matching `anchor`
    InsertBefore { anchor: String, text: String },
}

// ============================================
// Status parsing for untyped front-ends
// ============================================

pub fn parse_session_status(value: &str) -> Result<SessionStatus> {
    value.parse().map_err(|_| Error::InvalidStatus {
        value: value.to_string(),
        expected: SessionStatus::EXPECTED,
    })
}

pub fn parse_plan_status(value: &str) -> Result<PlanStatus> {
    value.parse().map_err(|_| Error::InvalidStatus {
        value: value.to_string(),
        expected: PlanStatus::EXPECTED,
    })
}

// ============================================
// Sessions
// ============================================

/// Create a session entry.
///
/// One entry per date unless `force` is set, in which case the new entry
/// lands under the first free `-2`, `-3`... suffix.
pub fn create_session(
    adapter: &mut dyn StorageAdapter,
    input: NewSession,
) -> Result<SessionRecord> {
    let ws = adapter.workspace().clone();
    let date = input.date.unwrap_or_else(|| Utc::now().date_naive());

    let primary = ws.session_path(date, None);
    let path = if !primary.exists() {
        primary
    } else if !input.force {
        return Err(Error::DuplicateSession {
            date: date.to_string(),
            path: primary,
        });
    } else {
        next_free_session_path(&ws, date)?
    };

    let suffix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(crate::document::session_stem_parts)
        .and_then(|(_, s)| s);

    let session = SessionRecord {
        date,
        suffix,
        topics: dedup_preserving(input.topics),
        plan: input.plan,
        phases: dedup_preserving(input.phases),
        files: dedup_preserving(input.files),
        duration_minutes: input.duration_minutes,
        status: input.status.unwrap_or(SessionStatus::InProgress),
        body: input.body,
        path: path.clone(),
        extra: toml::Table::new(),
    };

    ws.write_atomic(&path, &session.to_document().render()?)?;
    adapter.refresh_document(&path)?;

    tracing::info!(path = %path.display(), "Created session entry");
    Ok(session)
}

/// Apply edits to an existing session, identified by its file stem
/// (`2026-03-01` or `2026-03-01-2`)
pub fn update_session(
    adapter: &mut dyn StorageAdapter,
    id: &str,
    update: SessionUpdate,
) -> Result<SessionRecord> {
    let ws = adapter.workspace().clone();
    let path = ws.sessions_dir().join(format!("{}.md", id));
    if !path.is_file() {
        return Err(Error::SessionNotFound(id.to_string()));
    }

    let doc = Document::load(&path)?;
    let mut session = SessionRecord::from_document(&path, doc)?;

    if let Some(status) = update.set_status {
        session.status = status;
    }
    for topic in update.add_topics {
        if !session.topics.contains(&topic) {
            session.topics.push(topic);
        }
    }
    for file in update.add_files {
        if !session.files.contains(&file) {
            session.files.push(file);
        }
    }
    if let Some(minutes) = update.set_duration_minutes {
        session.duration_minutes = Some(minutes);
    }
    for edit in &update.edits {
        session.body = apply_edit(&session.body, edit)?;
    }

    ws.write_atomic(&path, &session.to_document().render()?)?;
    adapter.refresh_document(&path)?;

    tracing::info!(path = %path.display(), "Updated session entry");
    Ok(session)
}

/// Drop repeated entries, keeping first-occurrence order
fn dedup_preserving(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// First unused `-N` path for a date, starting at `-2`
fn next_free_session_path(ws: &crate::workspace::Workspace, date: NaiveDate) -> Result<PathBuf> {
    for n in 2.. {
        let candidate = ws.session_path(date, Some(&n.to_string()));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    unreachable!()
}

// ============================================
// Plans
// ============================================

/// Create a plan and point its author's plan pointer at it.
///
/// The plan id is the slug of the title and doubles as the filename; a
/// colliding slug is rejected rather than silently overwritten.
pub fn create_plan(adapter: &mut dyn StorageAdapter, input: NewPlan) -> Result<PlanCreated> {
    let ws = adapter.workspace().clone();

    let id = slugify(&input.title);
    if id.is_empty() {
        return Err(Error::Validation {
            field: "title",
            message: format!("'{}' yields an empty slug", input.title),
        });
    }
    if input.author.trim().is_empty() {
        return Err(Error::Validation {
            field: "author",
            message: "author must not be empty".to_string(),
        });
    }

    let path = ws.plan_path(&id);
    if path.exists() {
        return Err(Error::DuplicatePlan(id));
    }

    let now = Utc::now();
    let plan = PlanRecord {
        id: id.clone(),
        title: input.title,
        status: PlanStatus::Planned,
        author: input.author.clone(),
        topics: dedup_preserving(input.topics),
        created_at: now,
        started_at: None,
        completed_at: None,
        progress: Vec::new(),
        body: input.body,
        path: path.clone(),
        extra: toml::Table::new(),
    };

    ws.write_atomic(&path, &plan.to_document().render()?)?;
    adapter.refresh_document(&path)?;

    let pointer_path = write_pointer(adapter, &input.author, Some(&plan))?;

    tracing::info!(plan = %id, author = %input.author, "Created plan");
    Ok(PlanCreated {
        plan_id: id,
        path,
        pointer_path,
    })
}

/// Apply edits to an existing plan.
///
/// Status changes are validated against the transition table; the first
/// transition into ACTIVE stamps `started_at`, and a transition into a
/// terminal status stamps `completed_at`. When the author's pointer
/// references this plan, its status snapshot is refreshed too.
pub fn update_plan(
    adapter: &mut dyn StorageAdapter,
    id: &str,
    update: PlanUpdate,
) -> Result<PlanRecord> {
    let ws = adapter.workspace().clone();
    let path = ws.plan_path(id);
    if !path.is_file() {
        return Err(Error::PlanNotFound(id.to_string()));
    }

    let doc = Document::load(&path)?;
    let mut plan = PlanRecord::from_document(&path, doc)?;
    let now = Utc::now();

    if let Some(to) = update.set_status {
        if !plan.status.can_transition_to(to) {
            return Err(Error::InvalidStatusTransition {
                from: plan.status,
                to,
            });
        }
        if to == PlanStatus::Active && plan.started_at.is_none() {
            plan.started_at = Some(now);
        }
        if to.is_terminal() {
            plan.completed_at = Some(now);
        }
        plan.status = to;
    }
    for topic in update.add_topics {
        if !plan.topics.contains(&topic) {
            plan.topics.push(topic);
        }
    }
    if let Some(note) = update.append_progress {
        plan.progress.push(ProgressEntry { at: now, note });
    }
    for edit in &update.edits {
        plan.body = apply_edit(&plan.body, edit)?;
    }

    ws.write_atomic(&path, &plan.to_document().render()?)?;
    adapter.refresh_document(&path)?;

    // keep the author's pointer snapshot current
    let pointer_path = ws.pointer_path(&plan.author);
    if pointer_path.is_file() {
        let pointer = PlanPointer::from_document(&pointer_path, Document::load(&pointer_path)?)?;
        if pointer.plan.as_deref() == Some(id) {
            write_pointer(adapter, &plan.author, Some(&plan))?;
        }
    }

    tracing::info!(plan = %id, "Updated plan");
    Ok(plan)
}

/// Point an author's plan pointer at a plan, or at nothing.
///
/// The referenced plan must exist; `None` records "no active plan".
pub fn set_current_plan(
    adapter: &mut dyn StorageAdapter,
    author: &str,
    plan_id: Option<&str>,
) -> Result<PlanPointer> {
    let ws = adapter.workspace().clone();

    let plan = match plan_id {
        None => None,
        Some(id) => {
            let path = ws.plan_path(id);
            if !path.is_file() {
                return Err(Error::PlanNotFound(id.to_string()));
            }
            Some(PlanRecord::from_document(&path, Document::load(&path)?)?)
        }
    };

    let pointer_path = write_pointer(adapter, author, plan.as_ref())?;
    let pointer = PlanPointer::from_document(&pointer_path, Document::load(&pointer_path)?)?;
    Ok(pointer)
}

/// Write the pointer document for an author and fold it into the index
fn write_pointer(
    adapter: &mut dyn StorageAdapter,
    author: &str,
    plan: Option<&PlanRecord>,
) -> Result<PathBuf> {
    let ws = adapter.workspace().clone();
    let pointer_path = ws.pointer_path(author);

    let pointer = PlanPointer {
        author: author.to_string(),
        plan: plan.map(|p| p.id.clone()),
        status: plan.map(|p| p.status),
        last_updated: Utc::now(),
        path: pointer_path.clone(),
    };

    ws.write_atomic(&pointer_path, &pointer.to_document().render()?)?;
    adapter.refresh_document(&pointer_path)?;
    Ok(pointer_path)
}

// ============================================
// Body edits
// ============================================

/// Apply one positional edit. Anchors match a whole line after trimming.
fn apply_edit(body: &str, edit: &BodyEdit) -> Result<String> {
    match edit {
        BodyEdit::Append(text) => {
            let mut out = body.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(text);
            out.push('\n');
            Ok(out)
        }
        BodyEdit::Prepend(text) => Ok(format!("{}\n{}", text, body)),
        BodyEdit::InsertAfter { anchor, text } => insert_at_anchor(body, anchor, text, true),
        BodyEdit::InsertBefore { anchor, text } => insert_at_anchor(body, anchor, text, false),
    }
}

fn insert_at_anchor(body: &str, anchor: &str, text: &str, after: bool) -> Result<String> {
    let anchor_trimmed = anchor.trim();
    let mut lines: Vec<&str> = body.lines().collect();
    let pos = lines
        .iter()
        .position(|line| line.trim() == anchor_trimmed)
        .ok_or_else(|| Error::SectionNotFound {
            anchor: anchor.to_string(),
        })?;

    let at = if after { pos + 1 } else { pos };
    lines.insert(at, text);

    let mut out = lines.join("\n");
    if body.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IndexAdapter;
    use crate::workspace::Workspace;
    use tempfile::TempDir;

    fn open_adapter() -> (TempDir, IndexAdapter) {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::create(dir.path()).unwrap();
        let adapter = IndexAdapter::open(ws).unwrap();
        (dir, adapter)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_create_session_then_duplicate() {
        let (_dir, mut adapter) = open_adapter();
        let input = NewSession {
            date: Some(date("2026-03-01")),
            topics: vec!["auth".into()],
            body: "worked on login\n".into(),
            ..Default::default()
        };

        let session = create_session(&mut adapter, input.clone()).unwrap();
        assert!(session.path.is_file());
        assert!(session.suffix.is_none());

        let err = create_session(&mut adapter, input.clone()).unwrap_err();
        assert!(matches!(err, Error::DuplicateSession { .. }));

        let forced = create_session(
            &mut adapter,
            NewSession {
                force: true,
                ..input
            },
        )
        .unwrap();
        assert_eq!(forced.suffix.as_deref(), Some("2"));
        assert!(forced.path.ends_with("sessions/2026-03-01-2.md"));
    }

    #[test]
    fn test_create_session_dedupes_lists() {
        let (_dir, mut adapter) = open_adapter();
        let session = create_session(
            &mut adapter,
            NewSession {
                date: Some(date("2026-03-01")),
                topics: vec!["auth".into(), "auth".into(), "storage".into()],
                phases: vec!["spike".into(), "spike".into()],
                files: vec!["src/auth.rs".into(), "src/auth.rs".into()],
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(session.topics, vec!["auth", "storage"]);
        assert_eq!(session.phases, vec!["spike"]);
        assert_eq!(session.files, vec!["src/auth.rs"]);

        // the deduped lists are what lands on disk
        let reread = SessionRecord::from_document(
            &session.path,
            Document::load(&session.path).unwrap(),
        )
        .unwrap();
        assert_eq!(reread.topics, vec!["auth", "storage"]);
    }

    #[test]
    fn test_create_session_is_read_your_writes() {
        let (_dir, mut adapter) = open_adapter();
        create_session(
            &mut adapter,
            NewSession {
                date: Some(date("2026-03-01")),
                topics: vec!["caching".into()],
                body: "cache work\n".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let filter = SessionFilter {
            topic_contains: Some("caching".into()),
            as_of: Some(date("2026-03-01")),
            ..Default::default()
        };
        assert_eq!(adapter.query_sessions(&filter).unwrap().count, 1);
    }

    #[test]
    fn test_update_session_dedupes_and_edits_body() {
        let (_dir, mut adapter) = open_adapter();
        create_session(
            &mut adapter,
            NewSession {
                date: Some(date("2026-03-01")),
                topics: vec!["auth".into()],
                body: "## Log\nstarted\n".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let updated = update_session(
            &mut adapter,
            "2026-03-01",
            SessionUpdate {
                set_status: Some(SessionStatus::Complete),
                add_topics: vec!["auth".into(), "storage".into()],
                edits: vec![BodyEdit::InsertAfter {
                    anchor: "## Log".into(),
                    text: "wired up the adapter".into(),
                }],
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(updated.status, SessionStatus::Complete);
        assert_eq!(updated.topics, vec!["auth", "storage"]);
        assert!(updated.body.starts_with("## Log\nwired up the adapter\n"));

        let err = update_session(
            &mut adapter,
            "2026-03-01",
            SessionUpdate {
                edits: vec![BodyEdit::InsertAfter {
                    anchor: "## Missing".into(),
                    text: "x".into(),
                }],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::SectionNotFound { .. }));
    }

    #[test]
    fn test_update_missing_session() {
        let (_dir, mut adapter) = open_adapter();
        let err = update_session(&mut adapter, "2026-01-01", SessionUpdate::default()).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn test_create_plan_writes_pointer() {
        let (_dir, mut adapter) = open_adapter();
        let created = create_plan(
            &mut adapter,
            NewPlan {
                title: "API Redesign".into(),
                author: "alice".into(),
                topics: vec!["api".into()],
                body: "## Goal\nredesign\n".into(),
            },
        )
        .unwrap();

        assert_eq!(created.plan_id, "api-redesign");
        assert!(created.path.is_file());
        assert!(created.pointer_path.ends_with("plans/current/alice.md"));

        let pointer =
            PlanPointer::from_document(&created.pointer_path, Document::load(&created.pointer_path).unwrap())
                .unwrap();
        assert_eq!(pointer.plan.as_deref(), Some("api-redesign"));
        assert_eq!(pointer.status, Some(PlanStatus::Planned));

        let err = create_plan(
            &mut adapter,
            NewPlan {
                title: "API redesign".into(),
                author: "bob".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicatePlan(_)));
    }

    #[test]
    fn test_plan_status_machine() {
        let (_dir, mut adapter) = open_adapter();
        create_plan(
            &mut adapter,
            NewPlan {
                title: "API Redesign".into(),
                author: "alice".into(),
                ..Default::default()
            },
        )
        .unwrap();

        // PLANNED -> COMPLETE is not allowed
        let err = update_plan(
            &mut adapter,
            "api-redesign",
            PlanUpdate {
                set_status: Some(PlanStatus::Complete),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidStatusTransition { .. }));

        let active = update_plan(
            &mut adapter,
            "api-redesign",
            PlanUpdate {
                set_status: Some(PlanStatus::Active),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(active.started_at.is_some());
        assert!(active.completed_at.is_none());
        let started = active.started_at;

        // pausing and resuming does not restamp started_at
        update_plan(
            &mut adapter,
            "api-redesign",
            PlanUpdate {
                set_status: Some(PlanStatus::Paused),
                ..Default::default()
            },
        )
        .unwrap();
        let resumed = update_plan(
            &mut adapter,
            "api-redesign",
            PlanUpdate {
                set_status: Some(PlanStatus::Active),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(resumed.started_at, started);

        let done = update_plan(
            &mut adapter,
            "api-redesign",
            PlanUpdate {
                set_status: Some(PlanStatus::Complete),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(done.completed_at.is_some());

        // terminal states reject further transitions
        let err = update_plan(
            &mut adapter,
            "api-redesign",
            PlanUpdate {
                set_status: Some(PlanStatus::Active),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidStatusTransition { .. }));
    }

    #[test]
    fn test_update_plan_refreshes_pointer_snapshot() {
        let (_dir, mut adapter) = open_adapter();
        create_plan(
            &mut adapter,
            NewPlan {
                title: "API Redesign".into(),
                author: "alice".into(),
                ..Default::default()
            },
        )
        .unwrap();

        update_plan(
            &mut adapter,
            "api-redesign",
            PlanUpdate {
                set_status: Some(PlanStatus::Active),
                append_progress: Some("kickoff".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let pointer_path = adapter.workspace().pointer_path("alice");
        let pointer =
            PlanPointer::from_document(&pointer_path, Document::load(&pointer_path).unwrap())
                .unwrap();
        assert_eq!(pointer.status, Some(PlanStatus::Active));
    }

    #[test]
    fn test_set_current_plan() {
        let (_dir, mut adapter) = open_adapter();
        create_plan(
            &mut adapter,
            NewPlan {
                title: "API Redesign".into(),
                author: "alice".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let err = set_current_plan(&mut adapter, "bob", Some("missing")).unwrap_err();
        assert!(matches!(err, Error::PlanNotFound(_)));

        let pointer = set_current_plan(&mut adapter, "bob", Some("api-redesign")).unwrap();
        assert_eq!(pointer.plan.as_deref(), Some("api-redesign"));

        let cleared = set_current_plan(&mut adapter, "bob", None).unwrap();
        assert!(cleared.plan.is_none());
    }

    #[test]
    fn test_parse_status_errors() {
        assert!(matches!(
            parse_session_status("done"),
            Err(Error::InvalidStatus { .. })
        ));
        assert!(matches!(
            parse_plan_status("active"),
            Err(Error::InvalidStatus { .. })
        ));
        assert_eq!(parse_plan_status("ACTIVE").unwrap(), PlanStatus::Active);
    }
}

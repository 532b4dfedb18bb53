//! Document tree walker
//!
//! Walks the workspace layout and parses every document into typed records.
//! A malformed document is recorded per-file and never aborts the walk, so
//! one bad file cannot hide the rest of the index.

use crate::document::Document;
use crate::error::Result;
use crate::types::*;
use crate::workspace::{Workspace, TEAM_INDEX_FILE};
use std::path::PathBuf;

/// Everything a single walk of the document tree produced
#[derive(Debug, Default)]
pub struct Snapshot {
    pub sessions: Vec<SessionRecord>,
    pub plans: Vec<PlanRecord>,
    pub learned: Vec<LearnedRecord>,
    pub pointers: Vec<PlanPointer>,
    /// (path, message) per document that failed to parse
    pub errors: Vec<(PathBuf, String)>,
}

impl Snapshot {
    pub fn document_count(&self) -> usize {
        self.sessions.len() + self.plans.len() + self.learned.len() + self.pointers.len()
    }
}

/// Parse every document under the workspace into a snapshot.
///
/// Traversal is alphabetical per directory (the glob crate guarantees
/// sorted iteration), which keeps rebuilds deterministic.
pub fn scan(ws: &Workspace) -> Result<Snapshot> {
    let mut snapshot = Snapshot::default();

    for path in markdown_files(&ws.sessions_dir())? {
        match Document::load(&path).and_then(|doc| SessionRecord::from_document(&path, doc)) {
            Ok(session) => snapshot.sessions.push(session),
            Err(e) => snapshot.errors.push((path, e.to_string())),
        }
    }

    for path in markdown_files(&ws.plans_dir())? {
        // The generated team index is an artifact, not a plan.
        if path.file_name().and_then(|n| n.to_str()) == Some(TEAM_INDEX_FILE) {
            continue;
        }
        match Document::load(&path).and_then(|doc| PlanRecord::from_document(&path, doc)) {
            Ok(plan) => snapshot.plans.push(plan),
            Err(e) => snapshot.errors.push((path, e.to_string())),
        }
    }

    for path in markdown_files(&ws.pointers_dir())? {
        match Document::load(&path).and_then(|doc| PlanPointer::from_document(&path, doc)) {
            Ok(pointer) => snapshot.pointers.push(pointer),
            Err(e) => snapshot.errors.push((path, e.to_string())),
        }
    }

    for path in markdown_files(&ws.learned_dir())? {
        match Document::load(&path).and_then(|doc| LearnedRecord::from_document(&path, doc)) {
            Ok(note) => snapshot.learned.push(note),
            Err(e) => snapshot.errors.push((path, e.to_string())),
        }
    }

    tracing::debug!(
        sessions = snapshot.sessions.len(),
        plans = snapshot.plans.len(),
        learned = snapshot.learned.len(),
        pointers = snapshot.pointers.len(),
        errors = snapshot.errors.len(),
        "Scanned document tree"
    );

    Ok(snapshot)
}

/// Markdown files directly under `dir`, alphabetically. Missing directories
/// yield an empty list.
pub(crate) fn markdown_files(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = format!("{}/*.md", dir.display());
    let mut files = Vec::new();
    for entry in glob::glob(&pattern)
        .map_err(|e| crate::error::Error::Config(format!("bad glob pattern {}: {}", pattern, e)))?
    {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Unreadable path during scan"),
        }
    }
    Ok(files)
}

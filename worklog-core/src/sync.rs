//! Team index generation
//!
//! Reads every plan pointer under `plans/current/`, resolves the referenced
//! plans, and regenerates `plans/INDEX.md` as a Markdown table. The output
//! is a pure function of the pointers and plans on disk: rows are sorted by
//! author and carry no generation timestamp, so syncing twice without
//! intervening changes yields byte-identical output.
//!
//! The index file itself is excluded from document scans, so regenerating
//! it never invalidates the derived index.

use crate::document::Document;
use crate::error::Result;
use crate::store::scan;
use crate::types::{PlanPointer, PlanRecord};
use crate::workspace::Workspace;
use std::path::PathBuf;

/// Outcome of a team index sync
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Rows written to the index
    pub entries: usize,
    /// (path, message) per pointer that could not be resolved
    pub warnings: Vec<(PathBuf, String)>,
}

/// Regenerate `plans/INDEX.md` from the plan pointers.
///
/// A pointer naming a plan that is missing or unparseable is reported as a
/// warning and its row is skipped; an empty pointer renders as
/// "(no active plan)".
pub fn sync_team_index(ws: &Workspace) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    let mut pointers: Vec<PlanPointer> = Vec::new();

    for path in scan::markdown_files(&ws.pointers_dir())? {
        match Document::load(&path).and_then(|doc| PlanPointer::from_document(&path, doc)) {
            Ok(pointer) => pointers.push(pointer),
            Err(e) => report.warnings.push((path, e.to_string())),
        }
    }
    pointers.sort_by(|a, b| a.author.cmp(&b.author));

    let mut rows = Vec::new();
    for pointer in &pointers {
        match &pointer.plan {
            None => rows.push(format!(
                "| {} | (no active plan) | | {} |",
                pointer.author,
                pointer.last_updated.date_naive()
            )),
            Some(id) => {
                let plan_path = ws.plan_path(id);
                if !plan_path.is_file() {
                    report.warnings.push((
                        pointer.path.clone(),
                        format!("pointer references missing plan '{}'", id),
                    ));
                    continue;
                }
                let plan = match Document::load(&plan_path)
                    .and_then(|doc| PlanRecord::from_document(&plan_path, doc))
                {
                    Ok(plan) => plan,
                    // one broken plan must not hide the other authors' rows
                    Err(e) => {
                        report.warnings.push((pointer.path.clone(), e.to_string()));
                        continue;
                    }
                };
                rows.push(format!(
                    "| {} | [{}]({}.md) | {} | {} |",
                    pointer.author,
                    plan.title,
                    plan.id,
                    plan.status,
                    pointer.last_updated.date_naive()
                ));
            }
        }
    }
    report.entries = rows.len();

    let mut out = String::new();
    out.push_str("# Team Plans\n\n");
    out.push_str("Generated from `plans/current/`. Do not edit by hand.\n\n");
    out.push_str("| Author | Plan | Status | Updated |\n");
    out.push_str("|--------|------|--------|--------|\n");
    for row in rows {
        out.push_str(&row);
        out.push('\n');
    }

    ws.write_atomic(&ws.team_index_path(), &out)?;

    tracing::info!(
        entries = report.entries,
        warnings = report.warnings.len(),
        "Synced team index"
    );
    Ok(report)
}

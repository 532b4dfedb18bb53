//! Document model: TOML frontmatter + free-form body
//!
//! Every document in the workspace is a text file with an optional metadata
//! header delimited by `+++` lines, followed by a Markdown body:
//!
//! ```text
//! +++
//! date = "2026-03-01"
//! topics = ["auth", "storage"]
//! +++
//!
//! body text...
//! ```
//!
//! Parsing and rendering are inverses: `Document::parse(doc.render()?)`
//! yields the same metadata table and body. Unknown metadata keys survive
//! the typed conversions below via the records' `extra` tables.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;

const DELIM: &str = "+++";

/// A parsed document: metadata table plus body text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Frontmatter key/value pairs
    pub meta: toml::Table,
    /// Everything after the metadata block
    pub body: String,
}

impl Document {
    pub fn new(meta: toml::Table, body: impl Into<String>) -> Self {
        Self {
            meta,
            body: body.into(),
        }
    }

    /// Parse raw document text into metadata and body.
    ///
    /// Fails when the metadata block is opened but never closed, or when the
    /// header is not valid TOML. The error message carries no path; use
    /// [`Document::load`] when parsing a file.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let Some(after_open) = raw.strip_prefix(DELIM) else {
            // No metadata block: the whole document is body.
            return Ok(Self {
                meta: toml::Table::new(),
                body: raw.to_string(),
            });
        };

        let after_open = match after_open.strip_prefix('\n') {
            Some(rest) => rest,
            None if after_open.is_empty() => {
                return Err("metadata block opened with '+++' but never closed".to_string())
            }
            // "+++something" on the first line is body, not a header.
            None => {
                return Ok(Self {
                    meta: toml::Table::new(),
                    body: raw.to_string(),
                })
            }
        };

        // Locate the closing delimiter on its own line.
        let (header_end, body_start) = if after_open.starts_with("+++\n") {
            (0, 4)
        } else if after_open == DELIM {
            (0, after_open.len())
        } else if let Some(i) = after_open.find("\n+++\n") {
            (i + 1, i + 5)
        } else if after_open.ends_with("\n+++") {
            (after_open.len() - 3, after_open.len())
        } else {
            return Err("metadata block opened with '+++' but never closed".to_string());
        };

        let header = &after_open[..header_end];
        let mut body = &after_open[body_start..];
        // render() separates header and body with one blank line
        if let Some(rest) = body.strip_prefix('\n') {
            body = rest;
        }

        let meta: toml::Table =
            toml::from_str(header).map_err(|e| format!("invalid metadata: {}", e))?;

        Ok(Self {
            meta,
            body: body.to_string(),
        })
    }

    /// Render back to document text; inverse of [`Document::parse`]
    pub fn render(&self) -> Result<String> {
        if self.meta.is_empty() && !self.body.starts_with(DELIM) {
            return Ok(self.body.clone());
        }
        let header = toml::to_string(&self.meta).map_err(|e| Error::Validation {
            field: "metadata",
            message: e.to_string(),
        })?;
        Ok(format!("+++\n{}+++\n\n{}", header, self.body))
    }

    /// Read and parse a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|message| Error::MalformedDocument {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// Derive a stable slug from a plan title: lowercase, alphanumeric runs
/// joined by hyphens
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

// ============================================
// Typed metadata access
// ============================================

fn malformed(path: &Path, message: impl Into<String>) -> Error {
    Error::MalformedDocument {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn take_string(meta: &mut toml::Table, key: &str, path: &Path) -> Result<Option<String>> {
    match meta.remove(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(malformed(
            path,
            format!("field '{}' must be a string, got {}", key, other.type_str()),
        )),
    }
}

fn take_string_list(meta: &mut toml::Table, key: &str, path: &Path) -> Result<Vec<String>> {
    match meta.remove(key) {
        None => Ok(Vec::new()),
        Some(toml::Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                toml::Value::String(s) => Ok(s),
                other => Err(malformed(
                    path,
                    format!(
                        "field '{}' must be a list of strings, got a {} element",
                        key,
                        other.type_str()
                    ),
                )),
            })
            .collect(),
        Some(other) => Err(malformed(
            path,
            format!("field '{}' must be a list, got {}", key, other.type_str()),
        )),
    }
}

fn take_integer(meta: &mut toml::Table, key: &str, path: &Path) -> Result<Option<i64>> {
    match meta.remove(key) {
        None => Ok(None),
        Some(toml::Value::Integer(n)) => Ok(Some(n)),
        Some(other) => Err(malformed(
            path,
            format!("field '{}' must be an integer, got {}", key, other.type_str()),
        )),
    }
}

fn take_date(meta: &mut toml::Table, key: &str, path: &Path) -> Result<Option<NaiveDate>> {
    let raw = match meta.remove(key) {
        None => return Ok(None),
        // Quoted "2026-03-01" and bare TOML date literals are both accepted.
        Some(toml::Value::String(s)) => s,
        Some(toml::Value::Datetime(dt)) => dt.to_string(),
        Some(other) => Err(malformed(
            path,
            format!("field '{}' must be a date, got {}", key, other.type_str()),
        ))?,
    };
    let date_part = raw.get(..10).unwrap_or(&raw);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| malformed(path, format!("field '{}' is not a YYYY-MM-DD date: {}", key, raw)))?;
    Ok(Some(date))
}

fn take_datetime(meta: &mut toml::Table, key: &str, path: &Path) -> Result<Option<DateTime<Utc>>> {
    let raw = match meta.remove(key) {
        None => return Ok(None),
        Some(toml::Value::String(s)) => s,
        Some(toml::Value::Datetime(dt)) => dt.to_string(),
        Some(other) => Err(malformed(
            path,
            format!(
                "field '{}' must be an RFC 3339 timestamp, got {}",
                key,
                other.type_str()
            ),
        ))?,
    };
    let ts = DateTime::parse_from_rfc3339(&raw)
        .map_err(|_| malformed(path, format!("field '{}' is not RFC 3339: {}", key, raw)))?;
    Ok(Some(ts.with_timezone(&Utc)))
}

fn parse_status<T: std::str::FromStr<Err = String>>(
    raw: Option<String>,
    default: T,
    path: &Path,
) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(s) => s.parse::<T>().map_err(|e| malformed(path, e)),
    }
}

/// Split a session file stem like `2026-03-01` or `2026-03-01-2` into
/// (date, suffix)
pub fn session_stem_parts(stem: &str) -> Option<(NaiveDate, Option<String>)> {
    let date_part = stem.get(..10)?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    let suffix = stem
        .get(10..)
        .and_then(|rest| rest.strip_prefix('-'))
        .map(|s| s.to_string());
    Some((date, suffix))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================
// Session conversion
// ============================================

impl SessionRecord {
    /// Build a typed session from a parsed document.
    ///
    /// The date comes from the `date` field when present, otherwise from the
    /// filename stem; the disambiguating suffix always comes from the stem.
    pub fn from_document(path: &Path, doc: Document) -> Result<Self> {
        let mut meta = doc.meta;
        let stem = file_stem(path);
        let stem_parts = session_stem_parts(&stem);

        let date = match take_date(&mut meta, "date", path)? {
            Some(d) => d,
            None => {
                stem_parts
                    .as_ref()
                    .map(|(d, _)| *d)
                    .ok_or_else(|| malformed(path, "missing 'date' field and filename is not dated"))?
            }
        };
        let suffix = stem_parts.and_then(|(_, s)| s);

        let status = parse_status(
            take_string(&mut meta, "status", path)?,
            SessionStatus::InProgress,
            path,
        )?;

        Ok(SessionRecord {
            date,
            suffix,
            topics: take_string_list(&mut meta, "topics", path)?,
            plan: take_string(&mut meta, "plan", path)?.filter(|s| !s.is_empty()),
            phases: take_string_list(&mut meta, "phases", path)?,
            files: take_string_list(&mut meta, "files", path)?,
            duration_minutes: take_integer(&mut meta, "duration_minutes", path)?,
            status,
            body: doc.body,
            path: path.to_path_buf(),
            extra: meta,
        })
    }

    /// Inverse of [`SessionRecord::from_document`]
    pub fn to_document(&self) -> Document {
        let mut meta = toml::Table::new();
        meta.insert("date".into(), toml::Value::String(self.date.to_string()));
        meta.insert(
            "status".into(),
            toml::Value::String(self.status.as_str().to_string()),
        );
        if !self.topics.is_empty() {
            meta.insert("topics".into(), string_list(&self.topics));
        }
        if let Some(plan) = &self.plan {
            meta.insert("plan".into(), toml::Value::String(plan.clone()));
        }
        if !self.phases.is_empty() {
            meta.insert("phases".into(), string_list(&self.phases));
        }
        if !self.files.is_empty() {
            meta.insert("files".into(), string_list(&self.files));
        }
        if let Some(minutes) = self.duration_minutes {
            meta.insert("duration_minutes".into(), toml::Value::Integer(minutes));
        }
        meta.extend(self.extra.clone());
        Document::new(meta, self.body.clone())
    }
}

// ============================================
// Plan conversion
// ============================================

impl PlanRecord {
    pub fn from_document(path: &Path, doc: Document) -> Result<Self> {
        let mut meta = doc.meta;
        let id = file_stem(path);
        if id.is_empty() {
            return Err(malformed(path, "plan file has no usable name"));
        }

        let title = take_string(&mut meta, "title", path)?.unwrap_or_else(|| id.clone());
        let status = parse_status(
            take_string(&mut meta, "status", path)?,
            PlanStatus::Planned,
            path,
        )?;
        let author = take_string(&mut meta, "author", path)?.unwrap_or_else(|| "unknown".into());
        let created_at = take_datetime(&mut meta, "created_at", path)?
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);

        Ok(PlanRecord {
            id,
            title,
            status,
            author,
            topics: take_string_list(&mut meta, "topics", path)?,
            created_at,
            started_at: take_datetime(&mut meta, "started_at", path)?,
            completed_at: take_datetime(&mut meta, "completed_at", path)?,
            progress: take_progress(&mut meta, path)?,
            body: doc.body,
            path: path.to_path_buf(),
            extra: meta,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut meta = toml::Table::new();
        meta.insert("title".into(), toml::Value::String(self.title.clone()));
        meta.insert(
            "status".into(),
            toml::Value::String(self.status.as_str().to_string()),
        );
        meta.insert("author".into(), toml::Value::String(self.author.clone()));
        if !self.topics.is_empty() {
            meta.insert("topics".into(), string_list(&self.topics));
        }
        meta.insert(
            "created_at".into(),
            toml::Value::String(self.created_at.to_rfc3339()),
        );
        if let Some(t) = self.started_at {
            meta.insert("started_at".into(), toml::Value::String(t.to_rfc3339()));
        }
        if let Some(t) = self.completed_at {
            meta.insert("completed_at".into(), toml::Value::String(t.to_rfc3339()));
        }
        if !self.progress.is_empty() {
            let entries = self
                .progress
                .iter()
                .map(|p| {
                    let mut entry = toml::Table::new();
                    entry.insert("at".into(), toml::Value::String(p.at.to_rfc3339()));
                    entry.insert("note".into(), toml::Value::String(p.note.clone()));
                    toml::Value::Table(entry)
                })
                .collect();
            meta.insert("progress".into(), toml::Value::Array(entries));
        }
        meta.extend(self.extra.clone());
        Document::new(meta, self.body.clone())
    }
}

fn take_progress(meta: &mut toml::Table, path: &Path) -> Result<Vec<ProgressEntry>> {
    let items = match meta.remove("progress") {
        None => return Ok(Vec::new()),
        Some(toml::Value::Array(items)) => items,
        Some(other) => {
            return Err(malformed(
                path,
                format!("field 'progress' must be a list, got {}", other.type_str()),
            ))
        }
    };

    items
        .into_iter()
        .map(|item| {
            let toml::Value::Table(mut entry) = item else {
                return Err(malformed(path, "progress entries must be tables"));
            };
            let at = take_datetime(&mut entry, "at", path)?
                .ok_or_else(|| malformed(path, "progress entry missing 'at' timestamp"))?;
            let note = take_string(&mut entry, "note", path)?
                .ok_or_else(|| malformed(path, "progress entry missing 'note'"))?;
            Ok(ProgressEntry { at, note })
        })
        .collect()
}

// ============================================
// Plan pointer conversion
// ============================================

impl PlanPointer {
    pub fn from_document(path: &Path, doc: Document) -> Result<Self> {
        let mut meta = doc.meta;
        let author =
            take_string(&mut meta, "author", path)?.unwrap_or_else(|| file_stem(path));
        let plan = take_string(&mut meta, "plan", path)?.filter(|s| !s.is_empty());
        let status = match take_string(&mut meta, "status", path)? {
            None => None,
            Some(s) => Some(s.parse::<PlanStatus>().map_err(|e| malformed(path, e))?),
        };
        let last_updated = take_datetime(&mut meta, "last_updated", path)?
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);

        Ok(PlanPointer {
            author,
            plan,
            status,
            last_updated,
            path: path.to_path_buf(),
        })
    }

    pub fn to_document(&self) -> Document {
        let mut meta = toml::Table::new();
        meta.insert("author".into(), toml::Value::String(self.author.clone()));
        meta.insert(
            "plan".into(),
            toml::Value::String(self.plan.clone().unwrap_or_default()),
        );
        if let Some(status) = self.status {
            meta.insert(
                "status".into(),
                toml::Value::String(status.as_str().to_string()),
            );
        }
        meta.insert(
            "last_updated".into(),
            toml::Value::String(self.last_updated.to_rfc3339()),
        );
        Document::new(meta, String::new())
    }
}

// ============================================
// Learned note conversion
// ============================================

impl LearnedRecord {
    pub fn from_document(path: &Path, doc: Document) -> Result<Self> {
        let mut meta = doc.meta;
        let title = take_string(&mut meta, "title", path)?.unwrap_or_else(|| file_stem(path));

        Ok(LearnedRecord {
            title,
            topics: take_string_list(&mut meta, "topics", path)?,
            updated: take_date(&mut meta, "updated", path)?,
            body: doc.body,
            path: path.to_path_buf(),
        })
    }
}

fn string_list(items: &[String]) -> toml::Value {
    toml::Value::Array(
        items
            .iter()
            .map(|s| toml::Value::String(s.clone()))
            .collect(),
    )
}

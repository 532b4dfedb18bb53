//! Embedded-database adapter: relational schema as queryable state
//!
//! Queries run as indexed lookups over SQLite instead of in-memory scans,
//! which is the reason to pick this backend at larger document counts.
//! `rebuild_index` truncates and repopulates the derived tables inside one
//! transaction; per-document refreshes after a mutation are also a single
//! transaction, so a failure leaves either the old or the new row.
//!
//! Unlike the flat-cache backend, an existing database is not revalidated
//! against the documents on open: mutations keep it current, but documents
//! edited outside the mutation engine stay invisible until an explicit
//! `rebuild_index`.

pub mod schema;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::search::{self, SearchDoc};
use crate::store::scan;
use crate::store::StorageAdapter;
use crate::types::*;
use crate::workspace::{Workspace, TEAM_INDEX_FILE};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

const DB_FILE: &str = "index.db";

/// Storage adapter backed by an embedded SQLite database
pub struct DbAdapter {
    ws: Workspace,
    conn: Connection,
}

impl DbAdapter {
    /// Open or create the index database and ensure the schema exists.
    ///
    /// A freshly created database is populated immediately; an existing one
    /// is trusted to have been kept current by mutations and explicit
    /// rebuilds.
    pub fn open(ws: Workspace) -> Result<Self> {
        std::fs::create_dir_all(ws.state_dir())?;
        let db_path = ws.state_dir().join(DB_FILE);
        let fresh = !db_path.exists();

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        schema::run_migrations(&conn)?;

        let mut adapter = Self { ws, conn };
        if fresh {
            adapter.rebuild_index()?;
        }
        Ok(adapter)
    }

    /// Open against an in-memory database (for testing)
    pub fn open_in_memory(ws: Workspace) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        let mut adapter = Self { ws, conn };
        adapter.rebuild_index()?;
        Ok(adapter)
    }

    // ============================================
    // Row mapping
    // ============================================

    fn row_to_session(row: &Row) -> rusqlite::Result<SessionRecord> {
        let path: String = row.get("path")?;
        let date: String = row.get("date")?;
        Ok(SessionRecord {
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
            suffix: row.get("suffix")?,
            topics: json_list(row.get::<_, String>("topics")?),
            plan: row.get("plan")?,
            phases: json_list(row.get::<_, String>("phases")?),
            files: json_list(row.get::<_, String>("files")?),
            duration_minutes: row.get("duration_minutes")?,
            status: row
                .get::<_, String>("status")?
                .parse()
                .unwrap_or(SessionStatus::InProgress),
            body: row.get("body")?,
            path: PathBuf::from(path),
            extra: json_table(row.get::<_, String>("extra")?),
        })
    }

    fn row_to_plan(row: &Row) -> rusqlite::Result<PlanRecord> {
        let progress: String = row.get("progress")?;
        Ok(PlanRecord {
            id: row.get("id")?,
            path: PathBuf::from(row.get::<_, String>("path")?),
            title: row.get("title")?,
            status: row
                .get::<_, String>("status")?
                .parse()
                .unwrap_or(PlanStatus::Planned),
            author: row.get("author")?,
            topics: json_list(row.get::<_, String>("topics")?),
            created_at: parse_ts(Some(row.get("created_at")?)),
            started_at: row.get::<_, Option<String>>("started_at")?.map(|s| parse_ts(Some(s))),
            completed_at: row
                .get::<_, Option<String>>("completed_at")?
                .map(|s| parse_ts(Some(s))),
            progress: serde_json::from_str(&progress).unwrap_or_default(),
            body: row.get("body")?,
            extra: json_table(row.get::<_, String>("extra")?),
        })
    }

    // ============================================
    // Inserts (shared by rebuild and refresh, always inside a transaction)
    // ============================================

    fn insert_session(conn: &Connection, s: &SessionRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO sessions
                (path, date, suffix, topics, plan, phases, files, duration_minutes, status, body, extra)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                s.path.to_string_lossy(),
                s.date.to_string(),
                s.suffix,
                serde_json::to_string(&s.topics)?,
                s.plan,
                serde_json::to_string(&s.phases)?,
                serde_json::to_string(&s.files)?,
                s.duration_minutes,
                s.status.as_str(),
                s.body,
                serde_json::to_string(&s.extra)?,
            ],
        )?;
        Ok(())
    }

    fn insert_plan(conn: &Connection, p: &PlanRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO plans
                (id, path, title, status, author, topics, created_at, started_at, completed_at, progress, body, extra)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                p.id,
                p.path.to_string_lossy(),
                p.title,
                p.status.as_str(),
                p.author,
                serde_json::to_string(&p.topics)?,
                p.created_at.to_rfc3339(),
                p.started_at.map(|t| t.to_rfc3339()),
                p.completed_at.map(|t| t.to_rfc3339()),
                serde_json::to_string(&p.progress)?,
                p.body,
                serde_json::to_string(&p.extra)?,
            ],
        )?;
        Ok(())
    }

    fn insert_learned(conn: &Connection, n: &LearnedRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO learned (path, title, topics, updated, body)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                n.path.to_string_lossy(),
                n.title,
                serde_json::to_string(&n.topics)?,
                n.updated.map(|d| d.to_string()),
                n.body,
            ],
        )?;
        Ok(())
    }

    fn insert_pointer(conn: &Connection, ptr: &PlanPointer) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO pointers (author, plan, status, last_updated, path)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                ptr.author,
                ptr.plan,
                ptr.status.map(|s| s.as_str()),
                ptr.last_updated.to_rfc3339(),
                ptr.path.to_string_lossy(),
            ],
        )?;
        Ok(())
    }

    // ============================================
    // Search candidates
    // ============================================

    /// Pull the rows for a scope as searchable documents. Matching, scoring,
    /// and ordering all happen in the shared engine so both backends rank
    /// identically. No SQL-side term filter: SQLite's `lower()` folds ASCII
    /// only, which would drop non-ASCII matches the engine's Unicode
    /// lowercasing finds.
    fn search_docs(&self, scope: SearchScope) -> Result<Vec<SearchDoc>> {
        let mut docs = Vec::new();

        if search::scope_includes(scope, DocKind::Plan) {
            let mut stmt = self
                .conn
                .prepare("SELECT path, title, body, created_at, progress FROM plans")?;
            let rows = stmt.query_map([], |row| {
                let progress: String = row.get("progress")?;
                let created_at: String = row.get("created_at")?;
                Ok((
                    row.get::<_, String>("path")?,
                    row.get::<_, String>("title")?,
                    row.get::<_, String>("body")?,
                    created_at,
                    progress,
                ))
            })?;
            for row in rows {
                let (path, title, body, created_at, progress) = row?;
                let progress: Vec<ProgressEntry> =
                    serde_json::from_str(&progress).unwrap_or_default();
                let recency = progress
                    .last()
                    .map(|p| p.at)
                    .unwrap_or_else(|| parse_ts(Some(created_at)));
                docs.push(SearchDoc {
                    kind: DocKind::Plan,
                    path: PathBuf::from(path),
                    title,
                    body,
                    recency,
                });
            }
        }

        if search::scope_includes(scope, DocKind::Session) {
            let mut stmt = self
                .conn
                .prepare("SELECT path, date, suffix, body FROM sessions")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>("path")?,
                    row.get::<_, String>("date")?,
                    row.get::<_, Option<String>>("suffix")?,
                    row.get::<_, String>("body")?,
                ))
            })?;
            for row in rows {
                let (path, date, suffix, body) = row?;
                let title = match &suffix {
                    Some(s) => format!("{}-{}", date, s),
                    None => date.clone(),
                };
                let recency = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
                    .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);
                docs.push(SearchDoc {
                    kind: DocKind::Session,
                    path: PathBuf::from(path),
                    title,
                    body,
                    recency,
                });
            }
        }

        if search::scope_includes(scope, DocKind::Learned) {
            let mut stmt = self
                .conn
                .prepare("SELECT path, title, body, updated FROM learned")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>("path")?,
                    row.get::<_, String>("title")?,
                    row.get::<_, String>("body")?,
                    row.get::<_, Option<String>>("updated")?,
                ))
            })?;
            for row in rows {
                let (path, title, body, updated) = row?;
                let recency = updated
                    .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
                    .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);
                docs.push(SearchDoc {
                    kind: DocKind::Learned,
                    path: PathBuf::from(path),
                    title,
                    body,
                    recency,
                });
            }
        }

        Ok(docs)
    }

    /// Classify a document path by the directory it lives in
    fn doc_kind_for_path(&self, path: &Path) -> Option<RefreshTarget> {
        let file_name = path.file_name().and_then(|n| n.to_str())?;
        if path.parent() == Some(self.ws.pointers_dir().as_path()) {
            Some(RefreshTarget::Pointer)
        } else if path.parent() == Some(self.ws.sessions_dir().as_path()) {
            Some(RefreshTarget::Session)
        } else if path.parent() == Some(self.ws.plans_dir().as_path()) {
            if file_name == TEAM_INDEX_FILE {
                None
            } else {
                Some(RefreshTarget::Plan)
            }
        } else if path.parent() == Some(self.ws.learned_dir().as_path()) {
            Some(RefreshTarget::Learned)
        } else {
            None
        }
    }
}

enum RefreshTarget {
    Session,
    Plan,
    Pointer,
    Learned,
}

impl StorageAdapter for DbAdapter {
    fn workspace(&self) -> &Workspace {
        &self.ws
    }

    fn query_plans(&self, filter: &PlanFilter) -> Result<PlanQuery> {
        // exact-match fields go to SQL; the topic substring test shares the
        // in-memory predicate with the other backend
        let mut sql = String::from("SELECT * FROM plans WHERE 1=1");
        let mut args: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            args.push(status.as_str().to_string());
            sql.push_str(&format!(" AND status = ?{}", args.len()));
        }
        if let Some(author) = &filter.author {
            args.push(author.clone());
            sql.push_str(&format!(" AND author = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY path ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_plan)?;

        let mut plans = Vec::new();
        for row in rows {
            let plan = row?;
            if filter.matches(&plan) {
                plans.push(plan);
            }
        }
        Ok(PlanQuery {
            count: plans.len(),
            plans,
        })
    }

    fn query_sessions(&self, filter: &SessionFilter) -> Result<SessionQuery> {
        let as_of = filter.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let since = filter.since_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
        let cutoff = as_of - chrono::Duration::days(since - 1);

        let mut sql = String::from("SELECT * FROM sessions WHERE date >= ?1 AND date <= ?2");
        let mut args: Vec<String> = vec![cutoff.to_string(), as_of.to_string()];
        if let Some(plan) = &filter.plan {
            args.push(plan.clone());
            sql.push_str(&format!(" AND plan = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY date DESC, path ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_session)?;

        let mut sessions = Vec::new();
        for row in rows {
            let session = row?;
            if filter.matches(&session) {
                sessions.push(session);
            }
        }
        Ok(SessionQuery {
            count: sessions.len(),
            sessions,
        })
    }

    fn search(&self, query: &str, scope: SearchScope) -> Result<SearchResults> {
        // validation precedes any database access
        let terms = search::query_terms(query)?;
        let docs = self.search_docs(scope)?;
        Ok(search::run(query, scope, &terms, &docs))
    }

    fn rebuild_index(&mut self) -> Result<RebuildReport> {
        let snapshot = scan::scan(&self.ws)?;
        let report = RebuildReport {
            documents_indexed: snapshot.document_count(),
            errors: snapshot.errors.clone(),
        };

        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM sessions; DELETE FROM plans; DELETE FROM learned; DELETE FROM pointers;",
        )?;
        for s in &snapshot.sessions {
            Self::insert_session(&tx, s)?;
        }
        for p in &snapshot.plans {
            Self::insert_plan(&tx, p)?;
        }
        for n in &snapshot.learned {
            Self::insert_learned(&tx, n)?;
        }
        for ptr in &snapshot.pointers {
            Self::insert_pointer(&tx, ptr)?;
        }
        tx.commit()?;

        tracing::info!(
            documents = report.documents_indexed,
            errors = report.errors.len(),
            "Rebuilt index database"
        );
        Ok(report)
    }

    fn refresh_document(&mut self, path: &Path) -> Result<()> {
        let Some(target) = self.doc_kind_for_path(path) else {
            return Ok(());
        };
        let path_str = path.to_string_lossy().to_string();
        let exists = path.is_file();

        let tx = self.conn.transaction()?;
        match target {
            RefreshTarget::Session => {
                tx.execute("DELETE FROM sessions WHERE path = ?1", [&path_str])?;
                if exists {
                    let doc = Document::load(path)?;
                    let session = SessionRecord::from_document(path, doc)?;
                    Self::insert_session(&tx, &session)?;
                }
            }
            RefreshTarget::Plan => {
                tx.execute("DELETE FROM plans WHERE path = ?1", [&path_str])?;
                if exists {
                    let doc = Document::load(path)?;
                    let plan = PlanRecord::from_document(path, doc)?;
                    Self::insert_plan(&tx, &plan)?;
                }
            }
            RefreshTarget::Pointer => {
                tx.execute("DELETE FROM pointers WHERE path = ?1", [&path_str])?;
                if exists {
                    let doc = Document::load(path)?;
                    let pointer = PlanPointer::from_document(path, doc)?;
                    Self::insert_pointer(&tx, &pointer)?;
                }
            }
            RefreshTarget::Learned => {
                tx.execute("DELETE FROM learned WHERE path = ?1", [&path_str])?;
                if exists {
                    let doc = Document::load(path)?;
                    let note = LearnedRecord::from_document(path, doc)?;
                    Self::insert_learned(&tx, &note)?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| Error::Database(e))
    }
}

fn json_list(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn json_table(raw: String) -> toml::Table {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn parse_ts(raw: Option<String>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
}

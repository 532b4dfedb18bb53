//! Derived-index adapter: one flat cache artifact as queryable state
//!
//! The cache lives at `.worklog/index.json`. It is a pure function of the
//! current document set: entries are sorted, nothing time-of-build dependent
//! is stored, so rebuilding twice from the same documents yields
//! byte-identical output. Each source file's sha256 digest is recorded; on
//! open the digests are revalidated against disk and a stale or missing
//! cache triggers an implicit rebuild.
//!
//! Replacement is atomic (temp file in the same directory, then rename), so
//! a crash mid-rebuild never leaves a truncated cache.

use crate::error::{Error, Result};
use crate::search::{self, SearchDoc};
use crate::store::scan::{self, Snapshot};
use crate::store::StorageAdapter;
use crate::types::*;
use crate::workspace::{Workspace, TEAM_INDEX_FILE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Bumped whenever the cache layout changes; mismatches force a rebuild
const CACHE_VERSION: u32 = 1;

const CACHE_FILE: &str = "index.json";

/// sha256 of one source document, for staleness detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FileDigest {
    path: PathBuf,
    sha256: String,
}

/// The cache artifact
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexCache {
    version: u32,
    files: Vec<FileDigest>,
    sessions: Vec<SessionRecord>,
    plans: Vec<PlanRecord>,
    learned: Vec<LearnedRecord>,
    pointers: Vec<PlanPointer>,
}

/// Storage adapter backed by the flat cache artifact
pub struct IndexAdapter {
    ws: Workspace,
    cache: IndexCache,
}

impl IndexAdapter {
    /// Open against a workspace, loading the cache when present and valid,
    /// otherwise rebuilding it
    pub fn open(ws: Workspace) -> Result<Self> {
        let mut adapter = Self {
            ws,
            cache: IndexCache::default(),
        };

        match adapter.try_load_cache() {
            Ok(Some(cache)) => {
                tracing::debug!(
                    documents = cache.sessions.len() + cache.plans.len() + cache.learned.len(),
                    "Loaded valid index cache"
                );
                adapter.cache = cache;
            }
            Ok(None) => {
                tracing::info!("Index cache missing or stale, rebuilding");
                adapter.rebuild_index()?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Index cache unreadable, rebuilding");
                adapter.rebuild_index()?;
            }
        }

        Ok(adapter)
    }

    fn cache_path(&self) -> PathBuf {
        self.ws.state_dir().join(CACHE_FILE)
    }

    /// Load the cache if it exists and matches the current document set
    fn try_load_cache(&self) -> Result<Option<IndexCache>> {
        let path = self.cache_path();
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read(&path)?;
        let cache: IndexCache = serde_json::from_slice(&raw)
            .map_err(|e| Error::Config(format!("corrupt index cache {}: {}", path.display(), e)))?;

        if cache.version != CACHE_VERSION {
            return Ok(None);
        }
        if cache.files != digest_tree(&self.ws)? {
            return Ok(None);
        }
        Ok(Some(cache))
    }

    fn search_docs(&self, scope: SearchScope) -> Vec<SearchDoc> {
        let mut docs = Vec::new();
        if search::scope_includes(scope, DocKind::Plan) {
            docs.extend(self.cache.plans.iter().map(|p| SearchDoc {
                kind: DocKind::Plan,
                path: p.path.clone(),
                title: p.title.clone(),
                body: p.body.clone(),
                recency: p.recency(),
            }));
        }
        if search::scope_includes(scope, DocKind::Session) {
            docs.extend(self.cache.sessions.iter().map(|s| SearchDoc {
                kind: DocKind::Session,
                path: s.path.clone(),
                title: s.title(),
                body: s.body.clone(),
                recency: s.recency(),
            }));
        }
        if search::scope_includes(scope, DocKind::Learned) {
            docs.extend(self.cache.learned.iter().map(|n| SearchDoc {
                kind: DocKind::Learned,
                path: n.path.clone(),
                title: n.title.clone(),
                body: n.body.clone(),
                recency: n.recency(),
            }));
        }
        docs
    }
}

impl StorageAdapter for IndexAdapter {
    fn workspace(&self) -> &Workspace {
        &self.ws
    }

    fn query_plans(&self, filter: &PlanFilter) -> Result<PlanQuery> {
        let plans: Vec<PlanRecord> = self
            .cache
            .plans
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        Ok(PlanQuery {
            count: plans.len(),
            plans,
        })
    }

    fn query_sessions(&self, filter: &SessionFilter) -> Result<SessionQuery> {
        let mut sessions: Vec<SessionRecord> = self
            .cache
            .sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.date.cmp(&a.date).then(a.path.cmp(&b.path)));
        Ok(SessionQuery {
            count: sessions.len(),
            sessions,
        })
    }

    fn search(&self, query: &str, scope: SearchScope) -> Result<SearchResults> {
        // validation precedes any cache access
        let terms = search::query_terms(query)?;
        let docs = self.search_docs(scope);
        Ok(search::run(query, scope, &terms, &docs))
    }

    fn rebuild_index(&mut self) -> Result<RebuildReport> {
        let snapshot = scan::scan(&self.ws)?;
        let report = RebuildReport {
            documents_indexed: snapshot.document_count(),
            errors: snapshot.errors.clone(),
        };

        let Snapshot {
            sessions,
            plans,
            learned,
            pointers,
            ..
        } = snapshot;

        self.cache = IndexCache {
            version: CACHE_VERSION,
            files: digest_tree(&self.ws)?,
            sessions,
            plans,
            learned,
            pointers,
        };

        let bytes = serde_json::to_vec_pretty(&self.cache)
            .map_err(|e| Error::Config(format!("failed to serialize index cache: {}", e)))?;

        let state_dir = self.ws.state_dir();
        std::fs::create_dir_all(&state_dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&state_dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(self.cache_path())
            .map_err(|e| Error::Io(e.error))?;

        tracing::info!(
            documents = report.documents_indexed,
            errors = report.errors.len(),
            "Rebuilt index cache"
        );
        Ok(report)
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Digest every document the index derives from, in sorted order
fn digest_tree(ws: &Workspace) -> Result<Vec<FileDigest>> {
    let mut digests = Vec::new();
    let dirs = [
        ws.sessions_dir(),
        ws.plans_dir(),
        ws.pointers_dir(),
        ws.learned_dir(),
    ];

    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension().and_then(|e| e.to_str()) == Some("md")
                    && p.file_name().and_then(|n| n.to_str()) != Some(TEAM_INDEX_FILE)
            })
            .collect();
        entries.sort();

        for path in entries {
            let contents = std::fs::read(&path)?;
            let sha256 = hex::encode(Sha256::digest(&contents));
            digests.push(FileDigest { path, sha256 });
        }
    }

    Ok(digests)
}

//! Storage layer: one adapter contract, two interchangeable backends
//!
//! - [`IndexAdapter`] keeps a single flat cache artifact rebuilt from the
//!   documents (good default for small workspaces).
//! - [`DbAdapter`] keeps a relational SQLite schema populated by scanning
//!   the same documents (indexed lookups for larger workspaces).
//!
//! The backend is chosen at initialization time from configuration, never
//! by inspecting data at runtime. Documents on disk remain authoritative in
//! both cases; either backend can be rebuilt from them at any time.

pub mod db;
pub mod index;
pub mod scan;

pub use db::DbAdapter;
pub use index::IndexAdapter;

use crate::error::{Error, Result};
use crate::types::*;
use crate::workspace::Workspace;
use serde::Deserialize;
use std::path::Path;

/// The operation set every backend implements.
///
/// An adapter that cannot support an operation must fail with a named error
/// rather than returning a default value.
pub trait StorageAdapter {
    /// The workspace this adapter is bound to
    fn workspace(&self) -> &Workspace;

    /// Filtered plan retrieval, in document order
    fn query_plans(&self, filter: &PlanFilter) -> Result<PlanQuery>;

    /// Filtered session retrieval, sorted by date descending
    fn query_sessions(&self, filter: &SessionFilter) -> Result<SessionQuery>;

    /// Full-text search over the given scope
    fn search(&self, query: &str, scope: SearchScope) -> Result<SearchResults>;

    /// Recompute the derived index from the documents on disk.
    ///
    /// Safe to call at any time, idempotent, and the universal recovery
    /// action after any detected inconsistency.
    fn rebuild_index(&mut self) -> Result<RebuildReport>;

    /// Fold one changed document into the index before a mutation returns.
    ///
    /// Backends may override with an incremental update; the default is a
    /// full rebuild, which is always correct.
    fn refresh_document(&mut self, path: &Path) -> Result<()> {
        let _ = path;
        self.rebuild_index().map(|_| ())
    }

    /// Release held resources (file handles, database connections)
    fn close(self: Box<Self>) -> Result<()>;
}

/// Which backend to initialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Flat derived-index cache file
    #[default]
    Index,
    /// Embedded SQLite database
    Database,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Index => "index",
            Backend::Database => "database",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "index" => Ok(Backend::Index),
            "database" => Ok(Backend::Database),
            other => Err(Error::Config(format!(
                "unknown backend '{}'; choose one of: index, database",
                other
            ))),
        }
    }
}

/// Open the configured backend against a workspace
pub fn open(ws: Workspace, backend: Backend) -> Result<Box<dyn StorageAdapter>> {
    tracing::info!(root = %ws.root().display(), backend = backend.as_str(), "Opening storage adapter");
    match backend {
        Backend::Index => Ok(Box::new(IndexAdapter::open(ws)?)),
        Backend::Database => Ok(Box::new(DbAdapter::open(ws)?)),
    }
}

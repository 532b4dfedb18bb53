//! Workspace layout and file conventions
//!
//! ```text
//! <root>/
//!   sessions/YYYY-MM-DD.md        one per date, -2/-3... when disambiguated
//!   plans/<slug>.md               one per plan
//!   plans/current/<author>.md     plan pointers
//!   plans/INDEX.md                generated team index
//!   learned/*.md                  learned notes
//!   .worklog/                     derived state (index cache, index db)
//! ```
//!
//! Documents are the source of truth; everything under `.worklog/` can be
//! regenerated at any time.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the generated team index document
pub const TEAM_INDEX_FILE: &str = "INDEX.md";

/// Directory holding derived state
pub const STATE_DIR: &str = ".worklog";

/// Handle on a workspace root with the expected document layout
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open an existing workspace.
    ///
    /// Fails with `RootNotFound` when the root is missing or lacks the
    /// `sessions/` and `plans/` directories.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let ws = Self { root };
        if !ws.sessions_dir().is_dir() || !ws.plans_dir().is_dir() {
            return Err(Error::RootNotFound(ws.root));
        }
        Ok(ws)
    }

    /// Create the workspace layout, then open it. Safe on an existing root.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let ws = Self { root };
        std::fs::create_dir_all(ws.sessions_dir())?;
        std::fs::create_dir_all(ws.pointers_dir())?;
        std::fs::create_dir_all(ws.learned_dir())?;
        std::fs::create_dir_all(ws.state_dir())?;
        Ok(ws)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.root.join("plans")
    }

    pub fn pointers_dir(&self) -> PathBuf {
        self.plans_dir().join("current")
    }

    pub fn learned_dir(&self) -> PathBuf {
        self.root.join("learned")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn team_index_path(&self) -> PathBuf {
        self.plans_dir().join(TEAM_INDEX_FILE)
    }

    pub fn session_path(&self, date: NaiveDate, suffix: Option<&str>) -> PathBuf {
        let name = match suffix {
            Some(s) => format!("{}-{}.md", date, s),
            None => format!("{}.md", date),
        };
        self.sessions_dir().join(name)
    }

    pub fn plan_path(&self, id: &str) -> PathBuf {
        self.plans_dir().join(format!("{}.md", id))
    }

    pub fn pointer_path(&self, author: &str) -> PathBuf {
        self.pointers_dir().join(format!("{}.md", author))
    }

    /// Write a file so a crash leaves either the old or the new content:
    /// temp file in the target directory, then rename over the destination.
    pub fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let parent = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

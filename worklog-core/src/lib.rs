//! # worklog-core
//!
//! Core library for worklog - a plain-text knowledge store for engineering
//! session logs and plans.
//!
//! This library provides:
//! - A document model (TOML frontmatter + Markdown body) with typed records
//! - Two interchangeable storage backends over a derived, rebuildable index
//! - Full-text search with relevance ranking
//! - A mutation engine with read-your-writes consistency
//! - Team index generation from per-author plan pointers
//!
//! ## Architecture
//!
//! The documents on disk are the source of truth; everything else is derived:
//! - **Documents:** `sessions/`, `plans/`, `plans/current/`, `learned/`
//! - **Derived state:** `.worklog/index.json` or `.worklog/index.db`,
//!   regenerable at any time via `rebuild_index`
//! - **Generated artifacts:** `plans/INDEX.md`, excluded from indexing
//!
//! ## Example
//!
//! ```rust,no_run
//! use worklog_core::{store, Backend, PlanFilter, Workspace};
//!
//! let ws = Workspace::open(".").expect("not a workspace");
//! let adapter = store::open(ws, Backend::Index).expect("failed to open storage");
//! let active = adapter.query_plans(&PlanFilter::default()).expect("query failed");
//! println!("{} plans", active.count);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use document::Document;
pub use error::{Error, Result};
pub use store::{Backend, StorageAdapter};
pub use sync::SyncReport;
pub use types::*;
pub use workspace::Workspace;

// Public modules
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod mutate;
pub mod search;
pub mod store;
pub mod sync;
pub mod types;
pub mod workspace;

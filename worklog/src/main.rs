//! worklog - plain-text session logs and plans with a queryable index
//!
//! Query commands print JSON; mutation commands print a short confirmation
//! line. All state lives in the workspace as editable Markdown documents.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use worklog_core::mutate::{self, BodyEdit, NewPlan, NewSession, PlanUpdate, SessionUpdate};
use worklog_core::store::{self, Backend, StorageAdapter};
use worklog_core::{sync, Config, SearchScope, SessionFilter, Workspace};
use worklog_core::{PlanFilter, DEFAULT_LOOKBACK_DAYS};

#[derive(Parser)]
#[command(name = "worklog")]
#[command(about = "Session logs and plans as plain text, with a queryable index")]
#[command(version)]
struct Args {
    /// Workspace root (defaults to config, then the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Storage backend: index or database
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the workspace layout in the root directory
    Init,

    /// List sessions, newest first (JSON)
    Sessions {
        /// Lookback window in days
        #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
        since_days: i64,
        /// Case-insensitive topic substring
        #[arg(long)]
        topic: Option<String>,
        /// Only sessions referencing this plan
        #[arg(long)]
        plan: Option<String>,
    },

    /// List plans (JSON)
    Plans {
        /// Exact status: PLANNED, ACTIVE, PAUSED, COMPLETE, CANCELLED
        #[arg(long)]
        status: Option<String>,
        /// Exact author
        #[arg(long)]
        author: Option<String>,
        /// Case-insensitive topic substring
        #[arg(long)]
        topic: Option<String>,
    },

    /// Full-text search (JSON)
    Search {
        query: String,
        /// all, plans, sessions, or learned
        #[arg(long, default_value = "all")]
        scope: String,
    },

    /// Rebuild the derived index from the documents
    Rebuild,

    /// Create a session entry
    NewSession {
        /// Session date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Plan this session contributes to
        #[arg(long)]
        plan: Option<String>,
        #[arg(long = "phase")]
        phases: Vec<String>,
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long)]
        duration_minutes: Option<i64>,
        /// in-progress, complete, or abandoned
        #[arg(long)]
        status: Option<String>,
        /// Body text
        #[arg(long, default_value = "")]
        body: String,
        /// Add a disambiguated entry when the date is already used
        #[arg(long)]
        force: bool,
    },

    /// Edit an existing session, identified by its file stem
    UpdateSession {
        id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "add-topic")]
        add_topics: Vec<String>,
        #[arg(long = "add-file")]
        add_files: Vec<String>,
        #[arg(long)]
        duration_minutes: Option<i64>,
        #[command(flatten)]
        edits: EditArgs,
    },

    /// Create a plan and point the author's pointer at it
    NewPlan {
        title: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long = "topic")]
        topics: Vec<String>,
        #[arg(long, default_value = "")]
        body: String,
    },

    /// Edit an existing plan by id
    UpdatePlan {
        id: String,
        /// Requested status transition
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "add-topic")]
        add_topics: Vec<String>,
        /// Append a timestamped progress note
        #[arg(long)]
        progress: Option<String>,
        #[command(flatten)]
        edits: EditArgs,
    },

    /// Point an author's plan pointer at a plan, or clear it
    SetCurrent {
        author: Option<String>,
        #[arg(long, conflicts_with = "clear")]
        plan: Option<String>,
        /// Record "no active plan"
        #[arg(long)]
        clear: bool,
    },

    /// Regenerate the plans/INDEX.md team index from the pointers
    SyncIndex,
}

#[derive(clap::Args)]
struct EditArgs {
    /// Text to append to the body
    #[arg(long)]
    append: Option<String>,
    /// Text to prepend to the body
    #[arg(long)]
    prepend: Option<String>,
    /// Insert after the first line matching ANCHOR
    #[arg(long, num_args = 2, value_names = ["ANCHOR", "TEXT"])]
    insert_after: Option<Vec<String>>,
    /// Insert before the first line matching ANCHOR
    #[arg(long, num_args = 2, value_names = ["ANCHOR", "TEXT"])]
    insert_before: Option<Vec<String>>,
}

impl EditArgs {
    fn into_edits(self) -> Vec<BodyEdit> {
        let mut edits = Vec::new();
        if let Some(text) = self.prepend {
            edits.push(BodyEdit::Prepend(text));
        }
        if let Some(text) = self.append {
            edits.push(BodyEdit::Append(text));
        }
        if let Some(mut pair) = self.insert_after {
            let text = pair.pop().unwrap_or_default();
            let anchor = pair.pop().unwrap_or_default();
            edits.push(BodyEdit::InsertAfter { anchor, text });
        }
        if let Some(mut pair) = self.insert_before {
            let text = pair.pop().unwrap_or_default();
            let anchor = pair.pop().unwrap_or_default();
            edits.push(BodyEdit::InsertBefore { anchor, text });
        }
        edits
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        worklog_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let root = config.resolve_root(args.root.clone());
    let backend = match &args.backend {
        Some(raw) => raw.parse::<Backend>()?,
        None => config.backend,
    };
    tracing::debug!(root = %root.display(), backend = backend.as_str(), "worklog starting");

    if let Command::Init = args.command {
        let ws = Workspace::create(&root)
            .with_context(|| format!("failed to create workspace at {}", root.display()))?;
        println!("Initialized worklog workspace at {}", ws.root().display());
        return Ok(());
    }

    let ws = Workspace::open(&root)?;
    let mut adapter = store::open(ws, backend)?;
    let result = run(adapter.as_mut(), &config, args);
    adapter.close()?;
    result
}

fn run(adapter: &mut dyn StorageAdapter, config: &Config, args: Args) -> Result<()> {
    match args.command {
        Command::Init => unreachable!("handled before the adapter opens"),

        Command::Sessions {
            since_days,
            topic,
            plan,
        } => {
            let filter = SessionFilter {
                since_days: Some(since_days),
                topic_contains: topic,
                plan,
                as_of: None,
            };
            let result = adapter.query_sessions(&filter)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Plans {
            status,
            author,
            topic,
        } => {
            let filter = PlanFilter {
                status: status.as_deref().map(mutate::parse_plan_status).transpose()?,
                author,
                topic_contains: topic,
            };
            let result = adapter.query_plans(&filter)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Search { query, scope } => {
            let scope: SearchScope = scope.parse()?;
            let results = adapter.search(&query, scope)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        Command::Rebuild => {
            let report = adapter.rebuild_index()?;
            println!("Indexed {} documents", report.documents_indexed);
            for (path, message) in &report.errors {
                eprintln!("warning: skipped {}: {}", path.display(), message);
            }
        }

        Command::NewSession {
            date,
            topics,
            plan,
            phases,
            files,
            duration_minutes,
            status,
            body,
            force,
        } => {
            let session = mutate::create_session(
                adapter,
                NewSession {
                    date,
                    topics,
                    plan,
                    phases,
                    files,
                    duration_minutes,
                    status: status.as_deref().map(mutate::parse_session_status).transpose()?,
                    body,
                    force,
                },
            )?;
            println!("Created {}", session.path.display());
        }

        Command::UpdateSession {
            id,
            status,
            add_topics,
            add_files,
            duration_minutes,
            edits,
        } => {
            let session = mutate::update_session(
                adapter,
                &id,
                SessionUpdate {
                    set_status: status.as_deref().map(mutate::parse_session_status).transpose()?,
                    add_topics,
                    add_files,
                    set_duration_minutes: duration_minutes,
                    edits: edits.into_edits(),
                },
            )?;
            println!("Updated {}", session.path.display());
        }

        Command::NewPlan {
            title,
            author,
            topics,
            body,
        } => {
            let author = config.resolve_author(author)?;
            let created = mutate::create_plan(
                adapter,
                NewPlan {
                    title,
                    author,
                    topics,
                    body,
                },
            )?;
            println!("Created plan '{}' at {}", created.plan_id, created.path.display());
        }

        Command::UpdatePlan {
            id,
            status,
            add_topics,
            progress,
            edits,
        } => {
            let plan = mutate::update_plan(
                adapter,
                &id,
                PlanUpdate {
                    set_status: status.as_deref().map(mutate::parse_plan_status).transpose()?,
                    add_topics,
                    append_progress: progress,
                    edits: edits.into_edits(),
                },
            )?;
            println!("Updated plan '{}' ({})", plan.id, plan.status);
        }

        Command::SetCurrent {
            author,
            plan,
            clear,
        } => {
            let author = config.resolve_author(author)?;
            let plan_id = if clear { None } else { plan };
            let pointer = mutate::set_current_plan(adapter, &author, plan_id.as_deref())?;
            match &pointer.plan {
                Some(id) => println!("{} -> {}", pointer.author, id),
                None => println!("{} -> (no active plan)", pointer.author),
            }
        }

        Command::SyncIndex => {
            let ws = adapter.workspace().clone();
            let report = sync::sync_team_index(&ws)?;
            println!(
                "Wrote {} with {} entries",
                ws.team_index_path().display(),
                report.entries
            );
            for (path, message) in &report.warnings {
                eprintln!("warning: {}: {}", path.display(), message);
            }
        }
    }

    Ok(())
}

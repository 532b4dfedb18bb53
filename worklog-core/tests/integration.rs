//! End-to-end tests over the full stack: workspace, mutation engine,
//! both storage backends, search, and team index sync.

use chrono::NaiveDate;
use tempfile::TempDir;
use worklog_core::mutate::{self, BodyEdit, NewPlan, NewSession, PlanUpdate, SessionUpdate};
use worklog_core::store::{self, Backend};
use worklog_core::sync;
use worklog_core::{
    Error, PlanFilter, PlanStatus, SearchScope, SessionFilter, SessionStatus, StorageAdapter,
    Workspace,
};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn open_backend(ws: &Workspace, backend: Backend) -> Box<dyn StorageAdapter> {
    store::open(ws.clone(), backend).unwrap()
}

/// Each test body runs once per backend; the two must behave identically.
fn for_each_backend(test: impl Fn(&mut dyn StorageAdapter)) {
    worklog_core::logging::init_test();
    for backend in [Backend::Index, Backend::Database] {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::create(dir.path()).unwrap();
        let mut adapter = open_backend(&ws, backend);
        test(adapter.as_mut());
        adapter.close().unwrap();
    }
}

#[test]
fn session_lifecycle_with_read_your_writes() {
    for_each_backend(|adapter| {
        let session = mutate::create_session(
            adapter,
            NewSession {
                date: Some(date("2026-03-01")),
                topics: vec!["auth".into()],
                body: "## Log\nimplemented token refresh\n".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);

        // the write is visible through the same adapter immediately
        let filter = SessionFilter {
            as_of: Some(date("2026-03-01")),
            ..Default::default()
        };
        let result = adapter.query_sessions(&filter).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.sessions[0].topics, vec!["auth"]);

        // duplicate date rejected, force lands a -2 entry
        let err = mutate::create_session(
            adapter,
            NewSession {
                date: Some(date("2026-03-01")),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateSession { .. }));

        let forced = mutate::create_session(
            adapter,
            NewSession {
                date: Some(date("2026-03-01")),
                force: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(forced.suffix.as_deref(), Some("2"));
        assert_eq!(adapter.query_sessions(&filter).unwrap().count, 2);

        // updates round-trip through the document
        let updated = mutate::update_session(
            adapter,
            "2026-03-01",
            SessionUpdate {
                set_status: Some(SessionStatus::Complete),
                add_files: vec!["src/auth.rs".into()],
                edits: vec![BodyEdit::Append("wrapped up".into())],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status, SessionStatus::Complete);
        assert!(updated.body.ends_with("wrapped up\n"));

        let reread = adapter.query_sessions(&filter).unwrap();
        let primary = reread
            .sessions
            .iter()
            .find(|s| s.suffix.is_none())
            .unwrap();
        assert_eq!(primary.status, SessionStatus::Complete);
        assert_eq!(primary.files, vec!["src/auth.rs"]);
    });
}

#[test]
fn session_lookback_window() {
    for_each_backend(|adapter| {
        for day in ["2026-01-05", "2026-02-01", "2026-03-01"] {
            mutate::create_session(
                adapter,
                NewSession {
                    date: Some(date(day)),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let as_of = Some(date("2026-03-01"));

        // default 30-day window drops the January entry
        let default_window = adapter
            .query_sessions(&SessionFilter {
                as_of,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(default_window.count, 2);

        // results come back newest first
        assert!(default_window.sessions[0].date > default_window.sessions[1].date);

        // a 1-day window covers the reference date only
        let today_only = adapter
            .query_sessions(&SessionFilter {
                since_days: Some(1),
                as_of,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(today_only.count, 1);
        assert_eq!(today_only.sessions[0].date, date("2026-03-01"));

        // wide window sees everything
        let wide = adapter
            .query_sessions(&SessionFilter {
                since_days: Some(365),
                as_of,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(wide.count, 3);
    });
}

#[test]
fn plan_lifecycle_and_pointer() {
    for_each_backend(|adapter| {
        let created = mutate::create_plan(
            adapter,
            NewPlan {
                title: "API Redesign".into(),
                author: "alice".into(),
                topics: vec!["api".into()],
                body: "## Goal\nredesign\n".into(),
            },
        )
        .unwrap();
        assert_eq!(created.plan_id, "api-redesign");

        let planned = adapter
            .query_plans(&PlanFilter {
                status: Some(PlanStatus::Planned),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(planned.count, 1);

        // the full machine: PLANNED -> ACTIVE -> PAUSED -> ACTIVE -> COMPLETE
        for status in [
            PlanStatus::Active,
            PlanStatus::Paused,
            PlanStatus::Active,
            PlanStatus::Complete,
        ] {
            mutate::update_plan(
                adapter,
                "api-redesign",
                PlanUpdate {
                    set_status: Some(status),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let done = adapter
            .query_plans(&PlanFilter {
                status: Some(PlanStatus::Complete),
                author: Some("alice".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(done.count, 1);
        assert!(done.plans[0].started_at.is_some());
        assert!(done.plans[0].completed_at.is_some());

        // filter by topic substring, case-insensitively
        let by_topic = adapter
            .query_plans(&PlanFilter {
                topic_contains: Some("API".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_topic.count, 1);
    });
}

#[test]
fn search_ranks_and_scopes() {
    for_each_backend(|adapter| {
        mutate::create_plan(
            adapter,
            NewPlan {
                title: "Auth Overhaul".into(),
                author: "alice".into(),
                body: "auth auth auth\n".into(),
                ..Default::default()
            },
        )
        .unwrap();
        mutate::create_session(
            adapter,
            NewSession {
                date: Some(date("2026-03-01")),
                body: "touched the auth module once\n".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let err = adapter.search("   ", SearchScope::All).unwrap_err();
        assert!(matches!(err, Error::EmptyQuery));

        let all = adapter.search("auth", SearchScope::All).unwrap();
        assert_eq!(all.count, 2);
        // title + repeated body hits put the plan first
        assert!(all.matches[0].file.ends_with("plans/auth-overhaul.md"));
        assert!(all.matches[0].relevance > all.matches[1].relevance);
        assert!(all.matches[1].context.contains("auth"));

        let sessions_only = adapter.search("auth", SearchScope::Sessions).unwrap();
        assert_eq!(sessions_only.count, 1);
        assert!(sessions_only.matches[0]
            .file
            .ends_with("sessions/2026-03-01.md"));
    });
}

#[test]
fn learned_notes_visible_to_search_only() {
    for_each_backend(|adapter| {
        let ws = adapter.workspace().clone();
        std::fs::write(
            ws.learned_dir().join("retries.md"),
            "+++\ntitle = \"Retry budget\"\nupdated = \"2026-02-01\"\n+++\n\nexponential backoff saturates quickly\n",
        )
        .unwrap();
        adapter.rebuild_index().unwrap();

        let hits = adapter.search("backoff", SearchScope::Learned).unwrap();
        assert_eq!(hits.count, 1);
        assert!(hits.matches[0].file.ends_with("learned/retries.md"));

        // learned notes never show up in plan or session queries
        assert_eq!(adapter.query_plans(&PlanFilter::default()).unwrap().count, 0);
    });
}

#[test]
fn rebuild_reports_malformed_documents() {
    for_each_backend(|adapter| {
        let ws = adapter.workspace().clone();
        std::fs::write(ws.sessions_dir().join("2026-03-01.md"), "+++\nbroken\n").unwrap();
        std::fs::write(
            ws.sessions_dir().join("2026-03-02.md"),
            "+++\ntopics = [\"ok\"]\n+++\n\nfine\n",
        )
        .unwrap();

        let report = adapter.rebuild_index().unwrap();
        assert_eq!(report.documents_indexed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].0.ends_with("2026-03-01.md"));

        // the good document is queryable despite its broken neighbor
        let result = adapter
            .query_sessions(&SessionFilter {
                as_of: Some(date("2026-03-02")),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.count, 1);
    });
}

#[test]
fn team_index_sync_and_exclusion() {
    for_each_backend(|adapter| {
        mutate::create_plan(
            adapter,
            NewPlan {
                title: "API Redesign".into(),
                author: "alice".into(),
                ..Default::default()
            },
        )
        .unwrap();
        mutate::set_current_plan(adapter, "bob", None).unwrap();

        let ws = adapter.workspace().clone();
        let report = sync::sync_team_index(&ws).unwrap();
        assert_eq!(report.entries, 2);
        assert!(report.warnings.is_empty());

        let index = std::fs::read_to_string(ws.team_index_path()).unwrap();
        assert!(index.contains("[API Redesign](api-redesign.md)"));
        assert!(index.contains("(no active plan)"));

        // INDEX.md is an artifact; rebuilding after sync must not index it
        let rebuilt = adapter.rebuild_index().unwrap();
        assert!(rebuilt.errors.is_empty());
        assert_eq!(adapter.query_plans(&PlanFilter::default()).unwrap().count, 1);
    });
}

#[test]
fn backends_agree_on_results() {
    let dir = TempDir::new().unwrap();
    let ws = Workspace::create(dir.path()).unwrap();
    {
        let mut seed = open_backend(&ws, Backend::Index);
        mutate::create_plan(
            seed.as_mut(),
            NewPlan {
                title: "Storage Swap".into(),
                author: "alice".into(),
                topics: vec!["storage".into()],
                body: "replace the cache layer\n\u{dc}BERTRAGUNG notes\n".into(),
            },
        )
        .unwrap();
        mutate::create_session(
            seed.as_mut(),
            NewSession {
                date: Some(date("2026-03-01")),
                topics: vec!["storage".into()],
                plan: Some("storage-swap".into()),
                body: "cache layer spike\n".into(),
                ..Default::default()
            },
        )
        .unwrap();
        seed.close().unwrap();
    }

    let index = open_backend(&ws, Backend::Index);
    let db = open_backend(&ws, Backend::Database);

    let filter = SessionFilter {
        as_of: Some(date("2026-03-01")),
        plan: Some("storage-swap".into()),
        ..Default::default()
    };
    assert_eq!(
        index.query_sessions(&filter).unwrap().count,
        db.query_sessions(&filter).unwrap().count
    );

    let a = index.search("cache", SearchScope::All).unwrap();
    let b = db.search("cache", SearchScope::All).unwrap();
    assert_eq!(a.count, b.count);
    let order_a: Vec<_> = a.matches.iter().map(|m| m.file.clone()).collect();
    let order_b: Vec<_> = b.matches.iter().map(|m| m.file.clone()).collect();
    assert_eq!(order_a, order_b);

    // case folding must agree beyond ASCII too
    let a = index.search("\u{fc}bertragung", SearchScope::All).unwrap();
    let b = db.search("\u{fc}bertragung", SearchScope::All).unwrap();
    assert_eq!(a.count, 1);
    assert_eq!(b.count, 1);
}

#[test]
fn external_edits_picked_up_by_reopen() {
    // documents stay editable by hand; the index catches up on open
    let dir = TempDir::new().unwrap();
    let ws = Workspace::create(dir.path()).unwrap();
    {
        let adapter = open_backend(&ws, Backend::Index);
        assert_eq!(
            adapter
                .query_sessions(&SessionFilter {
                    as_of: Some(date("2026-03-01")),
                    ..Default::default()
                })
                .unwrap()
                .count,
            0
        );
    }

    std::fs::write(
        ws.sessions_dir().join("2026-03-01.md"),
        "+++\ntopics = [\"manual\"]\n+++\n\nwritten in an editor\n",
    )
    .unwrap();

    let adapter = open_backend(&ws, Backend::Index);
    let result = adapter
        .query_sessions(&SessionFilter {
            as_of: Some(date("2026-03-01")),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.sessions[0].topics, vec!["manual"]);
}

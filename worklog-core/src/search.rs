//! Full-text search engine shared by both storage adapters
//!
//! Adapters gather candidate documents for the requested scope; scoring,
//! excerpting, and ordering all happen here so the two backends rank
//! identically.
//!
//! Relevance is term-frequency based: each occurrence of a query term in the
//! body counts 1, each occurrence in the title counts [`TITLE_WEIGHT`]. The
//! score is therefore monotonically non-decreasing in occurrence count.
//! Results are ordered by relevance descending, then document recency
//! descending, then path.

use crate::error::{Error, Result};
use crate::types::{DocKind, SearchMatch, SearchResults, SearchScope};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// How much more a title hit counts than a body hit
const TITLE_WEIGHT: f64 = 3.0;

/// Characters of context on each side of the first match
const EXCERPT_RADIUS: usize = 60;

/// A searchable document as seen by the engine
#[derive(Debug, Clone)]
pub struct SearchDoc {
    pub kind: DocKind,
    pub path: PathBuf,
    pub title: String,
    pub body: String,
    pub recency: DateTime<Utc>,
}

/// Split a query into lowercase terms, failing with `EmptyQuery` before any
/// storage is touched
pub fn query_terms(query: &str) -> Result<Vec<String>> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return Err(Error::EmptyQuery);
    }
    Ok(terms)
}

/// Whether a document kind is visible to a scope
pub fn scope_includes(scope: SearchScope, kind: DocKind) -> bool {
    match scope {
        SearchScope::All => true,
        SearchScope::Plans => kind == DocKind::Plan,
        SearchScope::Sessions => kind == DocKind::Session,
        SearchScope::Learned => kind == DocKind::Learned,
    }
}

/// Rank the given documents against a validated query
pub fn run(query: &str, scope: SearchScope, terms: &[String], docs: &[SearchDoc]) -> SearchResults {
    let mut scored: Vec<(f64, DateTime<Utc>, SearchMatch)> = Vec::new();

    for doc in docs {
        let title = doc.title.to_lowercase();
        let body = doc.body.to_lowercase();

        let mut relevance = 0.0;
        for term in terms {
            relevance += TITLE_WEIGHT * count_occurrences(&title, term) as f64;
            relevance += count_occurrences(&body, term) as f64;
        }
        if relevance == 0.0 {
            continue;
        }

        let context = excerpt(&doc.body, &body, terms)
            .unwrap_or_else(|| truncate_chars(doc.title.trim(), EXCERPT_RADIUS * 2));

        scored.push((
            relevance,
            doc.recency,
            SearchMatch {
                kind: doc.kind,
                file: doc.path.clone(),
                context,
                relevance,
            },
        ));
    }

    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then(b.1.cmp(&a.1))
            .then(a.2.file.cmp(&b.2.file))
    });

    let matches: Vec<SearchMatch> = scored.into_iter().map(|(_, _, m)| m).collect();
    SearchResults {
        query: query.to_string(),
        scope,
        count: matches.len(),
        matches,
    }
}

/// Count non-overlapping occurrences of `term` in `haystack` (both lowercase)
fn count_occurrences(haystack: &str, term: &str) -> usize {
    if term.is_empty() {
        return 0;
    }
    haystack.matches(term).count()
}

/// Short excerpt around the first body occurrence of any query term.
///
/// `body` is the original text, `body_lower` its lowercase form used for
/// matching. Returns None when no term occurs in the body (title-only hit).
fn excerpt(body: &str, body_lower: &str, terms: &[String]) -> Option<String> {
    let hit = terms
        .iter()
        .filter_map(|t| body_lower.find(t.as_str()).map(|i| (i, t.len())))
        .min_by_key(|(i, _)| *i)?;

    let (start_byte, term_len) = hit;
    // lowercasing can change byte lengths for non-ASCII text; clamp the
    // match offset back into the original body
    let start_byte = start_byte.min(body.len());
    let start = floor_char_boundary(body, start_byte.saturating_sub(EXCERPT_RADIUS));
    let end = ceil_char_boundary(
        body,
        (start_byte + term_len + EXCERPT_RADIUS).min(body.len()),
    );

    let mut snippet: String = body[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
    if start > 0 {
        snippet.insert_str(0, "...");
    }
    if end < body.len() {
        snippet.push_str("...");
    }
    Some(snippet)
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(kind: DocKind, path: &str, title: &str, body: &str, recency: &str) -> SearchDoc {
        SearchDoc {
            kind,
            path: PathBuf::from(path),
            title: title.to_string(),
            body: body.to_string(),
            recency: recency.parse().unwrap(),
        }
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(matches!(query_terms(""), Err(Error::EmptyQuery)));
        assert!(matches!(query_terms("   \t\n"), Err(Error::EmptyQuery)));
        assert_eq!(query_terms("Auth Tokens").unwrap(), vec!["auth", "tokens"]);
    }

    #[test]
    fn test_relevance_ordering_is_non_increasing() {
        let docs = vec![
            doc(
                DocKind::Plan,
                "plans/a.md",
                "auth overhaul",
                "auth auth auth",
                "2026-01-01T00:00:00Z",
            ),
            doc(
                DocKind::Plan,
                "plans/b.md",
                "cleanup",
                "mentions auth once",
                "2026-01-02T00:00:00Z",
            ),
            doc(
                DocKind::Session,
                "sessions/2026-01-03.md",
                "2026-01-03",
                "no hits here",
                "2026-01-03T00:00:00Z",
            ),
        ];
        let terms = query_terms("auth").unwrap();
        let results = run("auth", SearchScope::All, &terms, &docs);

        assert_eq!(results.count, 2);
        for pair in results.matches.windows(2) {
            assert!(pair[0].relevance >= pair[1].relevance);
        }
        assert_eq!(results.matches[0].file, PathBuf::from("plans/a.md"));
    }

    #[test]
    fn test_title_hits_outrank_body_hits() {
        let docs = vec![
            doc(
                DocKind::Learned,
                "learned/a.md",
                "retry budget",
                "nothing relevant",
                "2026-01-01T00:00:00Z",
            ),
            doc(
                DocKind::Learned,
                "learned/b.md",
                "misc",
                "retry mentioned twice: retry",
                "2026-01-01T00:00:00Z",
            ),
        ];
        let terms = query_terms("retry").unwrap();
        let results = run("retry", SearchScope::Learned, &terms, &docs);
        assert_eq!(results.matches[0].file, PathBuf::from("learned/a.md"));
    }

    #[test]
    fn test_ties_break_by_recency() {
        let docs = vec![
            doc(
                DocKind::Session,
                "sessions/2026-01-01.md",
                "2026-01-01",
                "keyword",
                "2026-01-01T00:00:00Z",
            ),
            doc(
                DocKind::Session,
                "sessions/2026-01-05.md",
                "2026-01-05",
                "keyword",
                "2026-01-05T00:00:00Z",
            ),
        ];
        let terms = query_terms("keyword").unwrap();
        let results = run("keyword", SearchScope::Sessions, &terms, &docs);
        assert_eq!(
            results.matches[0].file,
            PathBuf::from("sessions/2026-01-05.md")
        );
    }

    #[test]
    fn test_excerpt_surrounds_first_match() {
        let body = format!("{} authentication system {}", "x".repeat(200), "y".repeat(200));
        let terms = vec!["authentication".to_string()];
        let snippet = excerpt(&body, &body.to_lowercase(), &terms).unwrap();
        assert!(snippet.contains("authentication"));
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.len() < body.len());
    }
}

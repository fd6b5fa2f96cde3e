//! Fuzzy search and ranking over the method repository.
//!
//! A record matches when the query is a case-insensitive ordered subsequence
//! of its method name. Matches are ranked by [`score`], which rewards names
//! that are close to the query in edit distance, contain it contiguously
//! early on, start with it, or equal it.

use serde::Serialize;

use crate::fuzzy::{fold, is_subsequence_match, levenshtein_distance};
use crate::repository::MethodRepository;
use crate::MethodRecord;

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: MethodRecord,
    pub score: i64,
}

/// Relevance of `name` for `query`; higher is better.
///
/// Both strings are lowercased first, then:
/// - `(max(len(name), len(query)) - levenshtein(name, query)) * 2`
/// - `+ (len(name) - idx) * 3` if the query occurs contiguously at char `idx`
/// - `+ 10` if the name starts with the query
/// - `+ 20` more if the name equals the query
///
/// # Examples
///
/// ```
/// use rpcfinder::search::score;
///
/// assert_eq!(score("user", "user"), 50);
/// assert_eq!(score("getUserById", "user"), 32);
/// ```
pub fn score(name: &str, query: &str) -> i64 {
    let name = fold(name);
    let query = fold(query);

    let name_len = name.chars().count() as i64;
    let query_len = query.chars().count() as i64;

    let distance = levenshtein_distance(&name, &query) as i64;
    let mut score = (name_len.max(query_len) - distance) * 2;

    if let Some(byte_idx) = name.find(&query) {
        let idx = name[..byte_idx].chars().count() as i64;
        score += (name_len - idx) * 3;
    }

    if name.starts_with(&query) {
        score += 10;
    }

    if name == query {
        score += 20;
    }

    score
}

/// Stateless query surface over a [`MethodRepository`].
///
/// Every call works on one snapshot of the repository, so results are never
/// drawn from a half-applied update.
#[derive(Debug, Clone, Copy)]
pub struct SearchEngine<'a> {
    repository: &'a MethodRepository,
}

impl<'a> SearchEngine<'a> {
    pub fn new(repository: &'a MethodRepository) -> Self {
        Self { repository }
    }

    /// Matching records, best first. Blank queries match nothing.
    pub fn search(&self, query: &str) -> Vec<MethodRecord> {
        self.search_scored(query).into_iter().map(|hit| hit.record).collect()
    }

    /// Like [`search`](Self::search), keeping at most `limit` results.
    pub fn search_limited(&self, query: &str, limit: usize) -> Vec<MethodRecord> {
        let mut results = self.search(query);
        results.truncate(limit);
        results
    }

    /// Matching records with their scores, best first.
    ///
    /// Equal scores are ordered by method name, then class name, so output is
    /// stable across runs.
    pub fn search_scored(&self, query: &str) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let snapshot = self.repository.snapshot();
        let mut hits: Vec<SearchHit> = snapshot
            .iter()
            .filter(|record| is_subsequence_match(&record.method_name, query))
            .map(|record| SearchHit {
                score: score(&record.method_name, query),
                record: record.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.record.method_name.cmp(&b.record.method_name))
                .then_with(|| a.record.class_name.cmp(&b.record.class_name))
                .then_with(|| a.record.text_offset.cmp(&b.record.text_offset))
        });
        hits
    }

    /// Every record, unranked.
    pub fn list_all(&self) -> Vec<MethodRecord> {
        self.repository.list_all()
    }
}

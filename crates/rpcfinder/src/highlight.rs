//! Subsequence highlighting for search results.

use crate::fuzzy::scan_positions;

/// Wrap the chars of `candidate` matched by `query` in `open`/`close` markers.
///
/// Matching is the same greedy, case-insensitive subsequence scan used by
/// search ([`crate::fuzzy::match_positions`]). Each maximal run of consecutive
/// matched chars gets a single marker pair. If the scan runs out of candidate
/// before the query is consumed, the chars matched so far are still marked.
///
/// Empty query or empty candidate returns the candidate unchanged.
///
/// # Examples
///
/// ```
/// use rpcfinder::highlight;
///
/// assert_eq!(highlight("getUser", "gtu", "<b>", "</b>"), "<b>g</b>e<b>tU</b>ser");
/// assert_eq!(highlight("getUser", "", "<b>", "</b>"), "getUser");
/// ```
pub fn highlight(candidate: &str, query: &str, open: &str, close: &str) -> String {
    if query.is_empty() || candidate.is_empty() {
        return candidate.to_string();
    }

    let matched = matched_mask(candidate, query);

    let mut out = String::with_capacity(candidate.len() + open.len() + close.len());
    let mut in_run = false;

    for (c, hit) in candidate.chars().zip(matched) {
        if hit && !in_run {
            out.push_str(open);
            in_run = true;
        } else if !hit && in_run {
            out.push_str(close);
            in_run = false;
        }
        out.push(c);
    }

    if in_run {
        out.push_str(close);
    }

    out
}

/// Per-char match flags for `candidate`.
///
/// A complete match marks exactly what search matched; a partial match marks
/// the prefix of the query that was found.
fn matched_mask(candidate: &str, query: &str) -> Vec<bool> {
    let mut mask = vec![false; candidate.chars().count()];
    let (positions, _) = scan_positions(candidate, query);
    for i in positions {
        mask[i] = true;
    }
    mask
}

/// Number of chars `highlight` would mark.
pub fn highlighted_count(candidate: &str, query: &str) -> usize {
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }
    matched_mask(candidate, query).into_iter().filter(|m| *m).count()
}

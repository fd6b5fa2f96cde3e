//! Fuzzy string matching primitives shared by search and highlighting.
//!
//! Provides case-insensitive ordered-subsequence matching and Levenshtein
//! distance. Search decides hits with [`match_positions`] and the highlighter
//! marks the very same positions, so the two can never disagree.

/// Lowercase a single character without changing string length.
///
/// Multi-char lowercase expansions keep their first char so that positions in
/// the folded string line up with positions in the original.
#[inline]
pub fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Lowercase a string one char at a time (length-preserving, see [`fold_char`]).
pub fn fold(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

/// Greedy left-to-right subsequence scan.
///
/// Walks the candidate once, advancing the query pointer only when the
/// current candidate char matches it. Returns the char indices of matched
/// candidate chars when every query char was consumed, otherwise `None`.
///
/// An empty query matches trivially with no positions.
///
/// # Examples
///
/// ```
/// use rpcfinder::fuzzy::match_positions;
///
/// assert_eq!(match_positions("getUser", "gtu"), Some(vec![0, 2, 3]));
/// assert_eq!(match_positions("setName", "gtu"), None);
/// ```
pub fn match_positions(candidate: &str, query: &str) -> Option<Vec<usize>> {
    let (positions, complete) = scan_positions(candidate, query);
    complete.then_some(positions)
}

/// The raw greedy walk behind [`match_positions`].
///
/// Returns the matched candidate char indices and whether the whole query was
/// consumed. On a miss the positions cover the longest matched query prefix.
pub fn scan_positions(candidate: &str, query: &str) -> (Vec<usize>, bool) {
    let query: Vec<char> = query.chars().map(fold_char).collect();
    let mut positions = Vec::with_capacity(query.len());
    let mut next = 0;

    for (i, c) in candidate.chars().enumerate() {
        if next == query.len() {
            break;
        }
        if fold_char(c) == query[next] {
            positions.push(i);
            next += 1;
        }
    }

    let complete = next == query.len();
    (positions, complete)
}

/// Whether `query` is a case-insensitive ordered subsequence of `candidate`.
#[must_use]
pub fn is_subsequence_match(candidate: &str, query: &str) -> bool {
    match_positions(candidate, query).is_some()
}

/// Calculate the Levenshtein (edit) distance between two strings.
///
/// The edit distance is the minimum number of single-character edits
/// (insertions, deletions, or substitutions) required to transform
/// one string into another.
///
/// # Examples
///
/// ```
/// use rpcfinder::fuzzy::levenshtein_distance;
///
/// assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
/// assert_eq!(levenshtein_distance("", "abc"), 3);
/// assert_eq!(levenshtein_distance("abc", "abc"), 0);
/// ```
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Two rows of the DP table are enough
    let mut prev_row: Vec<usize> = (0..=n).collect();
    let mut curr_row: Vec<usize> = vec![0; n + 1];

    for i in 1..=m {
        curr_row[0] = i;

        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] {
                0
            } else {
                1
            };

            curr_row[j] = (prev_row[j] + 1) // deletion
                .min(curr_row[j - 1] + 1) // insertion
                .min(prev_row[j - 1] + cost); // substitution
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein_distance("hello", "hello"), 0);
        assert_eq!(levenshtein_distance("", ""), 0);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
    }

    #[test]
    fn test_levenshtein_single_edit() {
        assert_eq!(levenshtein_distance("cat", "bat"), 1);
        assert_eq!(levenshtein_distance("cat", "cats"), 1);
        assert_eq!(levenshtein_distance("cats", "cat"), 1);
    }

    #[test]
    fn test_levenshtein_method_names() {
        assert_eq!(levenshtein_distance("getuserbyid", "user"), 7);
        assert_eq!(levenshtein_distance("user", "user"), 0);
        assert_eq!(levenshtein_distance("getusernmae", "getusername"), 2);
    }

    #[test]
    fn test_levenshtein_case_sensitive() {
        // Callers fold case first; the distance itself is exact
        assert_eq!(levenshtein_distance("User", "user"), 1);
    }

    #[test]
    fn test_match_positions_in_order() {
        assert_eq!(match_positions("getUser", "gtu"), Some(vec![0, 2, 3]));
        assert_eq!(match_positions("getUser", "GETUSER"), Some((0..7).collect()));
    }

    #[test]
    fn test_match_positions_requires_order() {
        // no 't' after the only 'u'
        assert_eq!(match_positions("tu", "ut"), None);
        assert!(!is_subsequence_match("setName", "gtu"));
        assert!(!is_subsequence_match("createUser", "gtu"));
    }

    #[test]
    fn test_match_positions_is_greedy() {
        // First 'a' is taken even though a later one would make a tighter run
        assert_eq!(match_positions("abab", "ab"), Some(vec![0, 1]));
        assert_eq!(match_positions("axxab", "ab"), Some(vec![0, 4]));
    }

    #[test]
    fn test_match_positions_empty_inputs() {
        assert_eq!(match_positions("anything", ""), Some(vec![]));
        assert_eq!(match_positions("", "a"), None);
    }

    #[test]
    fn test_fold_preserves_length() {
        let s = "İstanbulService";
        assert_eq!(fold(s).chars().count(), s.chars().count());
        assert_eq!(fold("GetUser"), "getuser");
    }
}

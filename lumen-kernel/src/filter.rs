//! Result filtering - the fuzzy-match collaborator boundary.

/// Scores candidates against a query. Higher ranks sort earlier.
///
/// Scoring internals are the collaborator's concern; the kernel only relies
/// on `None` meaning "not matched" and on the empty query matching
/// everything.
pub trait Matcher {
    fn score(&self, query: &str, candidate: &str) -> Option<i64>;
}

/// Case-insensitive subsequence matcher, preferring contiguous and
/// early matches.
#[derive(Debug, Default)]
pub struct SubsequenceMatcher;

impl Matcher for SubsequenceMatcher {
    fn score(&self, query: &str, candidate: &str) -> Option<i64> {
        if query.is_empty() {
            return Some(0);
        }

        let query: Vec<char> = query.chars().flat_map(|c| c.to_lowercase()).collect();
        let candidate: Vec<char> = candidate.chars().flat_map(|c| c.to_lowercase()).collect();

        let mut qi = 0;
        let mut score: i64 = 0;
        let mut last_match: Option<usize> = None;

        for (ci, &ch) in candidate.iter().enumerate() {
            if qi < query.len() && ch == query[qi] {
                score += match last_match {
                    Some(prev) if ci == prev + 1 => 3,
                    Some(_) => 1,
                    None => 2,
                };
                // Matches near the start rank higher.
                if ci < 4 {
                    score += 1;
                }
                last_match = Some(ci);
                qi += 1;
            }
        }

        if qi == query.len() {
            Some(score)
        } else {
            None
        }
    }
}

/// Filter `candidates` by label, preserving input order between equal ranks.
///
/// Returns indices into `candidates`, best rank first. An empty query passes
/// every candidate in the original order.
pub fn filter_ranked<T>(
    matcher: &dyn Matcher,
    query: &str,
    candidates: &[T],
    label: impl Fn(&T) -> &str,
) -> Vec<usize> {
    if query.is_empty() {
        return (0..candidates.len()).collect();
    }

    let mut ranked: Vec<(i64, usize)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, c)| matcher.score(query, label(c)).map(|s| (s, i)))
        .collect();

    // Stable sort keeps input order for equal ranks.
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().map(|(_, i)| i).collect()
}

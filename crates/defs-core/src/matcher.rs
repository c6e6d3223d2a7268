use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// Scores a name against a query. None means no match.
pub trait NameMatcher: Send + Sync {
    fn score(&self, name: &str, query: &str) -> Option<i64>;
}

/// Skim-style subsequence matching.
pub struct FuzzyNameMatcher {
    inner: SkimMatcherV2,
}

impl FuzzyNameMatcher {
    pub fn new(ignore_case: bool) -> Self {
        let inner = if ignore_case {
            SkimMatcherV2::default().ignore_case()
        } else {
            SkimMatcherV2::default().respect_case()
        };
        FuzzyNameMatcher { inner }
    }
}

impl Default for FuzzyNameMatcher {
    fn default() -> Self {
        FuzzyNameMatcher::new(true)
    }
}

impl NameMatcher for FuzzyNameMatcher {
    fn score(&self, name: &str, query: &str) -> Option<i64> {
        self.inner.fuzzy_match(name, query)
    }
}

/// Keep the items whose name matches `query`, best score first.
///
/// Equal scores keep their input order. An empty query matches nothing.
pub fn rank_by_name<T, F>(matcher: &dyn NameMatcher, query: &str, items: Vec<T>, name: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if query.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(i64, T)> = items
        .into_iter()
        .filter_map(|item| matcher.score(name(&item), query).map(|s| (s, item)))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&'static str], query: &str) -> Vec<&'static str> {
        let matcher = FuzzyNameMatcher::default();
        rank_by_name(&matcher, query, items.to_vec(), |s| *s)
    }

    #[test]
    fn test_exact_name_matches() {
        let result = names(&["notes.txt", "report.pdf", "photo.png"], "report.pdf");
        assert_eq!(result.first(), Some(&"report.pdf"));
    }

    #[test]
    fn test_no_match() {
        assert!(names(&["notes.txt", "report.pdf"], "zzz").is_empty());
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        assert!(names(&["notes.txt"], "").is_empty());
    }

    #[test]
    fn test_subsequence_match() {
        let result = names(&["documents", "images", "downloads"], "dcm");
        assert_eq!(result, vec!["documents"]);
    }

    #[test]
    fn test_case_sensitivity() {
        let insensitive = FuzzyNameMatcher::new(true);
        let sensitive = FuzzyNameMatcher::new(false);
        assert!(insensitive.score("README.md", "readme").is_some());
        assert!(sensitive.score("README.md", "readme").is_none());
    }

    #[test]
    fn test_better_match_ranks_first() {
        let result = names(&["a_r_c_h_i_v_e", "archive"], "archive");
        assert_eq!(result, vec!["archive", "a_r_c_h_i_v_e"]);
    }
}

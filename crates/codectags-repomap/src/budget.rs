use codectags_core::SizeMetric;

use crate::output::to_tree;
use crate::select::Entry;

/// Render the longest prefix of `entries` whose tree fits in `max_size`.
///
/// `entries` must be ordered by importance. Rendered size never shrinks as
/// the prefix grows, so the largest fitting prefix is found by binary search.
/// Without a budget the whole list is rendered; if not even one entry fits
/// the result is empty.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codectags_repomap::budget::{char_count, fit_to_budget};
/// use codectags_repomap::select::Entry;
///
/// let entries = vec![
///     Entry::FileOnly(PathBuf::from("a.py")),
///     Entry::FileOnly(PathBuf::from("b.py")),
/// ];
/// assert_eq!(fit_to_budget(&entries, Some(6), char_count), "a.py:\n");
/// assert_eq!(fit_to_budget(&entries, None, char_count), "a.py:\nb.py:\n");
/// assert_eq!(fit_to_budget(&entries, Some(2), char_count), "");
/// ```
pub fn fit_to_budget(
    entries: &[Entry],
    max_size: Option<usize>,
    size_of: impl Fn(&str) -> usize,
) -> String {
    fit_prefix(entries, max_size, size_of).1
}

/// Like [`fit_to_budget`], also returning how many entries were kept.
pub fn fit_prefix(
    entries: &[Entry],
    max_size: Option<usize>,
    size_of: impl Fn(&str) -> usize,
) -> (usize, String) {
    let Some(max_size) = max_size else {
        return (entries.len(), to_tree(entries));
    };

    let mut best = (0, String::new());
    let mut lower = 0;
    let mut upper = entries.len();

    while lower <= upper {
        let middle = lower + (upper - lower) / 2;
        let tree = to_tree(&entries[..middle]);
        if size_of(&tree) <= max_size {
            best = (middle, tree);
            lower = middle + 1;
        } else if middle == 0 {
            break;
        } else {
            upper = middle - 1;
        }
    }

    tracing::debug!(
        kept = best.0,
        total = entries.len(),
        max_size,
        "fitted map to budget"
    );
    best
}

/// Size in characters.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Rough token count, about four characters per token.
///
/// # Examples
///
/// ```
/// use codectags_repomap::budget::estimate_tokens;
///
/// assert_eq!(estimate_tokens("fn main() {}"), 3);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    char_count(text) / 4
}

/// Size function for a configured metric.
pub fn size_fn(metric: SizeMetric) -> fn(&str) -> usize {
    match metric {
        SizeMetric::Tokens => estimate_tokens,
        SizeMetric::Chars => char_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_entries(n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| Entry::Definition {
                file: PathBuf::from(format!("pkg/mod{}.py", i % 3)),
                scope: None,
                kind: "function".into(),
                rendered_name: format!("f{i} (x)"),
            })
            .collect()
    }

    #[test]
    fn budget_selects_largest_fitting_prefix() {
        let entries = make_entries(10);
        let max = char_count(&to_tree(&entries[..4]));

        let (kept, text) = fit_prefix(&entries, Some(max), char_count);
        assert_eq!(kept, 4);
        assert_eq!(text, to_tree(&entries[..4]));
        assert!(char_count(&to_tree(&entries[..5])) > max);
    }

    #[test]
    fn token_estimate_counts_characters() {
        // 8 characters, 16 bytes.
        let text = "\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}";
        assert_eq!(text.len(), 16);
        assert_eq!(estimate_tokens(text), 2);
        assert_eq!(estimate_tokens("abc"), 0);
    }

    #[test]
    fn budget_zero_returns_empty() {
        let entries = make_entries(3);
        assert_eq!(fit_to_budget(&entries, Some(0), char_count), "");
    }

    #[test]
    fn no_budget_renders_everything() {
        let entries = make_entries(7);
        assert_eq!(fit_to_budget(&entries, None, char_count), to_tree(&entries));
    }

    #[test]
    fn budget_larger_than_all_returns_all() {
        let entries = make_entries(5);
        let (kept, _) = fit_prefix(&entries, Some(1_000_000), estimate_tokens);
        assert_eq!(kept, 5);
    }

    #[test]
    fn empty_entries_fit_any_budget() {
        assert_eq!(fit_prefix(&[], Some(0), char_count), (0, String::new()));
    }

    #[test]
    fn rendered_size_is_monotone_in_prefix_length() {
        let entries = make_entries(12);
        let sizes: Vec<usize> = (0..=entries.len())
            .map(|k| char_count(&to_tree(&entries[..k])))
            .collect();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]), "{sizes:?}");
    }

    #[test]
    fn result_never_exceeds_budget() {
        let entries = make_entries(20);
        for max in [1, 10, 25, 60, 150, 400] {
            let text = fit_to_budget(&entries, Some(max), char_count);
            assert!(char_count(&text) <= max, "max {max}: {text:?}");
        }
    }

    #[test]
    fn size_fn_follows_metric() {
        let text = "abcdefgh";
        assert_eq!(size_fn(SizeMetric::Chars)(text), 8);
        assert_eq!(size_fn(SizeMetric::Tokens)(text), 2);
    }
}

use std::fmt::Write;
use std::path::PathBuf;

use crate::select::{path_components, Entry};

/// Longest component printed on a single line, in bytes.
const MAX_COMPONENT_LEN: usize = 200;

/// Render entries as a tab-indented tree.
///
/// Rows are sorted before rendering, so the input order does not matter.
/// Components shared with the previous row are printed once.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codectags_repomap::output::to_tree;
/// use codectags_repomap::select::Entry;
///
/// let entries = vec![
///     Entry::Definition {
///         file: PathBuf::from("src/a.py"),
///         scope: None,
///         kind: "function".into(),
///         rendered_name: "foo ()".into(),
///     },
///     Entry::FileOnly(PathBuf::from("src/b.py")),
/// ];
/// assert_eq!(to_tree(&entries), "src/\n\ta.py:\n\t\tfunction\n\t\t\tfoo ()\n\tb.py:\n");
/// assert_eq!(to_tree(&[]), "");
/// ```
pub fn to_tree(entries: &[Entry]) -> String {
    render_rows(entries.iter().map(Entry::components).collect())
}

/// Render raw component rows; see [`to_tree`].
pub fn render_rows(mut rows: Vec<Vec<String>>) -> String {
    rows.sort();
    rows.dedup();

    let mut out = String::new();
    let mut last: &[String] = &[];

    for row in &rows {
        let common = last
            .iter()
            .zip(row.iter())
            .take_while(|(a, b)| a == b)
            .count();

        for (depth, item) in row.iter().enumerate().skip(common) {
            for _ in 0..depth {
                out.push('\t');
            }
            let _ = writeln!(out, "{}", truncate_component(item, MAX_COMPONENT_LEN));
        }
        last = row;
    }

    out
}

/// Flat tree of file paths, used when no ranking is possible.
///
/// File names carry no trailing `:` since no definitions follow them.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codectags_repomap::output::render_fallback;
///
/// let files = [PathBuf::from("b.txt"), PathBuf::from("a/x.md")];
/// assert_eq!(render_fallback(&files), "a/\n\tx.md\nb.txt\n");
/// ```
pub fn render_fallback<'a>(files: impl IntoIterator<Item = &'a PathBuf>) -> String {
    render_rows(
        files
            .into_iter()
            .map(|f| path_components(f, false))
            .collect(),
    )
}

fn truncate_component(item: &str, max_len: usize) -> &str {
    if item.len() <= max_len {
        return item;
    }
    let mut end = max_len;
    while end > 0 && !item.is_char_boundary(end) {
        end -= 1;
    }
    &item[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(file: &str, kind: &str, name: &str) -> Entry {
        Entry::Definition {
            file: PathBuf::from(file),
            scope: None,
            kind: kind.into(),
            rendered_name: name.into(),
        }
    }

    fn rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn empty_renders_nothing() {
        assert_eq!(to_tree(&[]), "");
        assert_eq!(render_rows(Vec::new()), "");
    }

    #[test]
    fn shared_prefixes_printed_once() {
        let out = render_rows(rows(&[
            &["a.py:", "function", "foo"],
            &["a.py:", "function", "bar"],
            &["a.py:", "class", "Baz"],
        ]));
        assert_eq!(
            out,
            "a.py:\n\tclass\n\t\tBaz\n\tfunction\n\t\tbar\n\t\tfoo\n"
        );
    }

    #[test]
    fn rows_of_different_lengths() {
        let out = render_rows(rows(&[
            &["lib/", "x.rs:"],
            &["lib/", "x.rs:", "Parser", "method", "parse"],
            &["main.rs:"],
        ]));
        assert_eq!(
            out,
            "lib/\n\tx.rs:\n\t\tParser\n\t\t\tmethod\n\t\t\t\tparse\nmain.rs:\n"
        );
    }

    #[test]
    fn duplicates_render_once() {
        let entries = vec![def("a.py", "function", "f"), def("a.py", "function", "f")];
        assert_eq!(to_tree(&entries), "a.py:\n\tfunction\n\t\tf\n");
    }

    #[test]
    fn input_order_does_not_matter() {
        let entries = vec![
            def("z/b.py", "function", "run ()"),
            Entry::FileOnly(PathBuf::from("a.md")),
            def("z/a.py", "class", "A"),
            def("z/a.py", "function", "helper (x)"),
            Entry::FileOnly(PathBuf::from("z/a.py")),
        ];
        let expected = to_tree(&entries);

        let mut reversed = entries.clone();
        reversed.reverse();
        assert_eq!(to_tree(&reversed), expected);

        let mut rotated = entries.clone();
        rotated.rotate_left(2);
        assert_eq!(to_tree(&rotated), expected);
    }

    #[test]
    fn file_only_entry_merges_with_its_definitions() {
        let entries = vec![
            Entry::FileOnly(PathBuf::from("a.py")),
            def("a.py", "function", "foo"),
        ];
        assert_eq!(to_tree(&entries), "a.py:\n\tfunction\n\t\tfoo\n");
    }

    #[test]
    fn long_components_truncated() {
        let long = "x".repeat(MAX_COMPONENT_LEN + 50);
        let out = to_tree(&[def("a.py", "variable", &long)]);
        let last = out.lines().last().unwrap();
        assert_eq!(last.trim_start_matches('\t').len(), MAX_COMPONENT_LEN);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "h\u{e9}llo";
        // 'é' is two bytes; byte 2 is inside it.
        assert_eq!(truncate_component(s, 2), "h");
    }

    #[test]
    fn fallback_lists_every_file() {
        let files = vec![
            PathBuf::from("src/main.rs"),
            PathBuf::from("src/lib.rs"),
            PathBuf::from("Cargo.toml"),
        ];
        assert_eq!(
            render_fallback(&files),
            "Cargo.toml\nsrc/\n\tlib.rs\n\tmain.rs\n"
        );
    }
}

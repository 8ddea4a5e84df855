use std::path::Path;

use tree_sitter::Parser;

use crate::walker::Language;

/// Extracts identifier tokens from file content.
///
/// Tokens are opaque strings; a token referencing an identifier is simply one
/// that is equal to it. Implementations return an empty list when the file
/// type is not understood.
pub trait Tokenizer: Send + Sync {
    /// All identifier tokens in `content`, in source order, duplicates kept.
    fn identifier_tokens(&self, path: &Path, content: &str) -> Vec<String>;
}

/// Tokenizer that parses with the bundled tree-sitter grammars and keeps
/// every identifier-like leaf node, definition sites included.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use codectags_repomap::tokenizer::{Tokenizer, TreeSitterTokenizer};
///
/// let tokens = TreeSitterTokenizer.identifier_tokens(
///     Path::new("main.rs"),
///     "fn main() { hello(); }",
/// );
/// assert_eq!(tokens, vec!["main", "hello"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterTokenizer;

impl Tokenizer for TreeSitterTokenizer {
    fn identifier_tokens(&self, path: &Path, content: &str) -> Vec<String> {
        let Some(ts_language) = Language::from_path(path).tree_sitter_language() else {
            return Vec::new();
        };

        let mut parser = Parser::new();
        if let Err(err) = parser.set_language(&ts_language) {
            tracing::warn!(path = %path.display(), %err, "failed to load grammar");
            return Vec::new();
        }

        let Some(tree) = parser.parse(content, None) else {
            return Vec::new();
        };

        let source = content.as_bytes();
        let mut tokens = Vec::new();
        let mut cursor = tree.walk();

        loop {
            let node = cursor.node();
            if node.child_count() == 0 && is_identifier_kind(node.kind()) {
                if let Ok(text) = node.utf8_text(source) {
                    if !text.is_empty() {
                        tokens.push(text.to_string());
                    }
                }
            }

            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return tokens;
                }
            }
        }
    }
}

/// Leaf kinds that name something across the bundled grammars.
fn is_identifier_kind(kind: &str) -> bool {
    kind.ends_with("identifier") || matches!(kind, "constant" | "name" | "variable_name")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(path: &str, content: &str) -> Vec<String> {
        TreeSitterTokenizer.identifier_tokens(Path::new(path), content)
    }

    #[test]
    fn rust_tokens_include_paths_and_types() {
        let toks = tokens(
            "src/lib.rs",
            "fn build(cfg: Config) -> Graph { Graph::new(cfg) }",
        );
        for expected in ["build", "cfg", "Config", "Graph", "new"] {
            assert!(toks.iter().any(|t| t == expected), "missing {expected}: {toks:?}");
        }
    }

    #[test]
    fn python_tokens_keep_duplicates() {
        let toks = tokens("b.py", "from a import foo\nfoo()\nfoo()\n");
        let count = toks.iter().filter(|t| t.as_str() == "foo").count();
        assert_eq!(count, 3);
    }

    #[test]
    fn unknown_language_yields_nothing() {
        assert!(tokens("notes.txt", "foo bar baz").is_empty());
        assert!(tokens("Makefile", "all: build").is_empty());
    }

    #[test]
    fn empty_content_yields_nothing() {
        assert!(tokens("empty.py", "").is_empty());
    }

    #[test]
    fn keywords_are_not_identifiers() {
        let toks = tokens("k.py", "def run():\n    return None\n");
        assert!(!toks.iter().any(|t| t == "def" || t == "return"));
        assert!(toks.iter().any(|t| t == "run"));
    }
}

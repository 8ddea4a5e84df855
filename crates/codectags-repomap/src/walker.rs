use std::path::{Path, PathBuf};
use std::time::SystemTime;

use codectags_core::CtagsError;

/// Maximum file size to consider (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// Programming language detected from file extension.
///
/// Only languages with a bundled tree-sitter grammar are recognized; the
/// tokenizer yields nothing for [`Language::Unknown`].
///
/// # Examples
///
/// ```
/// use codectags_repomap::walker::Language;
///
/// assert_eq!(Language::from_extension("rs"), Language::Rust);
/// assert_eq!(Language::from_extension("py"), Language::Python);
/// assert_eq!(Language::from_extension("kt"), Language::Kotlin);
/// assert_eq!(Language::from_extension("txt"), Language::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    Php,
    Kotlin,
    Swift,
    Unknown,
}

impl Language {
    /// Detect language from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "rs" => Language::Rust,
            "py" | "pyi" => Language::Python,
            "ts" | "tsx" => Language::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Language::Cpp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            _ => Language::Unknown,
        }
    }

    /// Detect language from a path's extension.
    ///
    /// ```
    /// use std::path::Path;
    /// use codectags_repomap::walker::Language;
    ///
    /// assert_eq!(Language::from_path(Path::new("src/app.tsx")), Language::TypeScript);
    /// assert_eq!(Language::from_path(Path::new("Makefile")), Language::Unknown);
    /// ```
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Get the tree-sitter language grammar for this language.
    ///
    /// Returns `None` for `Language::Unknown`.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Language::C => Some(tree_sitter_c::LANGUAGE.into()),
            Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
            Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }
}

/// Last modification time of `path`, or `None` if the file is inaccessible.
///
/// A `None` result means the file is left out of ranking for this run.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use codectags_repomap::walker::modification_time;
///
/// assert!(modification_time(Path::new("/definitely/not/here.rs")).is_none());
/// ```
pub fn modification_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

/// Walk a repository, respecting `.gitignore`, returning candidate files.
///
/// Every regular text file is a candidate: ctags understands far more
/// languages than the tokenizer does, so the extension is not checked here.
/// Skips binary files and files larger than 1 MB. Returned paths are relative
/// to `root` and sorted.
///
/// # Errors
///
/// Returns [`CtagsError::FileNotFound`] if `root` is not a directory.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use codectags_repomap::walker::walk_repo;
///
/// let files = walk_repo(Path::new(".")).unwrap();
/// for f in &files {
///     println!("{}", f.display());
/// }
/// ```
pub fn walk_repo(root: &Path) -> Result<Vec<PathBuf>, CtagsError> {
    if !root.is_dir() {
        return Err(CtagsError::FileNotFound(root.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(root).build();
    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::debug!(%err, "skipping unreadable walk entry");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.len() > MAX_FILE_SIZE {
            tracing::debug!(path = %path.display(), "skipping oversized file");
            continue;
        }

        if looks_binary(path) {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };

        files.push(relative);
    }

    files.sort();
    Ok(files)
}

/// Null byte in the first 8 KB means binary. Unreadable files count as binary.
fn looks_binary(path: &Path) -> bool {
    use std::io::Read;

    let Ok(mut file) = std::fs::File::open(path) else {
        return true;
    };
    let mut buf = vec![0u8; BINARY_CHECK_SIZE];
    let Ok(read) = file.read(&mut buf) else {
        return true;
    };
    buf[..read].contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_temp_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/lib.py"), "def hello(): pass").unwrap();
        fs::write(root.join("src/app.ts"), "function run() {}").unwrap();
        fs::write(root.join("README.md"), "# Hello").unwrap();

        dir
    }

    #[test]
    fn walk_finds_text_files_sorted() {
        let dir = make_temp_repo();
        let files = walk_repo(dir.path()).unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("src/app.ts"),
                PathBuf::from("src/lib.py"),
                PathBuf::from("src/main.rs"),
            ]
        );
    }

    #[test]
    fn walk_respects_gitignore() {
        let dir = make_temp_repo();
        let root = dir.path();

        // The ignore crate needs a .git dir to recognize .gitignore files
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/output.rs"), "fn ignored() {}").unwrap();
        fs::write(root.join(".gitignore"), "build/\n").unwrap();

        let files = walk_repo(root).unwrap();
        for p in &files {
            assert!(
                !p.starts_with("build"),
                "gitignored file should be skipped: {}",
                p.display()
            );
        }
    }

    #[test]
    fn walk_skips_binary_and_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut binary_content = b"fn main() { ".to_vec();
        binary_content.push(0);
        binary_content.extend_from_slice(b" }");
        fs::write(root.join("binary.rs"), &binary_content).unwrap();
        fs::write(root.join("huge.rs"), "x".repeat(1_048_577)).unwrap();
        fs::write(root.join("normal.rs"), "fn normal() {}").unwrap();

        let files = walk_repo(root).unwrap();
        assert_eq!(files, vec![PathBuf::from("normal.rs")]);
    }

    #[test]
    fn walk_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            walk_repo(&missing),
            Err(CtagsError::FileNotFound(_))
        ));
    }

    #[test]
    fn modification_time_of_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "x = 1").unwrap();
        assert!(modification_time(&path).is_some());
    }
}

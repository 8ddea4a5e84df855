use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use codectags_core::CtagsError;
use serde::{Deserialize, Serialize};

/// Source tagged by the installation check.
const TRIAL_SOURCE: &str = "def hello():\n    print('Hello, world!')\n";

/// One definition reported by the tagger.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codectags_repomap::tags::TagRecord;
///
/// let tag = TagRecord {
///     file: PathBuf::from("app/models.py"),
///     scope: Some("User".into()),
///     kind: "member".into(),
///     name: "save".into(),
///     signature: Some("(self, commit=True)".into()),
/// };
/// assert_eq!(tag.rendered_name(), "save (self, commit=True)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// File path relative to the repository root.
    pub file: PathBuf,
    /// Enclosing scope (class, module, namespace), if any.
    pub scope: Option<String>,
    /// Tagger kind, e.g. `function`, `class`, `variable`.
    pub kind: String,
    /// Defined identifier.
    pub name: String,
    /// Parameter list or type signature, if the tagger reports one.
    pub signature: Option<String>,
}

impl TagRecord {
    /// Name followed by the signature, as shown in the map.
    pub fn rendered_name(&self) -> String {
        match &self.signature {
            Some(sig) if !sig.is_empty() => format!("{} {sig}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// Source of definition records for a single file.
///
/// `path` is where the file can be read; `rel_path` is the repository-relative
/// path recorded in every returned [`TagRecord`].
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Tag one file.
    ///
    /// # Errors
    ///
    /// Returns [`CtagsError::Tagger`] if the tool cannot be run or fails.
    async fn tag(&self, path: &Path, rel_path: &Path) -> Result<Vec<TagRecord>, CtagsError>;

    /// Whether the tagger can be used at all in this environment.
    async fn is_available(&self) -> bool {
        true
    }
}

/// Tagger backed by a Universal Ctags binary with JSON output support.
#[derive(Debug, Clone)]
pub struct CtagsTagger {
    bin: String,
    encoding: String,
}

impl CtagsTagger {
    /// Create a tagger that runs `bin` and reads sources as `encoding`.
    pub fn new(bin: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            encoding: encoding.into(),
        }
    }

    /// Binary this tagger invokes.
    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// Check that the binary is a JSON-capable Universal Ctags that can tag
    /// a small Python file, and return the first line of `--version`.
    ///
    /// # Errors
    ///
    /// Returns [`CtagsError::Tagger`] if the binary is missing, is not
    /// Universal Ctags, was built without `+json`, or fails the trial run.
    pub async fn check_install(&self) -> Result<String, CtagsError> {
        let output = tokio::process::Command::new(&self.bin)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CtagsError::Tagger(format!("failed to run {}: {e}", self.bin)))?;

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        let lower = text.to_lowercase();
        if !lower.contains("universal ctags") {
            return Err(CtagsError::Tagger(format!(
                "{} is not Universal Ctags",
                self.bin
            )));
        }
        if !lower.contains("+json") {
            return Err(CtagsError::Tagger(format!(
                "{} was built without JSON output support",
                self.bin
            )));
        }

        self.trial_run().await?;
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    async fn trial_run(&self) -> Result<(), CtagsError> {
        let dir = tempfile::tempdir()?;
        let hello = dir.path().join("hello.py");
        tokio::fs::write(&hello, TRIAL_SOURCE).await?;
        self.tag(&hello, Path::new("hello.py"))
            .await
            .map_err(|e| CtagsError::Tagger(format!("{} failed a trial run: {e}", self.bin)))?;
        Ok(())
    }
}

#[async_trait]
impl Tagger for CtagsTagger {
    async fn tag(&self, path: &Path, rel_path: &Path) -> Result<Vec<TagRecord>, CtagsError> {
        let output = tokio::process::Command::new(&self.bin)
            .arg("--fields=+S")
            .arg("--extras=-F")
            .arg("--output-format=json")
            .arg(format!("--input-encoding={}", self.encoding))
            .arg("--output-encoding=utf-8")
            .arg("-f")
            .arg("-")
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CtagsError::Tagger(format!("failed to run {}: {e}", self.bin)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CtagsError::Tagger(format!(
                "{} exited with {} on {}: {}",
                self.bin,
                output.status,
                path.display(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ctags_json(&stdout, rel_path))
    }

    async fn is_available(&self) -> bool {
        match self.check_install().await {
            Ok(version) => {
                tracing::debug!(%version, "ctags available");
                true
            }
            Err(err) => {
                tracing::warn!(%err, "ctags unavailable, ranked map disabled");
                false
            }
        }
    }
}

/// Tagger serving records that were computed elsewhere, keyed by the
/// repository-relative path in each record.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use codectags_repomap::tags::{StaticTagger, TagRecord, Tagger};
///
/// let tagger = StaticTagger::new(vec![TagRecord {
///     file: PathBuf::from("a.py"),
///     scope: None,
///     kind: "function".into(),
///     name: "foo".into(),
///     signature: None,
/// }]);
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let tags = rt
///     .block_on(tagger.tag(Path::new("/repo/a.py"), Path::new("a.py")))
///     .unwrap();
/// assert_eq!(tags.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct StaticTagger {
    by_file: HashMap<PathBuf, Vec<TagRecord>>,
    available: bool,
}

impl StaticTagger {
    /// Serve `records`, grouped by their `file`.
    pub fn new(records: Vec<TagRecord>) -> Self {
        let mut by_file: HashMap<PathBuf, Vec<TagRecord>> = HashMap::new();
        for record in records {
            by_file.entry(record.file.clone()).or_default().push(record);
        }
        Self {
            by_file,
            available: true,
        }
    }

    /// A tagger that reports itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            by_file: HashMap::new(),
            available: false,
        }
    }
}

#[async_trait]
impl Tagger for StaticTagger {
    async fn tag(&self, _path: &Path, rel_path: &Path) -> Result<Vec<TagRecord>, CtagsError> {
        Ok(self.by_file.get(rel_path).cloned().unwrap_or_default())
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

/// One line of `ctags --output-format=json`.
#[derive(Debug, Deserialize)]
struct CtagsLine {
    #[serde(rename = "_type")]
    entry_type: String,
    name: Option<String>,
    scope: Option<String>,
    kind: Option<String>,
    signature: Option<String>,
}

/// Parse Universal Ctags JSON-lines output into tag records for `rel_path`.
///
/// Pseudo-tag lines are ignored. Malformed lines are logged and skipped; the
/// rest of the output is still used.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use codectags_repomap::tags::parse_ctags_json;
///
/// let out = r#"{"_type": "tag", "name": "main", "path": "m.py", "kind": "function", "signature": "()"}"#;
/// let tags = parse_ctags_json(out, Path::new("m.py"));
/// assert_eq!(tags.len(), 1);
/// assert_eq!(tags[0].rendered_name(), "main ()");
/// ```
pub fn parse_ctags_json(output: &str, rel_path: &Path) -> Vec<TagRecord> {
    let mut tags = Vec::new();

    for (lineno, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parsed: CtagsLine = match serde_json::from_str(line) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(
                    file = %rel_path.display(),
                    line = lineno + 1,
                    %err,
                    "skipping malformed ctags record"
                );
                continue;
            }
        };

        if parsed.entry_type != "tag" {
            continue;
        }

        let Some(name) = parsed.name.filter(|n| !n.is_empty()) else {
            tracing::warn!(
                file = %rel_path.display(),
                line = lineno + 1,
                "skipping ctags record without a name"
            );
            continue;
        };

        tags.push(TagRecord {
            file: rel_path.to_path_buf(),
            scope: parsed.scope.filter(|s| !s.is_empty()),
            kind: parsed.kind.unwrap_or_else(|| "unknown".into()),
            name,
            signature: parsed.signature.filter(|s| !s.is_empty()),
        });
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"_type": "ptag", "name": "JSON_OUTPUT_VERSION", "path": "0.0", "pattern": "in development"}
{"_type": "tag", "name": "User", "path": "/repo/app/models.py", "pattern": "/^class User:$/", "kind": "class"}
{"_type": "tag", "name": "save", "path": "/repo/app/models.py", "pattern": "/^    def save(self):$/", "kind": "member", "scope": "User", "scopeKind": "class", "signature": "(self)"}
{"_type": "tag", "name": "MAX", "path": "/repo/app/models.py", "kind": "variable"}
"#;

    #[test]
    fn parses_tags_and_ignores_pseudo_tags() {
        let tags = parse_ctags_json(SAMPLE, Path::new("app/models.py"));
        assert_eq!(tags.len(), 3);

        assert_eq!(tags[0].name, "User");
        assert_eq!(tags[0].kind, "class");
        assert_eq!(tags[0].scope, None);

        assert_eq!(tags[1].name, "save");
        assert_eq!(tags[1].scope.as_deref(), Some("User"));
        assert_eq!(tags[1].signature.as_deref(), Some("(self)"));
        assert_eq!(tags[1].rendered_name(), "save (self)");

        assert!(tags
            .iter()
            .all(|t| t.file == PathBuf::from("app/models.py")));
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let output = r#"{"_type": "tag", "name": "ok_one", "kind": "function"}
this is not json
{"_type": "tag", "kind": "function"}
{"_type": "tag", "name": "ok_two", "kind": "function"}"#;
        let tags = parse_ctags_json(output, Path::new("x.py"));
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["ok_one", "ok_two"]);
    }

    #[test]
    fn missing_kind_defaults_to_unknown() {
        let tags = parse_ctags_json(r#"{"_type": "tag", "name": "x"}"#, Path::new("x.c"));
        assert_eq!(tags[0].kind, "unknown");
    }

    #[test]
    fn rendered_name_without_signature() {
        let tag = TagRecord {
            file: PathBuf::from("a.py"),
            scope: None,
            kind: "variable".into(),
            name: "LIMIT".into(),
            signature: None,
        };
        assert_eq!(tag.rendered_name(), "LIMIT");
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let tagger = CtagsTagger::new("code-ctags-test-no-such-binary", "utf-8");
        assert!(!tagger.is_available().await);
        assert!(matches!(
            tagger.check_install().await,
            Err(CtagsError::Tagger(_))
        ));
    }

    #[cfg(unix)]
    fn fake_ctags(dir: &Path, tag_exit: i32) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ctags");
        let script = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"--version\" ]; then\n\
             echo 'Universal Ctags 6.1.0, Copyright (C) 2015-2023 Universal Ctags Team'\n\
             echo 'Optional compiled features: +wildcards, +regex, +json'\n\
             exit 0\n\
             fi\n\
             exit {tag_exit}\n"
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn install_check_requires_working_trial_run() {
        let dir = tempfile::tempdir().unwrap();
        let tagger = CtagsTagger::new(fake_ctags(dir.path(), 1), "utf-8");

        let err = tagger.check_install().await.unwrap_err();
        assert!(err.to_string().contains("trial run"), "{err}");
        assert!(!tagger.is_available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn install_check_passes_when_trial_run_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let tagger = CtagsTagger::new(fake_ctags(dir.path(), 0), "utf-8");

        let version = tagger.check_install().await.unwrap();
        assert!(version.starts_with("Universal Ctags 6.1.0"), "{version}");
    }

    #[tokio::test]
    async fn missing_binary_fails_to_tag() {
        let tagger = CtagsTagger::new("code-ctags-test-no-such-binary", "utf-8");
        let result = tagger.tag(Path::new("a.py"), Path::new("a.py")).await;
        assert!(matches!(result, Err(CtagsError::Tagger(_))));
    }
}

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use crate::tags::TagRecord;

/// One line group of the map: a bare file, or a definition inside a file.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codectags_repomap::select::Entry;
///
/// let entry = Entry::Definition {
///     file: PathBuf::from("app/models.py"),
///     scope: Some("User".into()),
///     kind: "member".into(),
///     rendered_name: "save (self)".into(),
/// };
/// assert_eq!(
///     entry.components(),
///     vec!["app/", "models.py:", "User", "member", "save (self)"]
/// );
/// assert_eq!(Entry::FileOnly(PathBuf::from("README.md")).components(), vec!["README.md:"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entry {
    /// A file shown without any of its definitions.
    FileOnly(PathBuf),
    /// A ranked definition.
    Definition {
        file: PathBuf,
        scope: Option<String>,
        kind: String,
        rendered_name: String,
    },
}

impl Entry {
    /// File this entry belongs to.
    pub fn file(&self) -> &Path {
        match self {
            Entry::FileOnly(file) | Entry::Definition { file, .. } => file,
        }
    }

    /// Tree components: directories as `dir/`, the file as `name:`, then
    /// scope, kind and name for definitions.
    pub fn components(&self) -> Vec<String> {
        let mut parts = path_components(self.file(), true);
        if let Entry::Definition {
            scope,
            kind,
            rendered_name,
            ..
        } = self
        {
            if let Some(scope) = scope {
                parts.push(scope.clone());
            }
            parts.push(kind.clone());
            parts.push(rendered_name.clone());
        }
        parts
    }
}

impl From<&TagRecord> for Entry {
    fn from(tag: &TagRecord) -> Self {
        Entry::Definition {
            file: tag.file.clone(),
            scope: tag.scope.clone(),
            kind: tag.kind.clone(),
            rendered_name: tag.rendered_name(),
        }
    }
}

/// Directories as `dir/`; the file name gets a trailing `:` when `with_colon`
/// is set, which marks that definitions follow.
pub(crate) fn path_components(path: &Path, with_colon: bool) -> Vec<String> {
    let names: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir | Component::ParentDir => None,
        })
        .collect();

    let last = names.len().saturating_sub(1);
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| match (i == last, with_colon) {
            (true, true) => format!("{name}:"),
            (true, false) => name,
            (false, _) => format!("{name}/"),
        })
        .collect()
}

/// Order definitions by rank and expand them into map entries.
///
/// 1. `(file, identifier)` pairs by descending share (ties by pair).
/// 2. Pairs in `excluded` files are skipped.
/// 3. Each remaining pair expands to all of its tag records.
/// 4. Ranked files without any entry yet follow as [`Entry::FileOnly`],
///    by descending rank.
/// 5. Candidates that never made it into the graph come last, by path.
pub fn select_tags(
    shares: &BTreeMap<(PathBuf, String), f64>,
    definitions: &BTreeMap<(PathBuf, String), Vec<TagRecord>>,
    ranks: &BTreeMap<PathBuf, f64>,
    excluded: &BTreeSet<PathBuf>,
    candidates: &BTreeSet<PathBuf>,
) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut included: BTreeSet<&Path> = BTreeSet::new();

    let mut ranked_pairs: Vec<(&(PathBuf, String), f64)> =
        shares.iter().map(|(key, rank)| (key, *rank)).collect();
    ranked_pairs.sort_by(|a, b| by_rank_desc(a.1, b.1).then_with(|| a.0.cmp(b.0)));

    for (key, _) in ranked_pairs {
        if excluded.contains(&key.0) {
            continue;
        }
        let Some(tags) = definitions.get(key) else {
            continue;
        };
        for tag in tags {
            entries.push(Entry::from(tag));
        }
        if !tags.is_empty() {
            included.insert(key.0.as_path());
        }
    }

    let mut ranked_files: Vec<(&PathBuf, f64)> =
        ranks.iter().map(|(file, rank)| (file, *rank)).collect();
    ranked_files.sort_by(|a, b| by_rank_desc(a.1, b.1).then_with(|| a.0.cmp(b.0)));

    for (file, _) in ranked_files {
        if included.insert(file.as_path()) {
            entries.push(Entry::FileOnly(file.clone()));
        }
    }

    for file in candidates {
        if !ranks.contains_key(file) && included.insert(file.as_path()) {
            entries.push(Entry::FileOnly(file.clone()));
        }
    }

    entries
}

fn by_rank_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

//! Ranked map of a repository's definitions, built from ctags output.
//!
//! Files are tagged with Universal Ctags and tokenized with tree-sitter. A
//! file reference graph is ranked with personalized PageRank, the rank is
//! pushed down to individual definitions, and the best-ranked definitions are
//! rendered as a tab-indented tree that fits a size budget.

pub mod budget;
pub mod cache;
pub mod collect;
pub mod graph;
pub mod output;
pub mod rank;
pub mod select;
pub mod tags;
pub mod tokenizer;
pub mod walker;

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use codectags_core::{CtagsConfig, CtagsError, SizeMetric, TaggerConfig};

use crate::cache::{JsonFileCache, NoCache, TagCache};
use crate::collect::TagCollector;
use crate::graph::{references_from_defines, ReferenceGraph};
use crate::rank::{distribute, personalization_for, PageRanker};
use crate::select::{select_tags, Entry};
use crate::tags::{CtagsTagger, Tagger};
use crate::tokenizer::{Tokenizer, TreeSitterTokenizer};

pub use crate::output::render_fallback;

/// Repository map generator.
///
/// Holds the collaborators for one repository root; every call to
/// [`RepoMap::generate_map`] recomputes ranks from scratch, reusing cached
/// tagger output where file modification times allow.
///
/// # Examples
///
/// ```no_run
/// use std::path::{Path, PathBuf};
/// use codectags_core::CtagsConfig;
/// use codectags_repomap::RepoMap;
///
/// # async fn run() -> Result<(), codectags_core::CtagsError> {
/// let repo_map = RepoMap::from_config(Path::new("."), &CtagsConfig::default());
/// let candidates = vec![PathBuf::from("src/lib.rs"), PathBuf::from("src/main.rs")];
/// if let Some(map) = repo_map.generate_map(&[], &candidates, Some(1024)).await? {
///     print!("{map}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct RepoMap {
    root: PathBuf,
    tagger: Arc<dyn Tagger>,
    tokenizer: Arc<dyn Tokenizer>,
    cache: Arc<dyn TagCache>,
    ranker: PageRanker,
    full: bool,
    size_metric: SizeMetric,
    concurrency: usize,
    timeout: Duration,
    encoding: String,
    prefix: Option<String>,
}

/// Substituted for `{ctags_msg}` in the prefix when the map is ranked.
const CTAGS_MSG: &str = " with selected ctags info";

impl RepoMap {
    /// Map `root` using `tagger`, with tree-sitter tokens, no cache, and
    /// default ranking parameters.
    pub fn new(root: impl Into<PathBuf>, tagger: Arc<dyn Tagger>) -> Self {
        Self {
            root: root.into(),
            tagger,
            tokenizer: Arc::new(TreeSitterTokenizer),
            cache: Arc::new(NoCache),
            ranker: PageRanker::default(),
            full: false,
            size_metric: SizeMetric::default(),
            concurrency: default_concurrency(),
            timeout: Duration::from_secs(TaggerConfig::default().timeout_secs),
            encoding: "utf-8".into(),
            prefix: None,
        }
    }

    /// Map `root` with a ctags tagger and a cache set up from `config`.
    ///
    /// The cache path is resolved against `root`.
    pub fn from_config(root: &Path, config: &CtagsConfig) -> Self {
        let tagger = CtagsTagger::new(&config.tagger.ctags_bin, &config.map.encoding);
        let cache: Arc<dyn TagCache> = if config.cache.enabled {
            Arc::new(JsonFileCache::open(&root.join(&config.cache.path)))
        } else {
            Arc::new(NoCache)
        };

        let mut repo_map = Self::new(root, Arc::new(tagger))
            .with_cache(cache)
            .with_ranker(PageRanker::from(&config.rank))
            .with_full(config.map.full)
            .with_size_metric(config.map.size_metric)
            .with_timeout(Duration::from_secs(config.tagger.timeout_secs))
            .with_encoding(&config.map.encoding);
        if let Some(prefix) = &config.map.prefix {
            repo_map = repo_map.with_prefix(prefix);
        }
        if let Some(concurrency) = config.tagger.concurrency {
            repo_map = repo_map.with_concurrency(concurrency);
        }
        repo_map
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn TagCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_ranker(mut self, ranker: PageRanker) -> Self {
        self.ranker = ranker;
        self
    }

    /// Keep references from a file to its own definitions.
    pub fn with_full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    /// Unit `max_size` is measured in.
    pub fn with_size_metric(mut self, metric: SizeMetric) -> Self {
        self.size_metric = metric;
        self
    }

    /// Maximum number of files tagged at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Deadline for a single tagger run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Text encoding source files are read with.
    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.encoding = encoding.to_string();
        self
    }

    /// Header template printed before the map.
    ///
    /// `{other}` expands to `"other "` when focus files were given and to
    /// nothing otherwise. `{ctags_msg}` expands to
    /// `" with selected ctags info"` for a ranked map and to nothing for the
    /// plain file list. The header does not count against `max_size`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// Repository root paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Render the map for `candidates`, biased towards `focus`.
    ///
    /// Paths may be absolute (under the root) or relative to it. Definitions
    /// in focus files are left out of the map; the files themselves still
    /// steer the ranking. `max_size` is measured in the configured
    /// [`SizeMetric`].
    ///
    /// Returns `None` when there are no candidates. When the tagger is
    /// unavailable, no definitions are found, or no file references another,
    /// the result is the flat [`render_fallback`] tree of the candidates.
    /// Either listing is preceded by the [`with_prefix`](Self::with_prefix)
    /// header when one is set. The tag cache is saved in both cases.
    ///
    /// # Errors
    ///
    /// Returns [`CtagsError`] only for failures other than the soft ones
    /// above; per-file problems are logged and skipped.
    pub async fn generate_map(
        &self,
        focus: &[PathBuf],
        candidates: &[PathBuf],
        max_size: Option<usize>,
    ) -> Result<Option<String>, CtagsError> {
        let candidates: BTreeSet<PathBuf> = candidates.iter().map(|p| self.relative(p)).collect();
        if candidates.is_empty() {
            return Ok(None);
        }
        let focus: BTreeSet<PathBuf> = focus.iter().map(|p| self.relative(p)).collect();

        let ranked = self.ranked_entries(&focus, &candidates).await;
        self.save_cache();

        let (listing, ctags_msg) = match ranked? {
            Some(entries) => {
                let size_of = budget::size_fn(self.size_metric);
                (budget::fit_to_budget(&entries, max_size, size_of), CTAGS_MSG)
            }
            None => (render_fallback(&candidates), ""),
        };

        let Some(template) = &self.prefix else {
            return Ok(Some(listing));
        };
        let other = if focus.is_empty() { "" } else { "other " };
        Ok(Some(format_prefix(template, other, ctags_msg) + &listing))
    }

    fn save_cache(&self) {
        let root = &self.root;
        self.cache.retain(&|path| root.join(path).exists());
        if let Err(err) = self.cache.flush() {
            tracing::warn!(%err, "failed to save tag cache");
        }
    }

    /// Full ranked entry list, or `None` when ranking is not possible and
    /// the fallback tree should be used instead.
    ///
    /// # Errors
    ///
    /// Propagates ranking errors other than [`CtagsError::DegenerateGraph`].
    pub async fn ranked_entries(
        &self,
        focus: &BTreeSet<PathBuf>,
        candidates: &BTreeSet<PathBuf>,
    ) -> Result<Option<Vec<Entry>>, CtagsError> {
        if !self.tagger.is_available().await {
            return Ok(None);
        }

        let files: Vec<PathBuf> = focus.union(candidates).cloned().collect();
        let collector = TagCollector::new(
            Arc::clone(&self.tagger),
            Arc::clone(&self.tokenizer),
            Arc::clone(&self.cache),
            self.concurrency,
            self.timeout,
        )
        .with_encoding(&self.encoding);
        let collected = collector.collect(&self.root, &files).await;

        if collected.has_no_definitions() {
            tracing::debug!(files = files.len(), "no definitions found, using file list");
            return Ok(None);
        }

        let graph = if collected.references.is_empty() {
            let references = references_from_defines(&collected.defines);
            ReferenceGraph::build(&collected.defines, &references, self.full)
        } else {
            ReferenceGraph::build(&collected.defines, &collected.references, self.full)
        };

        let personalization = personalization_for(focus.iter());
        let ranks = match self.ranker.rank(&graph, &personalization) {
            Ok(ranks) => ranks,
            Err(CtagsError::DegenerateGraph) => {
                tracing::debug!("no cross-file references, using file list");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let shares = distribute(&graph, &ranks);
        let entries = select_tags(&shares, &collected.definitions, &ranks, focus, candidates);

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            entries = entries.len(),
            "ranked definitions"
        );
        Ok(Some(entries))
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn format_prefix(template: &str, other: &str, ctags_msg: &str) -> String {
    template
        .replace("{other}", other)
        .replace("{ctags_msg}", ctags_msg)
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}

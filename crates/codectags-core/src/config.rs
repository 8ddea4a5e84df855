use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CtagsError;
use crate::Result;

/// Top-level configuration loaded from `.code-ctags.toml`.
///
/// Resolution order: CLI flags > config file > defaults.
///
/// # Examples
///
/// ```
/// use codectags_core::CtagsConfig;
///
/// let config = CtagsConfig::default();
/// assert_eq!(config.map.max_tokens, 1024);
/// assert_eq!(config.rank.damping, 0.85);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtagsConfig {
    /// Map rendering settings.
    #[serde(default)]
    pub map: MapConfig,
    /// PageRank parameters.
    #[serde(default)]
    pub rank: RankConfig,
    /// External tagger settings.
    #[serde(default)]
    pub tagger: TaggerConfig,
    /// Tag cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl CtagsConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CtagsError::Io`] if the file cannot be read,
    /// [`CtagsError::Toml`] if the content is not valid TOML, or
    /// [`CtagsError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codectags_core::CtagsConfig;
    /// use std::path::Path;
    ///
    /// let config = CtagsConfig::from_file(Path::new(".code-ctags.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CtagsError::Toml`] if parsing fails or
    /// [`CtagsError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use codectags_core::CtagsConfig;
    ///
    /// let toml = r#"
    /// [map]
    /// max_tokens = 2048
    /// "#;
    /// let config = CtagsConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.map.max_tokens, 2048);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that numeric settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`CtagsError::Config`] naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !(self.rank.damping > 0.0 && self.rank.damping < 1.0) {
            return Err(CtagsError::Config(format!(
                "rank.damping must be between 0 and 1 (exclusive), got {}",
                self.rank.damping
            )));
        }
        if self.rank.tolerance <= 0.0 {
            return Err(CtagsError::Config(format!(
                "rank.tolerance must be positive, got {}",
                self.rank.tolerance
            )));
        }
        if self.rank.max_iterations == 0 {
            return Err(CtagsError::Config(
                "rank.max_iterations must be at least 1".into(),
            ));
        }
        if self.tagger.timeout_secs == 0 {
            return Err(CtagsError::Config(
                "tagger.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// How rendered map size is measured against the budget.
///
/// # Examples
///
/// ```
/// use codectags_core::SizeMetric;
///
/// assert_eq!(SizeMetric::default(), SizeMetric::Tokens);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMetric {
    /// Estimated LLM tokens (characters / 4, rounded down).
    #[default]
    Tokens,
    /// Raw character count.
    Chars,
}

/// Map rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Size budget for the rendered map (default: 1024).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Keep same-file references as graph edges (default: false).
    #[serde(default)]
    pub full: bool,
    /// Encoding passed to the tagger for source files (default: `"utf-8"`).
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Unit `max_tokens` is measured in.
    #[serde(default)]
    pub size_metric: SizeMetric,
    /// Header printed before the map. `{other}` becomes `"other "` when
    /// focus files were given, `{ctags_msg}` becomes
    /// `" with selected ctags info"` when the map is ranked.
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_max_tokens() -> usize {
    1024
}

fn default_encoding() -> String {
    "utf-8".into()
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            full: false,
            encoding: default_encoding(),
            size_metric: SizeMetric::default(),
            prefix: None,
        }
    }
}

/// PageRank parameters.
///
/// # Examples
///
/// ```
/// use codectags_core::RankConfig;
///
/// let config = RankConfig::default();
/// assert_eq!(config.max_iterations, 100);
/// assert_eq!(config.tolerance, 1e-6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    /// Probability of following an edge rather than restarting (default: 0.85).
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Upper bound on power iterations (default: 100).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Per-node convergence tolerance (default: 1e-6).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_damping() -> f64 {
    0.85
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-6
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// External tagger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerConfig {
    /// Path or name of the Universal Ctags binary (default: `"ctags"`).
    #[serde(default = "default_ctags_bin")]
    pub ctags_bin: String,
    /// Per-file deadline for one tagger run, in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Files tagged concurrently. `None` uses the available parallelism.
    pub concurrency: Option<usize>,
}

fn default_ctags_bin() -> String {
    "ctags".into()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            ctags_bin: default_ctags_bin(),
            timeout_secs: default_timeout_secs(),
            concurrency: None,
        }
    }
}

/// Tag cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist tagger output between runs (default: true).
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Cache file, relative to the repository root.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".code-ctags/tags-cache.json")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: default_cache_path(),
        }
    }
}

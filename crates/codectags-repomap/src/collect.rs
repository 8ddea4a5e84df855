use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{CacheKey, TagCache};
use crate::tags::{TagRecord, Tagger};
use crate::tokenizer::Tokenizer;
use crate::walker::modification_time;

/// Definitions and references gathered from a set of files.
///
/// All maps are keyed in sorted order so downstream graph construction is
/// deterministic.
#[derive(Debug, Default, Clone)]
pub struct CollectedTags {
    /// Identifier -> files defining it.
    pub defines: BTreeMap<String, BTreeSet<PathBuf>>,
    /// Identifier -> one entry per referencing token, so a file appears once
    /// per occurrence.
    pub references: BTreeMap<String, Vec<PathBuf>>,
    /// `(file, identifier)` -> tag records, in tagger order.
    pub definitions: BTreeMap<(PathBuf, String), Vec<TagRecord>>,
    /// Files that were accessible and contributed input.
    pub files: BTreeSet<PathBuf>,
}

impl CollectedTags {
    /// Whether no file produced a single definition.
    pub fn has_no_definitions(&self) -> bool {
        self.definitions.is_empty()
    }

    fn merge(&mut self, file: FileTags) {
        for tag in file.tags {
            self.defines
                .entry(tag.name.clone())
                .or_default()
                .insert(file.path.clone());
            self.definitions
                .entry((file.path.clone(), tag.name.clone()))
                .or_default()
                .push(tag);
        }
        for token in file.tokens {
            self.references
                .entry(token)
                .or_default()
                .push(file.path.clone());
        }
        self.files.insert(file.path);
    }
}

#[derive(Debug)]
struct FileTags {
    path: PathBuf,
    tags: Vec<TagRecord>,
    tokens: Vec<String>,
}

/// Runs the tagger and tokenizer over files with bounded concurrency.
///
/// Every file is independent: a file that cannot be read, whose tagger run
/// fails, or whose tagger run exceeds the deadline contributes what it can
/// and never aborts the batch.
pub struct TagCollector {
    tagger: Arc<dyn Tagger>,
    tokenizer: Arc<dyn Tokenizer>,
    cache: Arc<dyn TagCache>,
    concurrency: usize,
    timeout: Duration,
    encoding: Arc<str>,
}

impl TagCollector {
    /// Create a collector running at most `concurrency` files at once.
    pub fn new(
        tagger: Arc<dyn Tagger>,
        tokenizer: Arc<dyn Tokenizer>,
        cache: Arc<dyn TagCache>,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            tagger,
            tokenizer,
            cache,
            concurrency: concurrency.max(1),
            timeout,
            encoding: Arc::from("utf-8"),
        }
    }

    /// Text encoding source files are read with before tokenizing.
    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.encoding = Arc::from(encoding);
        self
    }

    /// Collect definitions and references for `files` (relative to `root`).
    pub async fn collect(&self, root: &Path, files: &[PathBuf]) -> CollectedTags {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for rel in files {
            let semaphore = Arc::clone(&semaphore);
            let job = FileJob {
                abs: root.join(rel),
                rel: rel.clone(),
                tagger: Arc::clone(&self.tagger),
                tokenizer: Arc::clone(&self.tokenizer),
                cache: Arc::clone(&self.cache),
                timeout: self.timeout,
                encoding: Arc::clone(&self.encoding),
            };
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                job.run().await
            });
        }

        let mut results = Vec::with_capacity(files.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(file)) => results.push(file),
                Ok(None) => {}
                Err(err) => tracing::warn!(%err, "tag collection task failed"),
            }
        }

        // Completion order is arbitrary; merge in path order.
        results.sort_by(|a, b| a.path.cmp(&b.path));

        let mut collected = CollectedTags::default();
        for file in results {
            collected.merge(file);
        }

        tracing::debug!(
            files = collected.files.len(),
            identifiers = collected.defines.len(),
            tokens = collected.references.len(),
            "collected tags"
        );
        collected
    }
}

struct FileJob {
    abs: PathBuf,
    rel: PathBuf,
    tagger: Arc<dyn Tagger>,
    tokenizer: Arc<dyn Tokenizer>,
    cache: Arc<dyn TagCache>,
    timeout: Duration,
    encoding: Arc<str>,
}

impl FileJob {
    async fn run(self) -> Option<FileTags> {
        let Some(mtime) = modification_time(&self.abs) else {
            tracing::warn!(file = %self.rel.display(), "file not accessible, skipping");
            return None;
        };

        let tags = self.tags_for(mtime).await;
        let tokens = self.tokens().await;

        Some(FileTags {
            path: self.rel,
            tags,
            tokens,
        })
    }

    async fn tags_for(&self, mtime: std::time::SystemTime) -> Vec<TagRecord> {
        let key = CacheKey {
            path: self.rel.clone(),
            mtime,
        };
        if let Some(tags) = self.cache.lookup(&key) {
            return tags;
        }

        match tokio::time::timeout(self.timeout, self.tagger.tag(&self.abs, &self.rel)).await {
            Ok(Ok(tags)) => {
                self.cache.store(key, tags.clone());
                tags
            }
            Ok(Err(err)) => {
                tracing::warn!(file = %self.rel.display(), %err, "tagger failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    file = %self.rel.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "tagger timed out"
                );
                Vec::new()
            }
        }
    }

    async fn tokens(&self) -> Vec<String> {
        let bytes = match tokio::fs::read(&self.abs).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(file = %self.rel.display(), %err, "failed to read file");
                return Vec::new();
            }
        };
        let Some(content) = decode_text(bytes, &self.encoding) else {
            tracing::warn!(
                file = %self.rel.display(),
                encoding = %self.encoding,
                "file is not valid text in the configured encoding"
            );
            return Vec::new();
        };

        let tokenizer = Arc::clone(&self.tokenizer);
        let rel = self.rel.clone();
        match tokio::task::spawn_blocking(move || tokenizer.identifier_tokens(&rel, &content)).await
        {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!(file = %self.rel.display(), %err, "tokenizer failed");
                Vec::new()
            }
        }
    }
}

/// Decode file content read with `encoding`.
///
/// UTF-8 and ASCII are strict and return `None` on invalid input. Latin-1
/// maps each byte to the code point of the same value. Any other label is
/// decoded as UTF-8 with invalid sequences replaced.
///
/// # Examples
///
/// ```
/// use codectags_repomap::collect::decode_text;
///
/// assert_eq!(decode_text(b"foo()".to_vec(), "utf-8").as_deref(), Some("foo()"));
/// assert_eq!(decode_text(vec![0x63, 0x61, 0x66, 0xe9], "latin-1").as_deref(), Some("caf\u{e9}"));
/// assert_eq!(decode_text(vec![0xe9], "utf-8"), None);
/// ```
pub fn decode_text(bytes: Vec<u8>, encoding: &str) -> Option<String> {
    let label: String = encoding
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect();

    match label.as_str() {
        "utf8" => String::from_utf8(bytes).ok(),
        "ascii" | "usascii" => {
            if bytes.is_ascii() {
                String::from_utf8(bytes).ok()
            } else {
                None
            }
        }
        "latin1" | "l1" | "iso88591" => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        _ => Some(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

use std::path::PathBuf;

/// Errors that can occur while building a repository map.
///
/// Library crates return this type directly; the binary turns it into a
/// `miette` report at the boundary.
///
/// # Examples
///
/// ```
/// use codectags_core::CtagsError;
///
/// let err = CtagsError::Config("damping must be in (0, 1)".into());
/// assert!(err.to_string().contains("damping"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CtagsError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The external tagger could not be run or produced unusable output.
    #[error("tagger error: {0}")]
    #[diagnostic(help("install Universal Ctags built with JSON support, or set [tagger] ctags_bin"))]
    Tagger(String),

    /// Ranking was asked to run over a graph without a single edge.
    #[error("reference graph has no edges; nothing to rank")]
    DegenerateGraph,

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CtagsError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = CtagsError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn degenerate_graph_has_stable_message() {
        let err = CtagsError::DegenerateGraph;
        assert_eq!(err.to_string(), "reference graph has no edges; nothing to rank");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = CtagsError::FileNotFound(PathBuf::from("/tmp/missing.py"));
        assert!(err.to_string().contains("/tmp/missing.py"));
    }
}

//! Shared configuration and error handling for code-ctags.
//!
//! - [`CtagsError`]: unified error type using `thiserror`
//! - [`CtagsConfig`]: configuration loaded from `.code-ctags.toml`

mod config;
mod error;

pub use config::{CacheConfig, CtagsConfig, MapConfig, RankConfig, SizeMetric, TaggerConfig};
pub use error::CtagsError;

/// A convenience `Result` type for code-ctags operations.
pub type Result<T> = std::result::Result<T, CtagsError>;

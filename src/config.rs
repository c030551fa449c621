//! Library configuration
//!
//! Loaded from `shloka.yaml` in the library root when present. Every field
//! has a default, so an empty or missing file is valid. CLI flags override
//! what is read here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::paths::LibraryPaths;
use crate::error::{CorpusError, Result};
use crate::search::embedding::DEFAULT_DIM;

pub const DEFAULT_WORK_TYPE: &str = "Others";
pub const DEFAULT_PATTERN: &str = "*.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Work type used when a document carries no `type`
    pub default_type: String,
    /// Embedding dimension for the semantic store
    pub dim: usize,
    pub corpus_db: Option<PathBuf>,
    pub semantic_db: Option<PathBuf>,
    pub json_dir: Option<PathBuf>,
    pub pattern: String,
    /// Reuse verses with the same citation instead of appending
    pub dedupe_verses: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_type: DEFAULT_WORK_TYPE.to_string(),
            dim: DEFAULT_DIM,
            corpus_db: None,
            semantic_db: None,
            json_dir: None,
            pattern: DEFAULT_PATTERN.to_string(),
            dedupe_verses: false,
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn load_for(paths: &LibraryPaths) -> Result<Self> {
        Self::load(&paths.config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(CorpusError::Config("dim must be greater than zero".into()));
        }
        if self.default_type.trim().is_empty() {
            return Err(CorpusError::Config("default_type must not be empty".into()));
        }
        glob::Pattern::new(&self.pattern)
            .map_err(|e| CorpusError::Config(format!("invalid pattern '{}': {}", self.pattern, e)))?;
        Ok(())
    }

    pub fn corpus_db_path(&self, paths: &LibraryPaths) -> PathBuf {
        self.corpus_db
            .as_deref()
            .map(|p| paths.resolve(p))
            .unwrap_or_else(|| paths.corpus_db.clone())
    }

    pub fn semantic_db_path(&self, paths: &LibraryPaths) -> PathBuf {
        self.semantic_db
            .as_deref()
            .map(|p| paths.resolve(p))
            .unwrap_or_else(|| paths.semantic_db.clone())
    }

    pub fn json_dir_path(&self, paths: &LibraryPaths) -> PathBuf {
        self.json_dir
            .as_deref()
            .map(|p| paths.resolve(p))
            .unwrap_or_else(|| paths.json.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::parse("default_type: Purana\ndim: 256\n").unwrap();
        assert_eq!(config.default_type, "Purana");
        assert_eq!(config.dim, 256);
        assert_eq!(config.pattern, DEFAULT_PATTERN);
        assert!(!config.dedupe_verses);
    }

    #[test]
    fn test_rejects_zero_dim() {
        assert!(matches!(Config::parse("dim: 0"), Err(CorpusError::Config(_))));
    }

    #[test]
    fn test_paths_resolve_against_root() {
        let paths = LibraryPaths::from_root(PathBuf::from("/lib"));
        let config = Config::parse("semantic_db: out/sem.sqlite").unwrap();
        assert_eq!(
            config.semantic_db_path(&paths),
            PathBuf::from("/lib/out/sem.sqlite")
        );
        assert_eq!(config.corpus_db_path(&paths), paths.corpus_db);
    }
}

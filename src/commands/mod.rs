pub mod build;
pub mod delete;
pub mod import;
pub mod init;
pub mod search;
pub mod status;
pub mod verify;

use std::path::PathBuf;

use anyhow::{Context, Result};

use shloka_index::config::Config;
use shloka_index::core::paths::LibraryPaths;

/// Resolved library root plus its configuration
pub struct Library {
    pub paths: LibraryPaths,
    pub config: Config,
}

impl Library {
    pub fn load(root: Option<PathBuf>) -> Result<Self> {
        let paths = match root {
            Some(root) => LibraryPaths::from_root(root),
            None => LibraryPaths::new(),
        };
        let config = Config::load_for(&paths)
            .with_context(|| format!("Failed to load {}", paths.config.display()))?;
        Ok(Self { paths, config })
    }

    pub fn corpus_db(&self) -> PathBuf {
        self.config.corpus_db_path(&self.paths)
    }

    pub fn semantic_db(&self) -> PathBuf {
        self.config.semantic_db_path(&self.paths)
    }
}

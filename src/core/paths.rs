use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "shloka.yaml";

pub struct LibraryPaths {
    pub root: PathBuf,
    pub data: PathBuf,
    pub json: PathBuf,
    pub corpus_db: PathBuf,
    pub semantic_db: PathBuf,
    pub config: PathBuf,
}

impl LibraryPaths {
    pub fn new() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_root(root)
    }

    pub fn from_root(root: PathBuf) -> Self {
        let data = root.join("data");
        Self {
            json: root.join("json"),
            corpus_db: data.join("library.sqlite"),
            semantic_db: data.join("library.semantic.sqlite"),
            config: root.join(CONFIG_FILE),
            data,
            root,
        }
    }

    /// Resolve a configured path relative to the library root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for LibraryPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = LibraryPaths::from_root(PathBuf::from("/lib"));
        assert_eq!(paths.corpus_db, PathBuf::from("/lib/data/library.sqlite"));
        assert_eq!(
            paths.semantic_db,
            PathBuf::from("/lib/data/library.semantic.sqlite")
        );
        assert_eq!(paths.resolve(Path::new("x.json")), PathBuf::from("/lib/x.json"));
        assert_eq!(paths.resolve(Path::new("/abs.json")), PathBuf::from("/abs.json"));
    }
}

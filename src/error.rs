//! Error types for shloka-index
//!
//! Mirrors the failure taxonomy of the importer and the semantic store:
//! structural problems abort one input file, constraint problems abort one
//! transaction, integrity problems are reported and never repaired.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    /// Input JSON has a shape the importer does not understand
    #[error("Structural error in {}: {message}", path.display())]
    Structural { path: PathBuf, message: String },

    /// A unique key or foreign key was violated outside the idempotent paths
    #[error("Constraint violation ({context}): {message}")]
    Constraint { context: String, message: String },

    /// Stored data does not satisfy the semantic store contract
    #[error("Integrity fault for passage {id}: {message}")]
    Integrity { id: i64, message: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CorpusError>;

impl CorpusError {
    pub fn structural(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CorpusError::Structural {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn integrity(id: i64, message: impl Into<String>) -> Self {
        CorpusError::Integrity {
            id,
            message: message.into(),
        }
    }

    /// Attach identifiers to a constraint failure, pass other errors through
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            CorpusError::Constraint { message, .. } => CorpusError::Constraint {
                context: context.into(),
                message,
            },
            other => other,
        }
    }
}

impl From<rusqlite::Error> for CorpusError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, msg) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return CorpusError::Constraint {
                    context: String::from("sqlite"),
                    message: msg.clone().unwrap_or_else(|| code.to_string()),
                };
            }
        }
        CorpusError::Database(err)
    }
}

impl From<serde_yaml::Error> for CorpusError {
    fn from(err: serde_yaml::Error) -> Self {
        CorpusError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_display_names_file() {
        let err = CorpusError::structural("books/gita.json", "expected object or list");
        assert_eq!(
            err.to_string(),
            "Structural error in books/gita.json: expected object or list"
        );
    }

    #[test]
    fn test_constraint_context() {
        let err = CorpusError::Constraint {
            context: "sqlite".into(),
            message: "UNIQUE constraint failed: works.slug".into(),
        }
        .with_context("work slug=isa-upanishad");

        match err {
            CorpusError::Constraint { context, .. } => {
                assert_eq!(context, "work slug=isa-upanishad")
            }
            _ => panic!("Expected Constraint error"),
        }
    }

    #[test]
    fn test_io_error_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        match CorpusError::from(io_error) {
            CorpusError::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }
}

//! shloka-index library
//!
//! Imports Sanskrit corpus JSON into a relational SQLite store and derives a
//! semantic store of hashed passage embeddings for cosine search.
//!
//! # Modules
//!
//! - `core`: JSON document model, corpus schema, store and importer
//! - `search`: hashed embeddings, semantic store, build and retrieval
//! - `config`: `shloka.yaml` settings
//! - `error`: error taxonomy shared by both stores

pub mod config;
pub mod core;
pub mod error;
pub mod search;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::document::CorpusDocument;
pub use crate::core::importer::{ImportContext, Importer, VersePolicy};
pub use crate::core::paths::LibraryPaths;
pub use crate::core::store::CorpusStore;
pub use error::{CorpusError, Result};
pub use search::embedding::{HashingEncoder, TextEncoder};
pub use search::engine::{build_semantic_store, SearchEngine};
pub use search::vectordb::SemanticStore;

//! Semantic layer: hashed embeddings, the vector store and the retriever

pub mod embedding;
pub mod engine;
pub mod vectordb;

pub use embedding::{HashingEncoder, TextEncoder};
pub use engine::{build_semantic_store, ExternalVectors, SearchEngine, SearchResult, VectorSource};
pub use vectordb::{IntegrityReport, Passage, SemanticStore};

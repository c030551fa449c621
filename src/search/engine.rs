//! Search Engine - builds the semantic store from the corpus and answers queries
//!
//! A build reads every verse from the corpus store, flattens it to a passage
//! and stores one vector per passage. Vectors come either from a
//! [`TextEncoder`] or from a precomputed JSON file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use super::embedding::{l2_norm, l2_normalize, HashingEncoder, TextEncoder, HASHED_ALGORITHM};
use super::vectordb::{
    IntegrityFault, Passage, SemanticStore, META_ALGORITHM, META_BUILT_AT,
    META_DIM, META_SOURCE,
};
use crate::core::store::{CorpusStore, VerseTextRow};
use crate::error::{CorpusError, Result};

/// `meta.algorithm` for vectors supplied from a file
pub const EXTERNAL_ALGORITHM: &str = "external";

/// Rows per insert transaction
const BATCH_SIZE: usize = 512;

/// Search result with passage metadata and similarity score
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub passage: Passage,
    pub score: f32,
}

#[derive(Debug, Default)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub flagged: Vec<IntegrityFault>,
}

/// Build statistics
#[derive(Debug, Serialize)]
pub struct BuildStats {
    pub passages: usize,
    pub zero_vectors: usize,
    pub dim: usize,
    pub algorithm: String,
    pub duration_ms: u128,
}

/// Precomputed vectors keyed by passage id
#[derive(Debug)]
pub struct ExternalVectors {
    vectors: HashMap<i64, Vec<f32>>,
    dim: usize,
    algorithm: String,
    source: String,
}

impl ExternalVectors {
    /// Load `{"<id>": [f32, ...], ...}`; every vector is normalized on load
    pub fn load(path: &Path, algorithm: Option<&str>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        Self::from_value(
            &value,
            algorithm.unwrap_or(EXTERNAL_ALGORITHM),
            &path.display().to_string(),
        )
    }

    pub fn from_value(value: &serde_json::Value, algorithm: &str, source: &str) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            CorpusError::structural(source, "vector file must be an object of id -> array")
        })?;

        let mut vectors = HashMap::with_capacity(object.len());
        let mut dim: Option<usize> = None;

        for (key, entry) in object {
            let id: i64 = key.trim().parse().map_err(|_| {
                CorpusError::structural(source, format!("key '{}' is not a passage id", key))
            })?;
            let mut vector: Vec<f32> = serde_json::from_value(entry.clone()).map_err(|_| {
                CorpusError::structural(source, format!("entry {} is not a list of numbers", id))
            })?;

            match dim {
                None if vector.is_empty() => {
                    return Err(CorpusError::structural(source, format!("entry {} is empty", id)))
                }
                None => dim = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(CorpusError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    })
                }
                Some(_) => {}
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(CorpusError::integrity(id, "vector contains non-finite values"));
            }

            l2_normalize(&mut vector);
            vectors.insert(id, vector);
        }

        let dim = dim.ok_or_else(|| CorpusError::structural(source, "vector file is empty"))?;

        Ok(Self {
            vectors,
            dim,
            algorithm: algorithm.to_string(),
            source: source.to_string(),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Where passage vectors come from during a build
pub enum VectorSource<'a> {
    Encoder(&'a dyn TextEncoder),
    External(&'a ExternalVectors),
}

impl VectorSource<'_> {
    fn dim(&self) -> usize {
        match self {
            VectorSource::Encoder(encoder) => encoder.dim(),
            VectorSource::External(vectors) => vectors.dim,
        }
    }

    fn algorithm(&self) -> &str {
        match self {
            VectorSource::Encoder(encoder) => encoder.algorithm(),
            VectorSource::External(vectors) => &vectors.algorithm,
        }
    }

    fn vector_for(&self, passage: &Passage) -> Result<Vec<f32>> {
        match self {
            VectorSource::Encoder(encoder) => encoder.encode(&passage.text),
            VectorSource::External(vectors) => vectors
                .vectors
                .get(&passage.id)
                .cloned()
                .ok_or_else(|| CorpusError::NotFound(format!("vector for passage {}", passage.id))),
        }
    }
}

/// Trimmed non-empty bodies in English, IAST, Devanāgarī order, one per line
pub fn passage_text(row: &VerseTextRow) -> String {
    [&row.en_translation, &row.sa_iast, &row.sa_deva]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn passage_from_row(row: &VerseTextRow) -> Passage {
    Passage {
        id: row.verse_id,
        work_id: row.work_id,
        division_id: row.division_id,
        chapter: row.chapter,
        verse_start: row.verse_ordinal,
        verse_end: row.verse_ordinal,
        text: passage_text(row),
    }
}

/// Sibling path the build writes to before it is renamed over `target`
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".building");
    target.with_file_name(name)
}

/// Build a fresh semantic store at `target` from every verse in `corpus`.
///
/// The target is replaced only after the whole build has committed; a failed
/// build leaves any previous store untouched.
pub fn build_semantic_store(
    corpus: &CorpusStore,
    target: &Path,
    source: VectorSource<'_>,
) -> Result<BuildStats> {
    let start = Instant::now();

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let staging = staging_path(target);
    if staging.exists() {
        fs::remove_file(&staging)?;
    }

    let result = write_store(corpus, &staging, &source);
    let (passages, zero_vectors) = match result {
        Ok(counts) => counts,
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&staging) {
                log::warn!("Could not remove {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }
    };

    fs::rename(&staging, target)?;
    log::info!(
        "Semantic store written to {} ({} passages)",
        target.display(),
        passages
    );

    Ok(BuildStats {
        passages,
        zero_vectors,
        dim: source.dim(),
        algorithm: source.algorithm().to_string(),
        duration_ms: start.elapsed().as_millis(),
    })
}

fn write_store(
    corpus: &CorpusStore,
    path: &Path,
    source: &VectorSource<'_>,
) -> Result<(usize, usize)> {
    let mut store = SemanticStore::open(path)?;

    let source_label = match source {
        VectorSource::External(vectors) => vectors.source.clone(),
        VectorSource::Encoder(_) => corpus
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string()),
    };
    store.set_meta(META_DIM, &source.dim().to_string())?;
    store.set_meta(META_ALGORITHM, source.algorithm())?;
    store.set_meta(
        META_BUILT_AT,
        &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    )?;
    store.set_meta(META_SOURCE, &source_label)?;

    let rows = corpus.verse_texts()?;
    let mut passages = 0;
    let mut zero_vectors = 0;
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    for row in &rows {
        let passage = passage_from_row(row);
        let vector = source.vector_for(&passage)?;
        if l2_norm(&vector) == 0.0 {
            log::debug!("Passage {} has an empty vector", passage.id);
            zero_vectors += 1;
        }
        batch.push((passage, vector));
        if batch.len() == BATCH_SIZE {
            store.insert_batch(&batch)?;
            passages += batch.len();
            batch.clear();
        }
    }
    if !batch.is_empty() {
        store.insert_batch(&batch)?;
        passages += batch.len();
    }

    if let VectorSource::External(vectors) = source {
        if vectors.len() > passages {
            log::warn!(
                "{} vectors in {} have no matching passage",
                vectors.len() - passages,
                vectors.source
            );
        }
    }

    Ok((passages, zero_vectors))
}

/// Query side: an open semantic store plus the encoder matching its meta
pub struct SearchEngine {
    db: SemanticStore,
}

impl SearchEngine {
    /// Open an existing semantic store
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(CorpusError::NotFound(format!(
                "semantic store {}",
                db_path.display()
            )));
        }
        Ok(Self {
            db: SemanticStore::open(db_path)?,
        })
    }

    pub fn from_store(db: SemanticStore) -> Self {
        Self { db }
    }

    /// Embed the query with the hashed encoder and rank passages
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        let algorithm = self.db.get_meta(META_ALGORITHM)?;
        if algorithm.as_deref() != Some(HASHED_ALGORITHM) {
            return Err(CorpusError::Config(format!(
                "store was built with '{}'; text queries need '{}'. Use --like with a passage id instead",
                algorithm.unwrap_or_default(),
                HASHED_ALGORITHM
            )));
        }
        let encoder = HashingEncoder::new(self.db.dim()?)?;
        self.search_vector(&encoder.embed(query), limit)
    }

    /// Use a stored passage vector as the query
    pub fn search_like(&self, passage_id: i64, limit: usize) -> Result<SearchResponse> {
        let vector = self
            .db
            .get_vector(passage_id)?
            .ok_or_else(|| CorpusError::NotFound(format!("passage {}", passage_id)))?;
        self.search_vector(&vector, limit)
    }

    pub fn search_vector(&self, query: &[f32], limit: usize) -> Result<SearchResponse> {
        let outcome = self.db.search(query, limit)?;
        let mut results = Vec::with_capacity(outcome.hits.len());
        for hit in outcome.hits {
            match self.db.get_passage(hit.passage_id)? {
                Some(passage) => results.push(SearchResult {
                    passage,
                    score: hit.score,
                }),
                None => log::warn!("Embedding {} has no passage row", hit.passage_id),
            }
        }
        Ok(SearchResponse {
            results,
            flagged: outcome.flagged,
        })
    }
}

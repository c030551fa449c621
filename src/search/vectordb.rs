//! Semantic store using SQLite
//!
//! Stores one flattened passage per verse and its embedding as a BLOB of
//! little-endian f32. Similarity is computed in Rust by scanning every row.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::embedding::{dot, l2_norm};
use crate::error::{CorpusError, Result};

pub const META_DIM: &str = "dim";
pub const META_ALGORITHM: &str = "algorithm";
pub const META_BUILT_AT: &str = "built_at";
pub const META_SOURCE: &str = "source";

/// Accepted norm range for a stored non-zero vector
const NORM_TOLERANCE: f32 = 0.01;

/// Semantic store: passages, embeddings and build metadata
pub struct SemanticStore {
    conn: Connection,
}

/// Search-oriented projection of one verse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub id: i64,
    pub work_id: i64,
    pub division_id: i64,
    pub chapter: i64,
    pub verse_start: i64,
    pub verse_end: i64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hit {
    pub passage_id: i64,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Unreadable,
    BadShape,
    NonFinite,
    BadNorm,
    MissingEmbedding,
    OrphanEmbedding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityFault {
    pub id: i64,
    pub kind: FaultKind,
    pub message: String,
}

impl From<IntegrityFault> for CorpusError {
    fn from(fault: IntegrityFault) -> Self {
        CorpusError::integrity(fault.id, fault.message)
    }
}

/// Ranked hits plus the rows that were skipped because they are corrupt
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub hits: Vec<Hit>,
    pub flagged: Vec<IntegrityFault>,
}

#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub dim: usize,
    pub algorithm: Option<String>,
    pub rows: usize,
    pub passages: usize,
    pub bad_shape: usize,
    pub unreadable: usize,
    pub non_finite: usize,
    pub bad_norm: usize,
    pub zero: usize,
    pub missing_embedding: usize,
    pub orphan_embedding: usize,
    pub faults: Vec<IntegrityFault>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    fn record(&mut self, fault: IntegrityFault) {
        match fault.kind {
            FaultKind::Unreadable => self.unreadable += 1,
            FaultKind::BadShape => self.bad_shape += 1,
            FaultKind::NonFinite => self.non_finite += 1,
            FaultKind::BadNorm => self.bad_norm += 1,
            FaultKind::MissingEmbedding => self.missing_embedding += 1,
            FaultKind::OrphanEmbedding => self.orphan_embedding += 1,
        }
        self.faults.push(fault);
    }
}

#[derive(Debug, Serialize)]
pub struct SemanticStats {
    pub passage_count: usize,
    pub embedding_count: usize,
    pub dim: Option<usize>,
    pub algorithm: Option<String>,
    pub built_at: Option<String>,
    pub source: Option<String>,
}

impl SemanticStore {
    /// Open or create database at path
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS passages (
                id INTEGER PRIMARY KEY,
                work_id INTEGER NOT NULL,
                division_id INTEGER NOT NULL,
                chapter INTEGER NOT NULL,
                verse_start INTEGER NOT NULL,
                verse_end INTEGER NOT NULL,
                text TEXT NOT NULL
            );

            -- dim * 4 bytes of little-endian f32
            CREATE TABLE IF NOT EXISTS embeddings (
                id INTEGER PRIMARY KEY,
                vector BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_passages_work ON passages(work_id);
            "#,
        )?;
        Ok(())
    }

    /// Write passages and their vectors in one transaction
    pub fn insert_batch(&mut self, rows: &[(Passage, Vec<f32>)]) -> Result<()> {
        let dim = self.dim()?;
        let tx = self.conn.transaction()?;
        {
            let mut passage_stmt = tx.prepare(
                r#"
                INSERT INTO passages (id, work_id, division_id, chapter, verse_start, verse_end, text)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            let mut vector_stmt =
                tx.prepare("INSERT INTO embeddings (id, vector) VALUES (?1, ?2)")?;

            for (passage, vector) in rows {
                if vector.len() != dim {
                    return Err(CorpusError::DimensionMismatch {
                        expected: dim,
                        actual: vector.len(),
                    });
                }
                passage_stmt
                    .execute(params![
                        passage.id,
                        passage.work_id,
                        passage.division_id,
                        passage.chapter,
                        passage.verse_start,
                        passage.verse_end,
                        passage.text,
                    ])
                    .map_err(|e| {
                        CorpusError::from(e).with_context(format!("passage id={}", passage.id))
                    })?;
                vector_stmt.execute(params![passage.id, vector_to_blob(vector)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_passage(&self, id: i64) -> Result<Option<Passage>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, work_id, division_id, chapter, verse_start, verse_end, text FROM passages WHERE id = ?1",
                params![id],
                passage_from_row,
            )
            .optional()?)
    }

    /// Stored vector of a passage, validated against `meta.dim`
    pub fn get_vector(&self, id: i64) -> Result<Option<Vec<f32>>> {
        let dim = self.dim()?;
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT vector FROM embeddings WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match blob {
            Some(blob) => Ok(Some(decode_vector(id, &blob, dim)?)),
            None => Ok(None),
        }
    }

    /// Exhaustive top-k by dot product.
    ///
    /// Rows are scanned in id order and the sort is stable, so equal scores
    /// keep scan order. Corrupt rows are left out of the ranking and returned
    /// in `flagged`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<SearchOutcome> {
        let dim = self.dim()?;
        if query.len() != dim {
            return Err(CorpusError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(CorpusError::Config("query vector contains non-finite values".into()));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, vector FROM embeddings ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut outcome = SearchOutcome::default();
        for row in rows {
            let (id, blob) = row?;
            match check_vector(id, &blob, dim) {
                Ok(vector) => outcome.hits.push(Hit {
                    passage_id: id,
                    score: dot(query, &vector),
                }),
                Err(fault) => {
                    log::warn!("Skipping passage {}: {}", id, fault.message);
                    outcome.flagged.push(fault);
                }
            }
        }

        outcome.hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        outcome.hits.truncate(k);
        Ok(outcome)
    }

    /// Check every stored vector and the passage/embedding pairing
    pub fn verify(&self) -> Result<IntegrityReport> {
        let dim = self.dim()?;
        let mut report = IntegrityReport {
            dim,
            algorithm: self.get_meta(META_ALGORITHM)?,
            ..Default::default()
        };

        let mut stmt = self
            .conn
            .prepare("SELECT id, vector FROM embeddings ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        for row in rows {
            let (id, blob) = row?;
            report.rows += 1;
            let vector = match check_vector(id, &blob, dim) {
                Ok(v) => v,
                Err(fault) => {
                    report.record(fault);
                    continue;
                }
            };
            let norm = l2_norm(&vector);
            if norm == 0.0 {
                report.zero += 1;
            } else if (norm - 1.0).abs() > NORM_TOLERANCE {
                report.record(IntegrityFault {
                    id,
                    kind: FaultKind::BadNorm,
                    message: format!("norm {:.4} is not 1", norm),
                });
            }
        }

        report.passages = self.count("passages")?;

        for id in self.ids(
            "SELECT p.id FROM passages p LEFT JOIN embeddings e ON e.id = p.id WHERE e.id IS NULL ORDER BY p.id",
        )? {
            report.record(IntegrityFault {
                id,
                kind: FaultKind::MissingEmbedding,
                message: "passage has no embedding".into(),
            });
        }
        for id in self.ids(
            "SELECT e.id FROM embeddings e LEFT JOIN passages p ON p.id = e.id WHERE p.id IS NULL ORDER BY e.id",
        )? {
            report.record(IntegrityFault {
                id,
                kind: FaultKind::OrphanEmbedding,
                message: "embedding has no passage".into(),
            });
        }

        Ok(report)
    }

    pub fn get_stats(&self) -> Result<SemanticStats> {
        Ok(SemanticStats {
            passage_count: self.count("passages")?,
            embedding_count: self.count("embeddings")?,
            dim: self
                .get_meta(META_DIM)?
                .and_then(|d| d.parse().ok()),
            algorithm: self.get_meta(META_ALGORITHM)?,
            built_at: self.get_meta(META_BUILT_AT)?,
            source: self.get_meta(META_SOURCE)?,
        })
    }

    /// Embedding dimension from `meta.dim`
    pub fn dim(&self) -> Result<usize> {
        let raw = self
            .get_meta(META_DIM)?
            .ok_or_else(|| CorpusError::Config("semantic store has no 'dim' in meta".into()))?;
        match raw.trim().parse::<usize>() {
            Ok(dim) if dim > 0 => Ok(dim),
            _ => Err(CorpusError::Config(format!("invalid meta dim '{}'", raw))),
        }
    }

    /// Set index metadata
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Get index metadata
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn count(&self, table: &str) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn ids(&self, sql: &str) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn passage_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Passage> {
    Ok(Passage {
        id: row.get(0)?,
        work_id: row.get(1)?,
        division_id: row.get(2)?,
        chapter: row.get(3)?,
        verse_start: row.get(4)?,
        verse_end: row.get(5)?,
        text: row.get(6)?,
    })
}

/// Convert f32 vector to BLOB
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for &val in vector {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert BLOB to f32 vector, failing on a length that is not a whole
/// number of floats
pub fn blob_to_vector(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

fn check_vector(id: i64, blob: &[u8], dim: usize) -> std::result::Result<Vec<f32>, IntegrityFault> {
    let vector = blob_to_vector(blob).ok_or_else(|| IntegrityFault {
        id,
        kind: FaultKind::Unreadable,
        message: format!("blob of {} bytes is not a float32 array", blob.len()),
    })?;
    if vector.len() != dim {
        return Err(IntegrityFault {
            id,
            kind: FaultKind::BadShape,
            message: format!("vector has {} components, expected {}", vector.len(), dim),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(IntegrityFault {
            id,
            kind: FaultKind::NonFinite,
            message: "vector contains NaN or infinite values".into(),
        });
    }
    Ok(vector)
}

fn decode_vector(id: i64, blob: &[u8], dim: usize) -> Result<Vec<f32>> {
    check_vector(id, blob, dim).map_err(CorpusError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn passage(id: i64) -> Passage {
        Passage {
            id,
            work_id: 1,
            division_id: 1,
            chapter: 1,
            verse_start: id,
            verse_end: id,
            text: format!("verse {}", id),
        }
    }

    fn store_with(vectors: &[Vec<f32>]) -> SemanticStore {
        let mut store = SemanticStore::open_in_memory().unwrap();
        store.set_meta(META_DIM, &vectors[0].len().to_string()).unwrap();
        let rows: Vec<(Passage, Vec<f32>)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (passage(i as i64 + 1), v.clone()))
            .collect();
        store.insert_batch(&rows).unwrap();
        store
    }

    #[test]
    fn test_blob_conversion() {
        let vector = vec![1.0, 2.0, 3.0, -0.5];
        let blob = vector_to_blob(&vector);
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[0..4], &1.0f32.to_le_bytes());
        assert_eq!(blob_to_vector(&blob), Some(vector));
        assert_eq!(blob_to_vector(&[0u8; 5]), None);
    }

    #[test]
    fn test_top_k_scenario() -> Result<()> {
        let store = store_with(&[
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.7071, 0.7071, 0.0, 0.0],
        ]);

        let outcome = store.search(&[1.0, 0.0, 0.0, 0.0], 2)?;
        assert!(outcome.flagged.is_empty());
        assert_eq!(outcome.hits.len(), 2);
        assert_eq!(outcome.hits[0].passage_id, 1);
        assert_abs_diff_eq!(outcome.hits[0].score, 1.0, epsilon = 1e-6);
        assert_eq!(outcome.hits[1].passage_id, 3);
        assert_abs_diff_eq!(outcome.hits[1].score, 0.7071, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn test_ties_keep_scan_order() -> Result<()> {
        let store = store_with(&[
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        ]);
        let outcome = store.search(&[0.0, 1.0], 3)?;
        let ids: Vec<i64> = outcome.hits.iter().map(|h| h.passage_id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_query_dimension_checked() {
        let store = store_with(&[vec![1.0, 0.0, 0.0]]);
        assert!(matches!(
            store.search(&[1.0, 0.0], 1),
            Err(CorpusError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_corrupt_rows_are_flagged_not_ranked() -> Result<()> {
        let store = store_with(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        store.conn().execute(
            "INSERT INTO embeddings (id, vector) VALUES (10, ?1)",
            params![vector_to_blob(&[1.0, 0.0, 0.0])],
        )?;
        store.conn().execute(
            "INSERT INTO embeddings (id, vector) VALUES (11, ?1)",
            params![vector_to_blob(&[f32::NAN, 0.0])],
        )?;
        store.conn().execute(
            "INSERT INTO embeddings (id, vector) VALUES (12, ?1)",
            params![vec![0u8; 7]],
        )?;

        let outcome = store.search(&[1.0, 0.0], 10)?;
        let ids: Vec<i64> = outcome.hits.iter().map(|h| h.passage_id).collect();
        assert_eq!(ids, vec![1, 2]);
        let kinds: Vec<FaultKind> = outcome.flagged.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FaultKind::BadShape, FaultKind::NonFinite, FaultKind::Unreadable]
        );

        assert!(matches!(
            store.get_vector(10),
            Err(CorpusError::Integrity { id: 10, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_verify_report() -> Result<()> {
        let store = store_with(&[vec![1.0, 0.0], vec![0.0, 0.0], vec![3.0, 4.0]]);
        store.conn().execute(
            "INSERT INTO embeddings (id, vector) VALUES (99, ?1)",
            params![vector_to_blob(&[1.0])],
        )?;
        store.conn().execute(
            "INSERT INTO passages (id, work_id, division_id, chapter, verse_start, verse_end, text) VALUES (50, 1, 1, 1, 1, 1, '')",
            [],
        )?;

        let report = store.verify()?;
        assert_eq!(report.dim, 2);
        assert_eq!(report.rows, 4);
        assert_eq!(report.passages, 4);
        assert_eq!(report.zero, 1);
        assert_eq!(report.bad_norm, 1);
        assert_eq!(report.bad_shape, 1);
        assert_eq!(report.missing_embedding, 1);
        assert_eq!(report.orphan_embedding, 1);
        assert!(!report.is_clean());
        Ok(())
    }

    #[test]
    fn test_missing_dim_meta() {
        let store = SemanticStore::open_in_memory().unwrap();
        assert!(matches!(store.dim(), Err(CorpusError::Config(_))));
    }

    #[test]
    fn test_insert_rejects_wrong_length() {
        let mut store = SemanticStore::open_in_memory().unwrap();
        store.set_meta(META_DIM, "3").unwrap();
        let err = store.insert_batch(&[(passage(1), vec![1.0, 0.0])]).unwrap_err();
        assert!(matches!(err, CorpusError::DimensionMismatch { .. }));
        assert_eq!(store.get_stats().unwrap().passage_count, 0);
    }
}

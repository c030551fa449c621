//! Relational corpus store
//!
//! Thin layer over a rusqlite connection. The row helpers take a plain
//! `&Connection` so the importer can run them inside a transaction.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;

use super::schema::{migrate, CORPUS_TABLES};
use crate::error::{CorpusError, Result};

/// Identity tuple of an edition; `None` compares equal to `""`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditionKey {
    pub kind: &'static str,
    pub language: &'static str,
    pub script: Option<&'static str>,
    pub translator: Option<&'static str>,
}

pub const DEVANAGARI_EDITION: EditionKey = EditionKey {
    kind: "source",
    language: "sa",
    script: Some("Deva"),
    translator: None,
};

pub const IAST_EDITION: EditionKey = EditionKey {
    kind: "source",
    language: "sa",
    script: Some("Latn"),
    translator: Some("IAST"),
};

pub const ENGLISH_EDITION: EditionKey = EditionKey {
    kind: "translation",
    language: "en",
    script: None,
    translator: Some("Unknown"),
};

/// Edition ids of the three default editions of one work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkEditions {
    pub devanagari: i64,
    pub iast: i64,
    pub english: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkRow {
    pub work_id: i64,
    pub title_en: String,
    pub title_sa: Option<String>,
    pub slug: String,
    pub work_type: String,
}

/// One verse with its three language bodies, as read from `verse_texts_wide`
#[derive(Debug, Clone, PartialEq)]
pub struct VerseTextRow {
    pub verse_id: i64,
    pub work_id: i64,
    pub division_id: i64,
    pub chapter: i64,
    pub verse_ordinal: i64,
    pub sa_deva: String,
    pub sa_iast: String,
    pub en_translation: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CorpusStats {
    pub works: usize,
    pub divisions: usize,
    pub verses: usize,
    pub editions: usize,
    pub verse_texts: usize,
    pub tokens: usize,
    pub verse_glosses: usize,
    pub fts_rows: usize,
}

pub struct CorpusStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl CorpusStore {
    /// Open (or create) the store and run the migration step
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        migrate(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Delete any existing file first, then open fresh
    pub fn open_reset(path: &Path) -> Result<Self> {
        if path.exists() {
            log::info!("Removing existing corpus store {}", path.display());
            std::fs::remove_file(path)?;
        }
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    pub fn find_work(&self, slug: &str) -> Result<Option<WorkRow>> {
        find_work(&self.conn, slug)
    }

    pub fn works(&self) -> Result<Vec<WorkRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT work_id, title_en, title_sa, slug, type FROM works ORDER BY work_id",
        )?;
        let rows = stmt.query_map([], work_from_row)?;
        let mut works = Vec::new();
        for row in rows {
            works.push(row?);
        }
        Ok(works)
    }

    /// Remove a work and, by cascade, everything it owns
    pub fn delete_work(&mut self, slug: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let Some(work) = find_work(&tx, slug)? else {
            return Ok(false);
        };
        tx.execute(
            "DELETE FROM fts_verse_texts WHERE work_id = ?1",
            params![work.work_id],
        )?;
        tx.execute("DELETE FROM works WHERE work_id = ?1", params![work.work_id])?;
        tx.commit()?;
        log::info!("Deleted work {} (work_id={})", slug, work.work_id);
        Ok(true)
    }

    pub fn get_stats(&self) -> Result<CorpusStats> {
        let mut counts = Vec::with_capacity(CORPUS_TABLES.len());
        for table in CORPUS_TABLES {
            counts.push(count_rows(&self.conn, table)?);
        }
        Ok(CorpusStats {
            works: counts[0],
            divisions: counts[1],
            verses: counts[2],
            editions: counts[3],
            verse_texts: counts[4],
            tokens: counts[5],
            verse_glosses: counts[6],
            fts_rows: count_rows(&self.conn, "fts_verse_texts")?,
        })
    }

    /// Every verse with its flattened bodies, in verse id order
    pub fn verse_texts(&self) -> Result<Vec<VerseTextRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT v.verse_id, v.work_id, v.division_id,
                   COALESCE(d.ordinal, 0) AS chapter_ord,
                   COALESCE(v.ordinal, 0) AS verse_ord,
                   COALESCE(w.sa_deva, '') AS sa_deva,
                   COALESCE(w.sa_iast, '') AS sa_iast,
                   COALESCE(w.en_translation, '') AS en_translation
            FROM verses v
            JOIN divisions d ON d.division_id = v.division_id
            LEFT JOIN verse_texts_wide w ON w.verse_id = v.verse_id
            ORDER BY v.verse_id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(VerseTextRow {
                verse_id: row.get(0)?,
                work_id: row.get(1)?,
                division_id: row.get(2)?,
                chapter: row.get(3)?,
                verse_ordinal: row.get(4)?,
                sa_deva: row.get(5)?,
                sa_iast: row.get(6)?,
                en_translation: row.get(7)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Glosses recorded for one surface form of a verse, oldest first
    pub fn glosses(&self, verse_id: i64, surface: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT gloss FROM verse_glosses WHERE verse_id = ?1 AND surface = ?2 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![verse_id, surface], |row| row.get(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(n as usize)
}

fn work_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkRow> {
    Ok(WorkRow {
        work_id: row.get(0)?,
        title_en: row.get(1)?,
        title_sa: row.get(2)?,
        slug: row.get(3)?,
        work_type: row.get(4)?,
    })
}

pub fn find_work(conn: &Connection, slug: &str) -> Result<Option<WorkRow>> {
    Ok(conn
        .query_row(
            "SELECT work_id, title_en, title_sa, slug, type FROM works WHERE slug = ?1",
            params![slug],
            work_from_row,
        )
        .optional()?)
}

/// Reuse the work with this slug (refreshing its descriptive fields) or insert it.
/// Returns the work id and whether a new row was created.
pub fn upsert_work(
    conn: &Connection,
    slug: &str,
    title: &str,
    title_sa: Option<&str>,
    work_type: &str,
) -> Result<(i64, bool)> {
    if let Some(existing) = find_work(conn, slug)? {
        conn.execute(
            "UPDATE works SET type = ?1, title_en = ?2, title_sa = COALESCE(?3, title_sa) WHERE work_id = ?4",
            params![work_type, title, title_sa, existing.work_id],
        )?;
        return Ok((existing.work_id, false));
    }

    conn.execute(
        "INSERT INTO works (title_en, title_sa, canonical_ref, slug, type) VALUES (?1, ?2, NULL, ?3, ?4)",
        params![title, title_sa, slug, work_type],
    )
    .map_err(|e| CorpusError::from(e).with_context(format!("work slug={}", slug)))?;
    Ok((conn.last_insert_rowid(), true))
}

pub fn get_or_create_edition(conn: &Connection, work_id: i64, key: &EditionKey) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            r#"
            SELECT edition_id FROM editions
            WHERE work_id = ?1 AND kind = ?2 AND language = ?3
              AND IFNULL(script, '') = IFNULL(?4, '')
              AND IFNULL(translator, '') = IFNULL(?5, '')
            "#,
            params![work_id, key.kind, key.language, key.script, key.translator],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO editions (work_id, kind, language, script, translator, is_default) VALUES (?1, ?2, ?3, ?4, ?5, 1)",
        params![work_id, key.kind, key.language, key.script, key.translator],
    )
    .map_err(|e| {
        CorpusError::from(e).with_context(format!(
            "edition work_id={} kind={} language={}",
            work_id, key.kind, key.language
        ))
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn default_editions(conn: &Connection, work_id: i64) -> Result<WorkEditions> {
    Ok(WorkEditions {
        devanagari: get_or_create_edition(conn, work_id, &DEVANAGARI_EDITION)?,
        iast: get_or_create_edition(conn, work_id, &IAST_EDITION)?,
        english: get_or_create_edition(conn, work_id, &ENGLISH_EDITION)?,
    })
}

pub fn find_division(
    conn: &Connection,
    work_id: i64,
    level_name: &str,
    ordinal: i64,
) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            r#"
            SELECT division_id FROM divisions
            WHERE work_id = ?1 AND level_name = ?2 AND ordinal = ?3 AND parent_id IS NULL
            ORDER BY division_id LIMIT 1
            "#,
            params![work_id, level_name, ordinal],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn insert_division(
    conn: &Connection,
    work_id: i64,
    parent_id: Option<i64>,
    level_name: &str,
    ordinal: i64,
    label: &str,
) -> Result<i64> {
    let slug = format!("{}-{}", level_name, ordinal);
    conn.execute(
        "INSERT INTO divisions (work_id, parent_id, level_name, ordinal, label, slug) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![work_id, parent_id, level_name, ordinal, label, slug],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_verse(conn: &Connection, division_id: i64, ref_citation: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT verse_id FROM verses WHERE division_id = ?1 AND ref_citation = ?2 ORDER BY verse_id LIMIT 1",
            params![division_id, ref_citation],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn insert_verse(
    conn: &Connection,
    work_id: i64,
    division_id: i64,
    ref_citation: &str,
    ordinal: i64,
    chapter: i64,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO verses (work_id, division_id, ref_citation, ordinal, ref_level1, ref_level2, ref_level3)
        VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)
        "#,
        params![
            work_id,
            division_id,
            ref_citation,
            ordinal,
            chapter.to_string(),
            ordinal.to_string()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Store one body per (verse, edition) and mirror it into the FTS table
pub fn put_verse_text(
    conn: &Connection,
    work_id: i64,
    verse_id: i64,
    edition_id: i64,
    body: &str,
) -> Result<()> {
    let existed = conn
        .query_row(
            "SELECT 1 FROM verse_texts WHERE verse_id = ?1 AND edition_id = ?2",
            params![verse_id, edition_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    conn.execute(
        r#"
        INSERT INTO verse_texts (verse_id, edition_id, body) VALUES (?1, ?2, ?3)
        ON CONFLICT(verse_id, edition_id) DO UPDATE SET body = excluded.body
        "#,
        params![verse_id, edition_id, body],
    )?;

    if existed {
        conn.execute(
            "DELETE FROM fts_verse_texts WHERE verse_id = ?1 AND edition_id = ?2",
            params![verse_id, edition_id],
        )?;
    }
    conn.execute(
        r#"
        INSERT INTO fts_verse_texts (work_id, edition_id, verse_id, kind, language, script, body)
        SELECT ?1, e.edition_id, ?2, e.kind, e.language, IFNULL(e.script, ''), ?3
        FROM editions e WHERE e.edition_id = ?4
        "#,
        params![work_id, verse_id, body, edition_id],
    )?;
    Ok(())
}

pub fn insert_token(
    conn: &Connection,
    verse_id: i64,
    edition_id: i64,
    pos: i64,
    surface: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tokens (verse_id, edition_id, pos, surface) VALUES (?1, ?2, ?3, ?4)",
        params![verse_id, edition_id, pos, surface],
    )
    .map_err(|e| {
        CorpusError::from(e).with_context(format!("token verse_id={} pos={}", verse_id, pos))
    })?;
    Ok(())
}

/// Drop a verse's token list for one edition; returns the number removed
pub fn clear_tokens(conn: &Connection, verse_id: i64, edition_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM tokens WHERE verse_id = ?1 AND edition_id = ?2",
        params![verse_id, edition_id],
    )?)
}

/// Returns false when the (verse, surface, gloss) triple was already present
pub fn insert_gloss(
    conn: &Connection,
    work_id: i64,
    verse_id: i64,
    surface: &str,
    gloss: &str,
    source: &str,
) -> Result<bool> {
    let changed = conn.execute(
        r#"
        INSERT INTO verse_glosses (work_id, verse_id, surface, gloss, source) VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(verse_id, surface, gloss) DO NOTHING
        "#,
        params![work_id, verse_id, surface, gloss, source],
    )?;
    Ok(changed == 1)
}

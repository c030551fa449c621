//! Relational corpus schema and its migration step
//!
//! `migrate` is the only place tables are created. It is idempotent
//! (`CREATE ... IF NOT EXISTS`) and runs once per opened store, before any
//! import touches the connection.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub const CORPUS_TABLES: &[&str] = &[
    "works",
    "divisions",
    "verses",
    "editions",
    "verse_texts",
    "tokens",
    "verse_glosses",
];

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS works (
  work_id       INTEGER PRIMARY KEY,
  title_en      TEXT NOT NULL,
  title_sa      TEXT,
  canonical_ref TEXT,
  slug          TEXT UNIQUE,
  type          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS divisions (
  division_id   INTEGER PRIMARY KEY,
  work_id       INTEGER NOT NULL REFERENCES works(work_id) ON DELETE CASCADE,
  parent_id     INTEGER REFERENCES divisions(division_id) ON DELETE CASCADE,
  level_name    TEXT NOT NULL,
  ordinal       INTEGER,
  label         TEXT,
  slug          TEXT
);
CREATE INDEX IF NOT EXISTS idx_divisions_work ON divisions(work_id);

CREATE TABLE IF NOT EXISTS verses (
  verse_id      INTEGER PRIMARY KEY,
  work_id       INTEGER NOT NULL REFERENCES works(work_id) ON DELETE CASCADE,
  division_id   INTEGER NOT NULL REFERENCES divisions(division_id) ON DELETE CASCADE,
  ref_citation  TEXT,
  ordinal       INTEGER,
  ref_level1    TEXT,
  ref_level2    TEXT,
  ref_level3    TEXT
);
CREATE INDEX IF NOT EXISTS idx_verses_division ON verses(division_id, ordinal);
CREATE INDEX IF NOT EXISTS idx_verses_ref ON verses(division_id, ref_citation);

CREATE TABLE IF NOT EXISTS editions (
  edition_id  INTEGER PRIMARY KEY,
  work_id     INTEGER NOT NULL REFERENCES works(work_id) ON DELETE CASCADE,
  kind        TEXT NOT NULL,
  language    TEXT NOT NULL,
  script      TEXT,
  translator  TEXT,
  is_default  INTEGER DEFAULT 1
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_editions_uniq
  ON editions(work_id, kind, language, IFNULL(script, ''), IFNULL(translator, ''));

CREATE TABLE IF NOT EXISTS verse_texts (
  verse_id    INTEGER NOT NULL REFERENCES verses(verse_id) ON DELETE CASCADE,
  edition_id  INTEGER NOT NULL REFERENCES editions(edition_id) ON DELETE CASCADE,
  body        TEXT NOT NULL,
  notes_json  TEXT,
  PRIMARY KEY (verse_id, edition_id)
);
CREATE INDEX IF NOT EXISTS idx_verse_texts_edition ON verse_texts(edition_id);

CREATE TABLE IF NOT EXISTS verse_glosses (
  work_id   INTEGER NOT NULL REFERENCES works(work_id) ON DELETE CASCADE,
  verse_id  INTEGER NOT NULL REFERENCES verses(verse_id) ON DELETE CASCADE,
  surface   TEXT    NOT NULL,
  gloss     TEXT    NOT NULL,
  source    TEXT,
  UNIQUE(verse_id, surface, gloss)
);
CREATE INDEX IF NOT EXISTS idx_vg_verse_surface ON verse_glosses(verse_id, surface);
CREATE INDEX IF NOT EXISTS idx_vg_work_surface  ON verse_glosses(work_id, surface);

CREATE TABLE IF NOT EXISTS tokens (
  token_id    INTEGER PRIMARY KEY,
  verse_id    INTEGER NOT NULL REFERENCES verses(verse_id) ON DELETE CASCADE,
  edition_id  INTEGER NOT NULL REFERENCES editions(edition_id) ON DELETE CASCADE,
  pos         INTEGER NOT NULL,
  surface     TEXT NOT NULL,
  lemma       TEXT,
  morph       TEXT,
  start_char  INTEGER,
  end_char    INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_unique ON tokens(verse_id, edition_id, pos);

CREATE VIRTUAL TABLE IF NOT EXISTS fts_verse_texts USING fts5(
  work_id UNINDEXED,
  edition_id UNINDEXED,
  verse_id UNINDEXED,
  kind,
  language,
  script,
  body,
  tokenize = 'unicode61 remove_diacritics 2'
);

CREATE VIEW IF NOT EXISTS verse_texts_wide AS
SELECT
  v.verse_id,
  v.work_id,
  v.division_id,
  v.ref_citation,
  MAX(CASE WHEN e.language = 'sa' AND e.script = 'Deva' THEN t.body END) AS sa_deva,
  MAX(CASE WHEN e.language = 'sa' AND e.script = 'Latn' THEN t.body END) AS sa_iast,
  MAX(CASE WHEN e.language = 'en' THEN t.body END) AS en_translation
FROM verse_texts t
JOIN verses   v ON v.verse_id   = t.verse_id
JOIN editions e ON e.edition_id = t.edition_id
GROUP BY v.verse_id, v.work_id, v.division_id, v.ref_citation;
"#;

/// Enable foreign keys and bring the schema up to `SCHEMA_VERSION`
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
        log::debug!("Corpus schema at version {}, nothing to migrate", version);
        return Ok(());
    }

    log::info!(
        "Migrating corpus schema from version {} to {}",
        version,
        SCHEMA_VERSION
    );
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view')",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let before = table_count(&conn);
        migrate(&conn).unwrap();
        assert_eq!(before, table_count(&conn));

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_all_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        for table in CORPUS_TABLES.iter().chain(["fts_verse_texts", "verse_texts_wide"].iter()) {
            let n: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(n, 1, "missing {}", table);
        }
    }
}

//! Corpus importer / merger
//!
//! Turns parsed corpus documents into rows. Each work is written inside its
//! own transaction: a failure rolls back that work only, works committed
//! earlier in the same file stay in place.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::document::{CorpusDocument, VerseDoc, WorkDoc};
use super::slug::slugify;
use super::store::{
    clear_tokens, default_editions, find_division, find_verse, insert_division, insert_gloss,
    insert_token, insert_verse, put_verse_text, upsert_work, CorpusStore, WorkEditions,
};
use crate::config::Config;
use crate::error::{CorpusError, Result};

pub const CHAPTER_LEVEL: &str = "chapter";
pub const GLOSS_SOURCE: &str = "json";
const UNTITLED: &str = "Untitled";

/// How verses are treated when the same document is imported again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersePolicy {
    /// Every run inserts new division and verse rows
    #[default]
    Append,
    /// Reuse the division with the same ordinal and the verse with the same citation
    DedupeByRef,
}

/// Per-run settings shared by every import operation
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub default_type: String,
    pub verse_policy: VersePolicy,
}

impl ImportContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_type: config.default_type.clone(),
            verse_policy: if config.dedupe_verses {
                VersePolicy::DedupeByRef
            } else {
                VersePolicy::Append
            },
        }
    }
}

impl Default for ImportContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct WorkSummary {
    pub title: String,
    pub slug: String,
    pub work_id: i64,
    pub created: bool,
    pub divisions: usize,
    pub verses: usize,
    pub verse_texts: usize,
    pub tokens: usize,
    pub glosses: usize,
    pub duplicate_glosses: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
    /// Works of this file that committed before the failing one
    pub committed_works: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
    pub works: Vec<WorkSummary>,
}

impl ImportReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct Importer<'a> {
    store: &'a mut CorpusStore,
    ctx: &'a ImportContext,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a mut CorpusStore, ctx: &'a ImportContext) -> Self {
        Self { store, ctx }
    }

    /// Import every file, continuing past failures
    pub fn import_files(&mut self, files: &[PathBuf]) -> ImportReport {
        let mut report = ImportReport::default();

        for path in files {
            let mut committed = Vec::new();
            match self.import_file(path, &mut committed) {
                Ok(()) => report.succeeded.push(path.clone()),
                Err(e) => {
                    log::error!(
                        "Failed to import {} ({} work(s) committed before the error): {}",
                        path.display(),
                        committed.len(),
                        e
                    );
                    report.failed.push(FileFailure {
                        path: path.clone(),
                        error: e.to_string(),
                        committed_works: committed.len(),
                    });
                }
            }
            report.works.extend(committed);
        }

        report
    }

    /// Import one file. Summaries are pushed as each work commits, so they
    /// are still there when a later work fails.
    pub fn import_file(&mut self, path: &Path, committed: &mut Vec<WorkSummary>) -> Result<()> {
        let document = CorpusDocument::load(path)?;
        log::debug!(
            "{}: {} work(s) parsed",
            path.display(),
            document.works().len()
        );
        self.import_works(document.works(), committed)
    }

    pub fn import_works(&mut self, works: &[WorkDoc], committed: &mut Vec<WorkSummary>) -> Result<()> {
        for work in works {
            committed.push(self.import_work(work)?);
        }
        Ok(())
    }

    /// Merge one work and all of its children in a single transaction
    pub fn import_work(&mut self, work: &WorkDoc) -> Result<WorkSummary> {
        let title = work.title.clone().unwrap_or_else(|| UNTITLED.to_string());
        let work_type = work
            .work_type
            .clone()
            .unwrap_or_else(|| self.ctx.default_type.clone());
        let slug = slugify(&title);
        let policy = self.ctx.verse_policy;

        let tx = self.store.transaction()?;

        let (work_id, created) =
            upsert_work(&tx, &slug, &title, work.title_sa.as_deref(), &work_type)?;
        let editions = default_editions(&tx, work_id)?;

        let mut summary = WorkSummary {
            title: title.clone(),
            slug: slug.clone(),
            work_id,
            created,
            ..Default::default()
        };

        for (ci, chapter) in work.chapters.iter().enumerate() {
            let ch_num = chapter.number.unwrap_or(ci as i64 + 1);
            let label = chapter
                .label
                .clone()
                .unwrap_or_else(|| format!("Chapter {}", ch_num));

            let existing = match policy {
                VersePolicy::DedupeByRef => find_division(&tx, work_id, CHAPTER_LEVEL, ch_num)?,
                VersePolicy::Append => None,
            };
            let division_id = match existing {
                Some(id) => id,
                None => {
                    summary.divisions += 1;
                    insert_division(&tx, work_id, None, CHAPTER_LEVEL, ch_num, &label)?
                }
            };

            for (vi, verse) in chapter.verses.iter().enumerate() {
                let v_num = verse.number.unwrap_or(vi as i64 + 1);
                let reference = verse
                    .reference
                    .clone()
                    .unwrap_or_else(|| format!("{}.{}", ch_num, v_num));

                let existing = match policy {
                    VersePolicy::DedupeByRef => find_verse(&tx, division_id, &reference)?,
                    VersePolicy::Append => None,
                };
                let verse_id = match existing {
                    Some(id) => {
                        // the incoming word list replaces the stored one
                        clear_tokens(&tx, id, editions.devanagari)?;
                        id
                    }
                    None => {
                        summary.verses += 1;
                        insert_verse(&tx, work_id, division_id, &reference, v_num, ch_num)
                            .map_err(|e| {
                                e.with_context(format!("work {} verse {}", slug, reference))
                            })?
                    }
                };

                write_verse_body(&tx, work_id, verse_id, &editions, verse, &mut summary)?;
            }
        }

        tx.commit()?;
        log::info!(
            "Imported: {} (work_id={}, verses={})",
            title,
            work_id,
            summary.verses
        );
        Ok(summary)
    }
}

fn write_verse_body(
    conn: &rusqlite::Connection,
    work_id: i64,
    verse_id: i64,
    editions: &WorkEditions,
    verse: &VerseDoc,
    summary: &mut WorkSummary,
) -> Result<()> {
    let bodies = [
        (editions.devanagari, &verse.devanagari),
        (editions.iast, &verse.iast),
        (editions.english, &verse.translation),
    ];
    for (edition_id, body) in bodies {
        if let Some(body) = body {
            put_verse_text(conn, work_id, verse_id, edition_id, body)?;
            summary.verse_texts += 1;
        }
    }

    // positions count only entries that carry a surface form
    let mut pos: i64 = 1;
    for word in &verse.word_by_word {
        let surface = match &word.surface {
            Some(s) if !s.trim().is_empty() => s.as_str(),
            _ => continue,
        };
        insert_token(conn, verse_id, editions.devanagari, pos, surface)?;
        summary.tokens += 1;
        pos += 1;

        for gloss in &word.glosses {
            if insert_gloss(conn, work_id, verse_id, surface, gloss, GLOSS_SOURCE)? {
                summary.glosses += 1;
            } else {
                summary.duplicate_glosses += 1;
            }
        }
    }
    Ok(())
}

/// Explicit files plus files under `dir` whose name matches `pattern`.
/// Missing files and non-`.json` files are dropped; order is kept, duplicates removed.
pub fn list_json_files(files: &[PathBuf], dir: Option<&Path>, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob::Pattern::new(pattern)
        .map_err(|e| CorpusError::Config(format!("invalid pattern '{}': {}", pattern, e)))?;

    let mut candidates: Vec<PathBuf> = files.to_vec();
    if let Some(dir) = dir {
        let mut found: Vec<PathBuf> = WalkDir::new(dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| matcher.matches(name))
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        found.sort();
        candidates.extend(found);
    }

    let mut seen = HashSet::new();
    Ok(candidates
        .into_iter()
        .filter(|p| p.exists())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("json"))
                .unwrap_or(false)
        })
        .filter(|p| seen.insert(p.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn import_doc(
        store: &mut CorpusStore,
        ctx: &ImportContext,
        doc: &CorpusDocument,
    ) -> Result<Vec<WorkSummary>> {
        let mut summaries = Vec::new();
        Importer::new(store, ctx).import_works(doc.works(), &mut summaries)?;
        Ok(summaries)
    }

    fn isa_document() -> CorpusDocument {
        let value = json!({
            "title": "Isa Upanishad",
            "type": "Upanishad",
            "chapters": [{
                "number": 1,
                "verses": [{
                    "number": 1,
                    "ref": "1.1",
                    "devanagari": "ॐ",
                    "iast": "om",
                    "translation": "Om.",
                    "word_by_word": [{"sanskrit": "om", "english": "Om"}]
                }]
            }]
        });
        CorpusDocument::from_value(&value, Path::new("isa.json")).unwrap()
    }

    #[test]
    fn test_isa_scenario() -> Result<()> {
        let mut store = CorpusStore::open_in_memory()?;
        let ctx = ImportContext::default();
        let summaries = import_doc(&mut store, &ctx, &isa_document())?;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].slug, "isa-upanishad");
        assert!(summaries[0].created);

        let stats = store.get_stats()?;
        assert_eq!(stats.works, 1);
        assert_eq!(stats.divisions, 1);
        assert_eq!(stats.verses, 1);
        assert_eq!(stats.editions, 3);
        assert_eq!(stats.verse_texts, 3);
        assert_eq!(stats.tokens, 1);
        assert_eq!(stats.verse_glosses, 1);
        assert_eq!(stats.fts_rows, 3);

        let work = store.find_work("isa-upanishad")?.unwrap();
        assert_eq!(work.work_type, "Upanishad");
        Ok(())
    }

    #[test]
    fn test_reimport_append_keeps_identity() -> Result<()> {
        let mut store = CorpusStore::open_in_memory()?;
        let ctx = ImportContext::default();
        let doc = isa_document();
        import_doc(&mut store, &ctx, &doc)?;
        let second = import_doc(&mut store, &ctx, &doc)?;

        assert!(!second[0].created);
        // the re-imported verse is a new row, so its gloss is new as well
        assert_eq!(second[0].duplicate_glosses, 0);

        let stats = store.get_stats()?;
        assert_eq!(stats.works, 1);
        assert_eq!(stats.editions, 3);
        assert_eq!(stats.divisions, 2);
        assert_eq!(stats.verses, 2);
        assert_eq!(stats.verse_texts, 6);
        Ok(())
    }

    #[test]
    fn test_reimport_dedupe_by_ref() -> Result<()> {
        let mut store = CorpusStore::open_in_memory()?;
        let ctx = ImportContext {
            verse_policy: VersePolicy::DedupeByRef,
            ..Default::default()
        };
        let doc = isa_document();
        import_doc(&mut store, &ctx, &doc)?;
        let second = import_doc(&mut store, &ctx, &doc)?;

        assert_eq!(second[0].verses, 0);
        assert_eq!(second[0].duplicate_glosses, 1);

        let stats = store.get_stats()?;
        assert_eq!(stats.works, 1);
        assert_eq!(stats.divisions, 1);
        assert_eq!(stats.verses, 1);
        assert_eq!(stats.verse_texts, 3);
        assert_eq!(stats.tokens, 1);
        assert_eq!(stats.verse_glosses, 1);
        assert_eq!(stats.fts_rows, 3);
        Ok(())
    }

    #[test]
    fn test_dedupe_by_ref_replaces_word_list() -> Result<()> {
        let mut store = CorpusStore::open_in_memory()?;
        let ctx = ImportContext {
            verse_policy: VersePolicy::DedupeByRef,
            ..Default::default()
        };
        let first = json!({
            "title": "Isa Upanishad",
            "chapters": [{"number": 1, "verses": [{
                "ref": "1.1",
                "iast": "īśā vāsyam idaṃ",
                "word_by_word": [
                    {"sanskrit": "īśā", "english": "by the Lord"},
                    {"sanskrit": "vāsyam", "english": "pervaded"},
                    {"sanskrit": "idam", "english": "this"}
                ]
            }]}]
        });
        let second = json!({
            "title": "Isa Upanishad",
            "chapters": [{"number": 1, "verses": [{
                "ref": "1.1",
                "iast": "īśāvāsyam",
                "word_by_word": [{"sanskrit": "īśāvāsyam", "english": "to be dwelt in by the Lord"}]
            }]}]
        });
        import_doc(
            &mut store,
            &ctx,
            &CorpusDocument::from_value(&first, Path::new("a.json"))?,
        )?;
        let summaries = import_doc(
            &mut store,
            &ctx,
            &CorpusDocument::from_value(&second, Path::new("b.json"))?,
        )?;
        assert_eq!(summaries[0].verses, 0);
        assert_eq!(summaries[0].tokens, 1);

        let tokens: Vec<(i64, String)> = store
            .conn()
            .prepare("SELECT pos, surface FROM tokens ORDER BY pos")?
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        assert_eq!(tokens, vec![(1, "īśāvāsyam".to_string())]);

        // glosses accumulate across imports
        let stats = store.get_stats()?;
        assert_eq!(stats.verses, 1);
        assert_eq!(stats.verse_glosses, 4);
        assert_eq!(stats.verse_texts, 1);
        Ok(())
    }

    #[test]
    fn test_failed_work_keeps_earlier_summaries() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("two.json");
        let value = json!([
            {"title": "First", "chapters": [{"verses": [{"iast": "a"}]}]},
            {"title": "Second", "chapters": [{"verses": [{"iast": "b"}]}]}
        ]);
        std::fs::write(&path, value.to_string())?;

        let mut store = CorpusStore::open_in_memory()?;
        store.conn().execute_batch(
            "CREATE TRIGGER reject_second BEFORE INSERT ON works
             WHEN NEW.slug = 'second'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )?;
        let ctx = ImportContext::default();
        let report = Importer::new(&mut store, &ctx).import_files(&[path.clone()]);

        assert!(report.succeeded.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, path);
        assert_eq!(report.failed[0].committed_works, 1);
        assert_eq!(report.works.len(), 1);
        assert_eq!(report.works[0].slug, "first");

        assert!(store.find_work("first")?.is_some());
        assert!(store.find_work("second")?.is_none());
        Ok(())
    }

    #[test]
    fn test_defaults_and_fallbacks() -> Result<()> {
        let value = json!({
            "chapters": [
                {"verses": [{"deva": "अ"}, {}]},
                {"verses": [{"number": 7, "english": "Seven."}]}
            ]
        });
        let doc = CorpusDocument::from_value(&value, Path::new("anon.json"))?;
        let mut store = CorpusStore::open_in_memory()?;
        let ctx = ImportContext::default();
        let summaries = import_doc(&mut store, &ctx, &doc)?;

        assert_eq!(summaries[0].slug, "untitled");
        assert_eq!(summaries[0].verse_texts, 2);
        let work = store.find_work("untitled")?.unwrap();
        assert_eq!(work.work_type, "Others");

        let refs: Vec<String> = store
            .conn()
            .prepare("SELECT ref_citation FROM verses ORDER BY verse_id")?
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        assert_eq!(refs, vec!["1.1", "1.2", "2.7"]);
        Ok(())
    }

    #[test]
    fn test_words_without_surface_do_not_consume_position() -> Result<()> {
        let value = json!({
            "title": "W",
            "chapters": [{"verses": [{
                "iast": "a b",
                "word_by_word": [
                    {"english": "orphan"},
                    {"word": "a", "gloss": ["x", "y", "x"]},
                    {"surface": "b", "meaning": ""}
                ]
            }]}]
        });
        let doc = CorpusDocument::from_value(&value, Path::new("w.json"))?;
        let mut store = CorpusStore::open_in_memory()?;
        let ctx = ImportContext::default();
        let summaries = import_doc(&mut store, &ctx, &doc)?;
        let summary = &summaries[0];

        assert_eq!(summary.tokens, 2);
        assert_eq!(summary.glosses, 2);
        assert_eq!(summary.duplicate_glosses, 1);

        let positions: Vec<(i64, String)> = store
            .conn()
            .prepare("SELECT pos, surface FROM tokens ORDER BY pos")?
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        assert_eq!(positions, vec![(1, "a".to_string()), (2, "b".to_string())]);
        Ok(())
    }
}

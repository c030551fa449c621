use std::path::Path;

use anyhow::Result;
use colored::*;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use shloka_index::core::store::{CorpusStats, CorpusStore, WorkRow};
use shloka_index::search::vectordb::{SemanticStats, SemanticStore};

use super::Library;

#[derive(Serialize)]
struct LibraryStatus {
    corpus_db: String,
    semantic_db: String,
    corpus: Option<CorpusStats>,
    works: Vec<WorkStatus>,
    semantic: Option<SemanticStats>,
    semantic_file_size: Option<u64>,
}

#[derive(Serialize)]
struct WorkStatus {
    work_id: i64,
    slug: String,
    title: String,
    work_type: String,
}

impl From<WorkRow> for WorkStatus {
    fn from(row: WorkRow) -> Self {
        Self {
            work_id: row.work_id,
            slug: row.slug,
            title: row.title_en,
            work_type: row.work_type,
        }
    }
}

pub fn run(library: &Library, brief: bool, json: bool) -> Result<()> {
    let corpus_path = library.corpus_db();
    let semantic_path = library.semantic_db();

    let (corpus, works) = if corpus_path.exists() {
        let store = CorpusStore::open(&corpus_path)?;
        let works: Vec<WorkStatus> = store.works()?.into_iter().map(WorkStatus::from).collect();
        (Some(store.get_stats()?), works)
    } else {
        (None, Vec::new())
    };

    let semantic = if semantic_path.exists() {
        Some(SemanticStore::open(&semantic_path)?.get_stats()?)
    } else {
        None
    };

    let status = LibraryStatus {
        corpus_db: corpus_path.display().to_string(),
        semantic_db: semantic_path.display().to_string(),
        corpus,
        works,
        semantic,
        semantic_file_size: file_size(&semantic_path),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status, brief);
    }

    Ok(())
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).map(|m| m.len()).ok()
}

fn print_status(status: &LibraryStatus, brief: bool) {
    println!("{}", "Library Status".bold());
    println!();

    match &status.corpus {
        Some(stats) => {
            println!("{} {}", "Corpus".cyan(), status.corpus_db.dimmed());
            println!("  {} {} works", "→".dimmed(), stats.works.to_string().cyan());
            println!("  {} {} chapters", "→".dimmed(), stats.divisions);
            println!("  {} {} verses", "→".dimmed(), stats.verses.to_string().cyan());
            println!("  {} {} editions", "→".dimmed(), stats.editions);
            println!("  {} {} verse texts", "→".dimmed(), stats.verse_texts);
            println!("  {} {} tokens", "→".dimmed(), stats.tokens);
            println!("  {} {} glosses", "→".dimmed(), stats.verse_glosses);
            if stats.fts_rows != stats.verse_texts {
                println!(
                    "  {} full-text index has {} rows for {} verse texts",
                    "!".yellow().bold(),
                    stats.fts_rows,
                    stats.verse_texts
                );
            }
        }
        None => println!(
            "{} Corpus store not found. Run {} first.",
            "!".yellow().bold(),
            "shloka import".cyan()
        ),
    }

    if !brief && !status.works.is_empty() {
        println!();
        // display width, not char count
        let title_width = status
            .works
            .iter()
            .map(|w| w.title.width())
            .max()
            .unwrap_or(0);
        for work in &status.works {
            let padding = " ".repeat(title_width - work.title.width());
            println!(
                "  {:>4}  {}{}  {} [{}]",
                work.work_id,
                work.title,
                padding,
                work.slug.dimmed(),
                work.work_type
            );
        }
    }

    println!();
    match &status.semantic {
        Some(stats) => {
            println!("{} {}", "Semantic".cyan(), status.semantic_db.dimmed());
            println!(
                "  {} {} passages, {} embeddings",
                "→".dimmed(),
                stats.passage_count.to_string().cyan(),
                stats.embedding_count
            );
            if let Some(dim) = stats.dim {
                println!("  {} dim {}", "→".dimmed(), dim);
            }
            if let Some(ref algorithm) = stats.algorithm {
                println!("  {} algorithm {}", "→".dimmed(), algorithm);
            }
            if let Some(ref built_at) = stats.built_at {
                println!("  {} built {}", "→".dimmed(), built_at);
            }
            if let Some(size) = status.semantic_file_size {
                println!("  {} Size: {:.2} KB", "→".dimmed(), size as f64 / 1024.0);
            }
        }
        None => println!(
            "{} Semantic store not found. Run {} first.",
            "!".yellow().bold(),
            "shloka build".cyan()
        ),
    }
}

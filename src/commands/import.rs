//! Import command - merge JSON corpus files into the corpus store

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use shloka_index::core::importer::{list_json_files, ImportContext, Importer, VersePolicy};
use shloka_index::core::store::CorpusStore;

use super::Library;

pub struct ImportArgs {
    pub files: Vec<PathBuf>,
    pub dir: Option<PathBuf>,
    pub pattern: Option<String>,
    pub reset: bool,
    pub dedupe_verses: bool,
    pub default_type: Option<String>,
    pub json: bool,
}

/// Run import command
pub fn run(library: &Library, args: ImportArgs) -> Result<()> {
    let mut ctx = ImportContext::from_config(&library.config);
    if let Some(default_type) = args.default_type {
        ctx.default_type = default_type;
    }
    if args.dedupe_verses {
        ctx.verse_policy = VersePolicy::DedupeByRef;
    }

    let pattern = args
        .pattern
        .unwrap_or_else(|| library.config.pattern.clone());
    // With no explicit inputs, fall back to the configured JSON directory
    let dir = match (&args.dir, args.files.is_empty()) {
        (Some(dir), _) => Some(library.paths.resolve(dir)),
        (None, true) => Some(library.config.json_dir_path(&library.paths)),
        (None, false) => None,
    };
    let files = list_json_files(&args.files, dir.as_deref(), &pattern)?;

    if files.is_empty() {
        if args.json {
            println!(
                "{}",
                serde_json::json!({ "error": "No JSON files to import" })
            );
        } else {
            eprintln!("{} No JSON files to import", "Error:".red().bold());
        }
        std::process::exit(1);
    }

    let db_path = library.corpus_db();
    let mut store = if args.reset {
        CorpusStore::open_reset(&db_path)
    } else {
        CorpusStore::open(&db_path)
    }
    .with_context(|| format!("Failed to open {}", db_path.display()))?;

    if !args.json {
        println!(
            "{} Importing {} file(s) into {}",
            "→".dimmed(),
            files.len(),
            db_path.display()
        );
    }

    let report = Importer::new(&mut store, &ctx).import_files(&files);

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "database": db_path.display().to_string(),
                "verse_policy": ctx.verse_policy,
                "succeeded": report.succeeded.len(),
                "failed": report.failed,
                "works": report.works,
            })
        );
    } else {
        println!();
        for work in &report.works {
            let marker = if work.created { "+".green() } else { "~".yellow() };
            println!(
                "  {} {} ({})  {} chapters, {} verses, {} texts, {} tokens, {} glosses",
                marker,
                work.title.cyan(),
                work.slug.dimmed(),
                work.divisions,
                work.verses,
                work.verse_texts,
                work.tokens,
                work.glosses
            );
        }
        for failure in &report.failed {
            println!(
                "  {} {}: {}",
                "✗".red(),
                failure.path.display(),
                failure.error
            );
        }

        let stats = store.get_stats()?;
        println!();
        println!(
            "{} {} succeeded, {} failed",
            "Summary:".bold(),
            report.succeeded.len().to_string().green(),
            if report.has_failures() {
                report.failed.len().to_string().red()
            } else {
                report.failed.len().to_string().green()
            }
        );
        println!(
            "  {} works, {} verses, {} verse texts, {} glosses in store",
            stats.works, stats.verses, stats.verse_texts, stats.verse_glosses
        );
    }

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

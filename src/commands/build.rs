//! Build command - derive the semantic store from the corpus

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use shloka_index::core::store::CorpusStore;
use shloka_index::search::embedding::HashingEncoder;
use shloka_index::search::engine::{build_semantic_store, ExternalVectors, VectorSource};

use super::Library;

pub struct BuildArgs {
    pub dim: Option<usize>,
    pub vectors: Option<PathBuf>,
    pub algorithm: Option<String>,
    pub json: bool,
}

/// Run build command
pub fn run(library: &Library, args: BuildArgs) -> Result<()> {
    let corpus_path = library.corpus_db();
    if !corpus_path.exists() {
        if args.json {
            println!(
                "{}",
                serde_json::json!({
                    "error": "Corpus store not found",
                    "corpus_db": corpus_path.display().to_string(),
                    "hint": "Run `shloka import` first"
                })
            );
        } else {
            eprintln!(
                "{} Corpus store not found at: {}",
                "Error:".red().bold(),
                corpus_path.display()
            );
        }
        std::process::exit(1);
    }

    let corpus = CorpusStore::open(&corpus_path)
        .with_context(|| format!("Failed to open {}", corpus_path.display()))?;
    let target = library.semantic_db();

    if !args.json {
        println!("{} Building semantic store...", "→".dimmed());
    }

    let stats = match args.vectors {
        Some(ref path) => {
            let vectors = ExternalVectors::load(path, args.algorithm.as_deref())
                .with_context(|| format!("Failed to load vectors from {}", path.display()))?;
            build_semantic_store(&corpus, &target, VectorSource::External(&vectors))?
        }
        None => {
            let encoder = HashingEncoder::new(args.dim.unwrap_or(library.config.dim))?;
            build_semantic_store(&corpus, &target, VectorSource::Encoder(&encoder))?
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "semantic_db": target.display().to_string(),
                "passages": stats.passages,
                "zero_vectors": stats.zero_vectors,
                "dim": stats.dim,
                "algorithm": stats.algorithm,
                "duration_ms": stats.duration_ms,
            })
        );
    } else {
        println!();
        println!("{}", "Build Complete".green().bold());
        println!(
            "  {} {} passages",
            "✓".green(),
            stats.passages.to_string().cyan()
        );
        if stats.zero_vectors > 0 {
            println!(
                "  {} {} passages without text (zero vectors)",
                "→".dimmed(),
                stats.zero_vectors.to_string().yellow()
            );
        }
        println!("  {} dim {} ({})", "→".dimmed(), stats.dim, stats.algorithm);
        println!("  {} Time: {}ms", "→".dimmed(), stats.duration_ms);
        println!("  {} {}", "→".dimmed(), target.display());
    }

    Ok(())
}

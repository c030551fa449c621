use anyhow::{Context, Result};
use colored::*;

use shloka_index::core::store::CorpusStore;

use super::Library;

pub fn run(library: &Library, slug: &str, json: bool) -> Result<()> {
    let db_path = library.corpus_db();
    let mut store = CorpusStore::open(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    let deleted = store.delete_work(slug)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "slug": slug, "deleted": deleted })
        );
    } else if deleted {
        println!("{} Deleted work {}", "✓".green(), slug.cyan());
        println!(
            "{} Run {} to refresh the semantic store.",
            "→".dimmed(),
            "shloka build".cyan()
        );
    } else {
        println!("{} No work with slug {}", "✗".red(), slug.cyan());
    }

    if !deleted {
        std::process::exit(1);
    }

    Ok(())
}

use anyhow::{Context, Result};
use colored::*;
use std::fs;

use shloka_index::core::paths::CONFIG_FILE;
use shloka_index::core::schema::SCHEMA_VERSION;
use shloka_index::core::store::CorpusStore;

use super::Library;

pub fn run(library: &Library, write_config: bool) -> Result<()> {
    println!("{}", "Shloka Library Setup".bold());
    println!("{}", "=".repeat(50));
    println!();

    let json_dir = library.config.json_dir_path(&library.paths);
    for dir in [&library.paths.data, &json_dir] {
        if dir.exists() {
            println!("{} {} exists", "✓".green(), dir.display());
        } else {
            fs::create_dir_all(dir)?;
            println!("{} Created {}", "✓".green(), dir.display());
        }
    }

    let db_path = library.corpus_db();
    let store = CorpusStore::open(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let stats = store.get_stats()?;
    println!(
        "{} Corpus store {} at schema version {} ({} works)",
        "✓".green(),
        db_path.display(),
        SCHEMA_VERSION,
        stats.works
    );

    if write_config {
        let config_path = &library.paths.config;
        if config_path.exists() {
            println!("{} {} already present, left as is", "→".dimmed(), CONFIG_FILE);
        } else {
            fs::write(config_path, serde_yaml::to_string(&library.config)?)?;
            println!("{} Wrote {}", "✓".green(), config_path.display());
        }
    }

    println!();
    println!("{}", "✓ Library is ready.".green());
    Ok(())
}

//! Search command - rank passages by cosine similarity

use anyhow::{bail, Result};
use colored::Colorize;

use shloka_index::search::engine::{SearchEngine, SearchResponse};

use super::Library;

const DEFAULT_LIMIT: usize = 5;
const PREVIEW_CHARS: usize = 100;

/// Run search command. Either a text query or `like` (a passage id) is given.
pub fn run(
    library: &Library,
    query: Option<&str>,
    like: Option<i64>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    let engine = SearchEngine::open(&library.semantic_db())?;

    let (label, response) = match (query, like) {
        (_, Some(id)) => (format!("passage {}", id), engine.search_like(id, limit)?),
        (Some(q), None) => (q.to_string(), engine.search(q, limit)?),
        (None, None) => bail!("Give a query or --like <passage id>"),
    };

    if json {
        print_json(&response)?;
    } else {
        print_results(&label, &response);
    }

    Ok(())
}

fn print_json(response: &SearchResponse) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "results": response.results,
            "flagged": response.flagged,
        }))?
    );
    Ok(())
}

fn print_results(label: &str, response: &SearchResponse) {
    if response.results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), label.cyan());
    } else {
        println!(
            "{} {} results for: {}",
            "→".dimmed(),
            response.results.len(),
            label.cyan()
        );
        println!();
    }

    for (i, result) in response.results.iter().enumerate() {
        let score_str = format!("{:.3}", result.score);
        let score_colored = if result.score > 0.6 {
            score_str.green()
        } else if result.score > 0.3 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };

        let passage = &result.passage;
        println!(
            "{}. [{}] passage {} (work {}, chapter {}, verse {})",
            (i + 1).to_string().bold(),
            score_colored,
            passage.id.to_string().cyan(),
            passage.work_id,
            passage.chapter,
            passage.verse_start
        );

        // First line only, char-aware for Devanāgarī
        let first_line = passage.text.lines().next().unwrap_or("");
        let preview = if first_line.chars().count() > PREVIEW_CHARS {
            format!("{}...", first_line.chars().take(PREVIEW_CHARS).collect::<String>())
        } else {
            first_line.to_string()
        };
        if !preview.is_empty() {
            println!("   {}", preview.dimmed());
        }
        println!();
    }

    if !response.flagged.is_empty() {
        println!(
            "{} {} corrupt rows skipped. Run {} for details.",
            "!".yellow().bold(),
            response.flagged.len(),
            "shloka verify".cyan()
        );
    }
}

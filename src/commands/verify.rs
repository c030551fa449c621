use anyhow::Result;
use colored::*;

use shloka_index::search::vectordb::{IntegrityReport, SemanticStore};

use super::Library;

/// Faults listed individually before the report collapses to counts
const MAX_LISTED: usize = 20;

pub fn run(library: &Library, json: bool) -> Result<()> {
    let db_path = library.semantic_db();
    if !db_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "error": "Semantic store not found",
                    "semantic_db": db_path.display().to_string(),
                })
            );
        } else {
            eprintln!(
                "{} Semantic store not found at: {}",
                "Error:".red().bold(),
                db_path.display()
            );
        }
        std::process::exit(1);
    }

    let report = SemanticStore::open(&db_path)?.verify()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}

fn count(n: usize) -> ColoredString {
    if n > 0 {
        n.to_string().red()
    } else {
        n.to_string().green()
    }
}

fn print_report(report: &IntegrityReport) {
    println!("{}", "Semantic Store Integrity".bold());
    println!("{}", "=".repeat(50));
    println!(
        "dim: {}  algorithm: {}",
        report.dim,
        report.algorithm.as_deref().unwrap_or("unknown")
    );
    println!("rows: {}  passages: {}", report.rows, report.passages);
    println!("zero vectors: {}", report.zero);
    println!();
    println!("bad shape:         {}", count(report.bad_shape));
    println!("unreadable:        {}", count(report.unreadable));
    println!("non-finite:        {}", count(report.non_finite));
    println!("norm off 1:        {}", count(report.bad_norm));
    println!("missing embedding: {}", count(report.missing_embedding));
    println!("orphan embedding:  {}", count(report.orphan_embedding));
    println!();

    for fault in report.faults.iter().take(MAX_LISTED) {
        println!("{} passage {}: {}", "✗".red(), fault.id, fault.message);
    }
    if report.faults.len() > MAX_LISTED {
        println!(
            "{} ... and {} more",
            "→".dimmed(),
            report.faults.len() - MAX_LISTED
        );
    }

    if report.is_clean() {
        println!("{}", "✓ Semantic store is consistent.".green());
    } else {
        println!("{}", "✗ Semantic store has integrity faults.".red());
    }
}

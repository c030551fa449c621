mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::build::BuildArgs;
use commands::import::ImportArgs;
use commands::Library;

#[derive(Parser)]
#[command(name = "shloka")]
#[command(about = "Sanskrit corpus importer and semantic passage search", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Library root (default: current directory)")]
    root: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ===== Corpus =====
    /// Create the data folders and the corpus schema
    Init {
        #[arg(long, help = "Write shloka.yaml with the default settings")]
        config: bool,
    },
    /// Import JSON corpus files into the corpus store
    Import {
        files: Vec<PathBuf>,
        #[arg(long, help = "Import every matching file in this directory")]
        dir: Option<PathBuf>,
        #[arg(long, help = "File name glob for --dir (default: *.json)")]
        pattern: Option<String>,
        #[arg(long, help = "Delete the corpus store before importing")]
        reset: bool,
        #[arg(long, help = "Reuse chapters and verses with the same citation")]
        dedupe_verses: bool,
        #[arg(long, help = "Work type when a document has none")]
        default_type: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show corpus and semantic store counts
    Status {
        #[arg(short, long, help = "Brief output")]
        brief: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Delete a work and everything it owns
    #[command(name = "delete-work")]
    DeleteWork {
        slug: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Semantic =====
    /// Build the semantic store from the corpus
    Build {
        #[arg(long, help = "Embedding dimension (default from config)")]
        dim: Option<usize>,
        #[arg(long, help = "Use precomputed vectors from a JSON file")]
        vectors: Option<PathBuf>,
        #[arg(long, requires = "vectors", help = "Algorithm name recorded for --vectors")]
        algorithm: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Cosine search over passages
    Search {
        #[arg(required_unless_present = "like")]
        query: Option<String>,
        #[arg(long, help = "Use the stored vector of this passage as the query")]
        like: Option<i64>,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Check stored vectors and passage/embedding pairing
    Verify {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let library = Library::load(cli.root)?;

    match cli.command {
        Commands::Init { config } => commands::init::run(&library, config),
        Commands::Import {
            files,
            dir,
            pattern,
            reset,
            dedupe_verses,
            default_type,
            json,
        } => commands::import::run(
            &library,
            ImportArgs {
                files,
                dir,
                pattern,
                reset,
                dedupe_verses,
                default_type,
                json,
            },
        ),
        Commands::Status { brief, json } => commands::status::run(&library, brief, json),
        Commands::DeleteWork { slug, json } => commands::delete::run(&library, &slug, json),

        Commands::Build {
            dim,
            vectors,
            algorithm,
            json,
        } => commands::build::run(
            &library,
            BuildArgs {
                dim,
                vectors,
                algorithm,
                json,
            },
        ),
        Commands::Search {
            query,
            like,
            limit,
            json,
        } => commands::search::run(&library, query.as_deref(), like, limit, json),
        Commands::Verify { json } => commands::verify::run(&library, json),
    }
}

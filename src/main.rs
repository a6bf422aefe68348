use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use strata::config::Config;
use strata::output::table::SubgroupTable;

/// Strata: hierarchical subgroup discovery over text embeddings.
///
/// Cuts a linkage tree of comments and posts into coherent subgroups,
/// places users into those subgroups, and contrasts each subgroup's
/// vocabulary against the whole corpus.
#[derive(Parser)]
#[command(name = "strata", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover subgroups and write the subgroup table
    Analyze {
        /// Corpus JSON (ids, embeddings, words, comments, posts, users)
        #[arg(long)]
        corpus: PathBuf,

        /// Linkage JSON over the corpus texts: [[left, right, distance, size], ...]
        #[arg(long)]
        linkage: PathBuf,

        /// Where to write the subgroup table (default: print only)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Display a previously written subgroup table
    Show {
        /// Subgroup table JSON written by `analyze --out`
        #[arg(long)]
        table: PathBuf,
    },
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("strata=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            corpus,
            linkage,
            out,
        } => {
            let config = Config::load()?;
            info!(?config, "Loaded configuration");

            let corpus = strata::corpus::loader::load(&corpus)?;
            let merges = strata::tree::linkage::load_merges(&linkage)?;
            let tree = strata::tree::linkage::LinkageTree::from_merges(&merges)?;

            let table = strata::pipeline::run(&corpus, &tree, &config.pipeline_params(true))?;
            strata::output::terminal::display_table(&table);

            if let Some(path) = out {
                table.write_json(&path)?;
                println!(
                    "\n{} {}",
                    "Subgroup table written to".green(),
                    path.display()
                );
            }
        }

        Commands::Show { table } => {
            let table = SubgroupTable::read_json(&table)?;
            strata::output::terminal::display_table(&table);
        }
    }

    Ok(())
}

//! CLI parser and dispatch to command-specific modules.

mod analyze;
mod inspect;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::scrapers::HttpClient;

#[derive(Parser)]
#[command(name = "wdsp")]
#[command(about = "Extract records from web pages and APIs")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML or JSON)
    #[arg(short, long, global = true, env = "WDSP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch HTML documents and extract records (request JSON file, or - for stdin)
    Document {
        request: PathBuf,
        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Call an API endpoint and extract records (request JSON file, or - for stdin)
    Xhr {
        request: PathBuf,
        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Suggest CSS selectors for repeated elements on a page
    Suggest {
        url: String,
        /// Minimum number of occurrences for a class to be suggested
        #[arg(short, long, default_value = "5")]
        min_count: usize,
    },

    /// Check whether requested fields appear on a page's surface
    Surface {
        url: String,
        /// Comma-separated field names
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Table rows (after the header) to include
        #[arg(long, default_value = "3")]
        max_table_rows: usize,
        /// Minimum relevance score
        #[arg(long, default_value = "0.4")]
        min_score: f64,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).map_err(|e| anyhow::anyhow!(e))?;
    let client = HttpClient::new(Arc::new(settings))?;

    match cli.command {
        Commands::Document { request, compact } => {
            analyze::cmd_document(&client, &request, compact).await
        }
        Commands::Xhr { request, compact } => analyze::cmd_xhr(&client, &request, compact).await,
        Commands::Suggest { url, min_count } => inspect::cmd_suggest(&client, &url, min_count).await,
        Commands::Surface {
            url,
            fields,
            max_table_rows,
            min_score,
        } => inspect::cmd_surface(&client, &url, &fields, max_table_rows, min_score).await,
    }
}

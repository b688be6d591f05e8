use std::io::Read;
use std::time::Duration;

use clap::{Parser, Subcommand};
use govcat_core::{CatalogClient, CatalogService, MemoryCatalogStore, PortalConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "govcat", about = "Extract REST API descriptions from the data.go.kr portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the portal and print one page of results
    Search {
        /// Search keyword (empty lists everything)
        #[arg(default_value = "")]
        keyword: String,

        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Results per page
        #[arg(long, default_value_t = 10)]
        size: u32,

        /// Restrict to one portal category
        #[arg(long)]
        category: Option<String>,
    },
    /// Fetch one catalog entry's detail page and print its operations
    Detail {
        /// Catalog id (the portal's numeric key)
        id: String,

        /// Also report which extractor produced the result
        #[arg(long)]
        show_path: bool,
    },
    /// Extract a saved search-results page
    ParseListing {
        /// The HTML file to parse (use - for stdin)
        file: String,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        size: u32,
    },
    /// Extract a saved detail page, without follow-up requests
    ParseDetail {
        /// The HTML file to parse (use - for stdin)
        file: String,

        /// Catalog id the page belongs to
        #[arg(long)]
        id: String,
    },
    /// Walk the listing and report what a sync would store
    Sync {
        #[arg(long, default_value_t = 10)]
        max_pages: u32,

        #[arg(long, default_value_t = 30)]
        page_size: u32,

        /// Pause between pages in milliseconds
        #[arg(long, default_value_t = 500)]
        delay_ms: u64,
    },
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = PortalConfig::from_env()?;

    match cli.command {
        Commands::Search {
            keyword,
            page,
            size,
            category,
        } => {
            let client = CatalogClient::new(config)?;
            let result = client.search_listing(page, size, &keyword, category.as_deref())?;
            print_json(&result)
        }
        Commands::Detail { id, show_path } => {
            let client = CatalogClient::new(config)?;
            let (result, path) = client.fetch_detail_traced(&id)?;
            if show_path {
                eprintln!("extracted via {:?}", path);
            }
            print_json(&result)
        }
        Commands::ParseListing { file, page, size } => {
            let html = read_input(&file)?;
            print_json(&govcat_core::parse_listing(&html, page, size))
        }
        Commands::ParseDetail { file, id } => {
            let html = read_input(&file)?;
            print_json(&govcat_core::parse_detail(&html, &id, &config))
        }
        Commands::Sync {
            max_pages,
            page_size,
            delay_ms,
        } => {
            let client = CatalogClient::new(config)?;
            let service = CatalogService::new(client, MemoryCatalogStore::new())
                .with_sync_delay(Duration::from_millis(delay_ms));
            let report = service.sync(max_pages, page_size)?;
            print_json(&report)
        }
    }
}

fn read_input(file: &str) -> std::io::Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

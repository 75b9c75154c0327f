//! crawlgate: page filtering core for a focused web crawler

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crawlgate::{
    config::{Config, LogFormat},
    crawl::{HttpRobotsFetcher, Scraper},
    store::CrawlStores,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "crawlgate")]
#[command(about = "Page filtering, deduplication and trap detection for a focused crawler")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "crawlgate.toml")]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether URLs may enter the frontier
    Check {
        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Show crawl store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config, falling back to defaults when no file exists
    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    // Override data dir if specified
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Check { urls } => check_urls(config, urls).await,
        Commands::Stats => show_stats(config),
    }
}

fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let filter = config.logging.env_filter(verbose);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match config.logging.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

fn open_stores(config: &Config) -> Result<CrawlStores> {
    if config.storage.in_memory {
        return Ok(CrawlStores::in_memory());
    }
    CrawlStores::open(&config.storage.data_dir)
}

async fn check_urls(config: Config, urls: Vec<String>) -> Result<()> {
    let stores = open_stores(&config)?;
    let fetcher = Arc::new(
        HttpRobotsFetcher::new(&config.robots).context("Failed to build robots.txt client")?,
    );
    let scraper = Scraper::new(&config, stores, fetcher)?;

    for url in &urls {
        match scraper.validator().is_valid(url).await {
            Ok(true) => println!("valid    {}", url),
            Ok(false) => println!("invalid  {}", url),
            Err(e) => println!("error    {} ({})", url, e),
        }
    }

    scraper.flush()?;
    info!("Checked {} URLs", urls.len());
    Ok(())
}

fn show_stats(config: Config) -> Result<()> {
    let stores = open_stores(&config)?;

    println!("Crawl Store Statistics");
    println!("======================");
    if config.storage.in_memory {
        println!("Location:       (in memory)");
    } else {
        println!("Location:       {}", config.storage.data_dir.join("crawl.sled").display());
    }
    println!("Pages recorded: {}", stores.pages.len());
    println!("Robots entries: {}", stores.robots.len());
    println!("Trap hosts:     {}", stores.trap_stats.len());

    let banned = stores
        .trap_stats
        .entries()?
        .into_iter()
        .filter(|(_, stats)| stats.repeat_count >= config.trap.ban_threshold)
        .count();
    println!("Banned hosts:   {}", banned);

    Ok(())
}

//! turdus command-line entry point
//!
//! One subcommand per pipeline stage plus `run` for the whole pipeline.
//! The process exits non-zero only on fatal errors (page-count discovery,
//! unreadable local state); per-item failures are logged and summarized,
//! and a partially materialized dataset is an accepted, resumable state.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use turdus::config::Config;
use turdus::services::audio_acquirer;
use turdus::services::catalog_fetcher;
use turdus::services::feature_extractor;
use turdus::services::xeno_canto::XenoCantoClient;
use turdus::store::artifacts::ArtifactStore;
use turdus::store::layout;
use turdus::store::records::{select_records, Allowlist, RecordTable, SpeciesGroup};
use turdus::types::Quality;

#[derive(Parser)]
#[command(name = "turdus", about = "Incremental bird-vocalization dataset builder")]
struct Cli {
    /// Root data directory
    #[arg(long, env = "DATA_DIR")]
    data_dir: PathBuf,

    /// Base URL of the remote catalog
    #[arg(long, default_value = "https://www.xeno-canto.org")]
    base_url: String,

    /// Crawl at most this many catalog pages
    #[arg(long, default_value_t = 2048)]
    max_pages: u32,

    /// Write per-genus slices for the top K genera
    #[arg(long, default_value_t = 32)]
    max_genera: usize,

    /// Acquire at most this many calls per species
    #[arg(long, default_value_t = 4096)]
    max_calls: usize,

    /// Accepted quality grades, A-E (comma separated; empty accepts all)
    #[arg(long, value_delimiter = ',', default_value = "A,B", value_parser = parse_quality)]
    quality: Vec<Quality>,

    /// Accepted vocalization types (comma separated; empty accepts all)
    #[arg(long = "types", value_delimiter = ',', default_value = "song")]
    kinds: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the catalog and rebuild the canonical record table
    Records,
    /// Download and normalize audio for allowlisted records
    Calls,
    /// Compute per-species spectral feature bundles
    Features,
    /// Run all three stages in order
    Run,
}

/// A typo in a grade would otherwise silently change the filter, so
/// anything outside A-E is rejected up front.
fn parse_quality(s: &str) -> std::result::Result<Quality, String> {
    match Quality::parse(s) {
        Quality::Unknown => Err(format!("unrecognized quality grade '{}' (expected A-E)", s)),
        q => Ok(q),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config {
        data_dir: cli.data_dir,
        base_url: cli.base_url,
        max_pages: cli.max_pages,
        max_genera: cli.max_genera,
        max_calls_per_species: cli.max_calls,
        qualities: cli.quality,
        kinds: cli.kinds,
    };

    info!(version = env!("CARGO_PKG_VERSION"), data_dir = %config.data_dir.display(), "Starting turdus");

    let store = ArtifactStore::new(&config.data_dir);
    let client = XenoCantoClient::new(&config.base_url)?;

    match cli.command {
        Command::Records => {
            let (table, summary) = catalog_fetcher::fetch_catalog(&client, &store, &config).await?;
            info!(
                records = table.len(),
                fetched = summary.pages_fetched,
                cached = summary.pages_cached,
                failed = summary.pages_failed,
                "Records stage complete"
            );
        }
        Command::Calls => {
            let groups = load_selection(&store, &config)?;
            audio_acquirer::acquire_all(&client, &store, &groups, &config).await?;
        }
        Command::Features => {
            let groups = load_selection(&store, &config)?;
            feature_extractor::extract_all(&store, &groups)?;
        }
        Command::Run => {
            let (table, _) = catalog_fetcher::fetch_catalog(&client, &store, &config).await?;
            let allowlist = load_allowlist(&store)?;
            let groups = select_records(&table, &allowlist, &config.qualities, &config.kinds);
            audio_acquirer::acquire_all(&client, &store, &groups, &config).await?;
            feature_extractor::extract_all(&store, &groups)?;
        }
    }

    Ok(())
}

/// Load the canonical table and allowlist and apply the configured filters
fn load_selection(store: &ArtifactStore, config: &Config) -> Result<Vec<SpeciesGroup>> {
    let table = load_table(store)?;
    let allowlist = load_allowlist(store)?;
    let groups = select_records(&table, &allowlist, &config.qualities, &config.kinds);
    info!(
        records = table.len(),
        species = groups.len(),
        "Selected eligible records"
    );
    Ok(groups)
}

fn load_table(store: &ArtifactStore) -> Result<RecordTable> {
    if !store.exists(layout::RECORDS_KEY) {
        bail!(
            "canonical record table missing at {}; run `turdus records` first",
            store.path(layout::RECORDS_KEY).display()
        );
    }
    let text = store
        .read_to_string(layout::RECORDS_KEY)
        .context("Failed to read canonical record table")?;
    Ok(RecordTable::from_tsv(&text)?)
}

fn load_allowlist(store: &ArtifactStore) -> Result<Allowlist> {
    if !store.exists(layout::ALLOWLIST_KEY) {
        bail!(
            "species allowlist missing at {}",
            store.path(layout::ALLOWLIST_KEY).display()
        );
    }
    let text = store
        .read_to_string(layout::ALLOWLIST_KEY)
        .context("Failed to read species allowlist")?;
    Ok(Allowlist::from_tsv(&text)?)
}

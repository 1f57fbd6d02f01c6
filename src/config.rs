//! Pipeline configuration
//!
//! One explicit `Config` value is constructed in `main` and passed into
//! every stage; there is no ambient global state. Limits are static
//! tunables, not runtime-negotiated.

use std::path::PathBuf;

use crate::types::Quality;

/// Pipeline-wide configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the durable data directory
    pub data_dir: PathBuf,
    /// Base URL of the remote catalog service
    pub base_url: String,
    /// Crawl at most this many catalog pages
    pub max_pages: u32,
    /// Write per-genus slices for the top K genera by record count
    pub max_genera: usize,
    /// Acquire at most this many calls per species (in table order)
    pub max_calls_per_species: usize,
    /// Accepted quality grades; empty accepts all
    pub qualities: Vec<Quality>,
    /// Accepted vocalization types; empty accepts all
    pub kinds: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            base_url: "https://www.xeno-canto.org".to_string(),
            max_pages: 2048,
            max_genera: 32,
            max_calls_per_species: 4096,
            qualities: vec![Quality::A, Quality::B],
            kinds: vec!["song".to_string()],
        }
    }
}

//! Storage layout
//!
//! Every durable artifact is addressed by a key relative to the data root.
//! Keys are the single source of truth for the on-disk layout:
//!
//! - `records/pages/{page}.tsv` — cached raw page
//! - `records/num_pages` — cached page-count discovery result
//! - `records/records.tsv` — canonical merged table
//! - `records/gens/{genus}/records.tsv` — per-genus slice
//! - `birds/birds.tsv` — species allowlist (external input)
//! - `calls/{species_key}/{id}.wav` — normalized audio artifact
//! - `features/{species_key}/S_mean.bin`, `S_std.bin` — feature bundle

pub const PAGES_DIR: &str = "records/pages";
pub const NUM_PAGES_KEY: &str = "records/num_pages";
pub const RECORDS_KEY: &str = "records/records.tsv";
pub const ALLOWLIST_KEY: &str = "birds/birds.tsv";
pub const MEAN_FILE: &str = "S_mean.bin";
pub const STD_FILE: &str = "S_std.bin";

pub fn page_key(page: u32) -> String {
    format!("{}/{}.tsv", PAGES_DIR, page)
}

pub fn genus_key(gen: &str) -> String {
    format!("records/gens/{}/records.tsv", gen)
}

pub fn call_key(species_key: &str, id: u64) -> String {
    format!("calls/{}/{}.wav", species_key, id)
}

pub fn features_key(species_key: &str) -> String {
    format!("features/{}", species_key)
}

//! Catalog Fetcher stage
//!
//! Crawls the paginated catalog with durable per-page caching, merges all
//! cached pages into the canonical record table, and writes per-genus
//! slices for the most popular genera. Each page is fetched from the
//! network at most once over the lifetime of the dataset: a cached page is
//! loaded from disk, a failed page is left uncached and retried on the
//! next invocation.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::artifacts::ArtifactStore;
use crate::store::layout;
use crate::store::records::{top_genera, RecordTable};
use crate::types::{CatalogPageResponse, RawRecord};

use super::xeno_canto::CatalogApi;

/// Per-run crawl statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Pages fetched from the network this run
    pub pages_fetched: usize,
    /// Pages served from the durable cache
    pub pages_cached: usize,
    /// Pages that failed this run (left uncached, retried next run)
    pub pages_failed: usize,
    /// Records in the canonical table after merging
    pub records: usize,
}

/// Crawl the catalog and rebuild the canonical record table
///
/// Page-count discovery failure is fatal; per-page failures are logged and
/// skipped.
pub async fn fetch_catalog(
    api: &dyn CatalogApi,
    store: &ArtifactStore,
    config: &Config,
) -> Result<(RecordTable, FetchSummary)> {
    let mut summary = FetchSummary::default();

    let total_pages = discover_page_count(api, store, &mut summary).await?;
    let pages = total_pages.min(config.max_pages);
    info!(
        total_pages = total_pages,
        crawling = pages,
        "Loading catalog records"
    );

    for page in 1..=pages {
        let key = layout::page_key(page);
        if store.exists(&key) {
            debug!(page = page, "Page already cached");
            summary.pages_cached += 1;
            continue;
        }

        match api.fetch_page(page).await {
            Ok(response) => {
                let table = page_table(response);
                store.materialize(&key, table.to_tsv().as_bytes())?;
                debug!(page = page, records = table.len(), "Page cached");
                summary.pages_fetched += 1;
            }
            Err(e) => {
                warn!(page = page, error = %e, "Page fetch failed, will retry next run");
                summary.pages_failed += 1;
            }
        }
    }

    // Merge every currently cached page, not just this run's
    let mut tables = Vec::new();
    for (page, path) in cached_pages(store)? {
        let text = std::fs::read_to_string(&path)?;
        let table = RecordTable::from_tsv(&text)
            .map_err(|e| Error::Tsv(format!("cached page {}: {}", page, e)))?;
        tables.push(table);
    }
    let merged = RecordTable::merge(tables);
    store.materialize(layout::RECORDS_KEY, merged.to_tsv().as_bytes())?;
    summary.records = merged.len();
    info!(records = merged.len(), "Canonical record table persisted");

    write_genus_slices(store, &merged, config)?;

    Ok((merged, summary))
}

/// Resolve the catalog's total page count
///
/// The discovery result is cached alongside the pages so a resumed run
/// issues no discovery request; only a cold run hits page 1, whose records
/// are cached in the same breath. A failed discovery request aborts the
/// stage, there is nothing to resume from.
async fn discover_page_count(
    api: &dyn CatalogApi,
    store: &ArtifactStore,
    summary: &mut FetchSummary,
) -> Result<u32> {
    if store.exists(layout::NUM_PAGES_KEY) {
        let text = store.read_to_string(layout::NUM_PAGES_KEY)?;
        if let Ok(num_pages) = text.trim().parse::<u32>() {
            debug!(num_pages = num_pages, "Page count loaded from cache");
            return Ok(num_pages);
        }
        warn!("Cached page count unreadable, rediscovering");
    }

    let response = api
        .fetch_page(1)
        .await
        .map_err(|e| Error::Discovery(e.to_string()))?;
    let num_pages = response.num_pages;

    let table = page_table(response);
    store.materialize(&layout::page_key(1), table.to_tsv().as_bytes())?;
    store.materialize(layout::NUM_PAGES_KEY, num_pages.to_string().as_bytes())?;
    summary.pages_fetched += 1;

    Ok(num_pages)
}

fn page_table(response: CatalogPageResponse) -> RecordTable {
    RecordTable::from_records(
        response
            .recordings
            .into_iter()
            .map(RawRecord::from)
            .collect(),
    )
}

/// Cached page files in numeric page order
fn cached_pages(store: &ArtifactStore) -> Result<Vec<(u32, PathBuf)>> {
    let dir = store.path(layout::PAGES_DIR);
    let mut pages = Vec::new();

    if dir.is_dir() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("tsv") {
                continue;
            }
            if let Some(page) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok())
            {
                pages.push((page, path));
            }
        }
    }

    pages.sort_by_key(|(page, _)| *page);
    Ok(pages)
}

/// Persist per-genus slices for the top genera by quality-filtered count
fn write_genus_slices(store: &ArtifactStore, table: &RecordTable, config: &Config) -> Result<()> {
    let ranked = table.filter_quality(&config.qualities);
    for gen in top_genera(&ranked, config.max_genera) {
        let key = layout::genus_key(&gen);
        if store.exists(&key) {
            continue;
        }
        let slice = table.genus_slice(&gen);
        store.materialize(&key, slice.to_tsv().as_bytes())?;
        debug!(gen = %gen, records = slice.len(), "Genus slice persisted");
    }
    Ok(())
}

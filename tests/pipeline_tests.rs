//! End-to-end pipeline tests against a frozen in-memory catalog service
//!
//! Covers the resumability contract (re-runs issue zero network calls and
//! leave byte-identical outputs), page clamping and resume, the allowlist
//! and id-uniqueness invariants, decode-failure exclusion, and the feature
//! matrix shape contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use turdus::audio::wav;
use turdus::config::Config;
use turdus::error::{Error, ItemError};
use turdus::services::audio_acquirer::{self, AcquireSummary};
use turdus::services::catalog_fetcher;
use turdus::services::feature_extractor::{self, ExtractSummary};
use turdus::services::xeno_canto::CatalogApi;
use turdus::store::artifacts::ArtifactStore;
use turdus::store::layout;
use turdus::store::matrix;
use turdus::store::records::{select_records, Allowlist, RecordTable, SpeciesGroup};
use turdus::types::{CatalogPageResponse, Quality, WireRecording};

struct MockApi {
    num_pages: u32,
    pages: Vec<Vec<WireRecording>>,
    audio: HashMap<u64, Vec<u8>>,
    page_calls: AtomicUsize,
    audio_calls: AtomicUsize,
}

impl MockApi {
    fn new(num_pages: u32, pages: Vec<Vec<WireRecording>>, audio: HashMap<u64, Vec<u8>>) -> Self {
        Self {
            num_pages,
            pages,
            audio,
            page_calls: AtomicUsize::new(0),
            audio_calls: AtomicUsize::new(0),
        }
    }

    fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    fn audio_calls(&self) -> usize {
        self.audio_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogApi for MockApi {
    async fn fetch_page(&self, page: u32) -> Result<CatalogPageResponse, ItemError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get((page - 1) as usize)
            .map(|recordings| CatalogPageResponse {
                num_pages: self.num_pages,
                recordings: recordings.clone(),
            })
            .ok_or(ItemError::NotFound)
    }

    async fn download_audio(&self, id: u64) -> Result<Vec<u8>, ItemError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        self.audio.get(&id).cloned().ok_or(ItemError::NotFound)
    }
}

fn rec(id: u64, gen: &str, sp: &str, q: &str, kind: &str) -> WireRecording {
    WireRecording {
        id,
        gen: gen.to_string(),
        sp: sp.to_string(),
        en: String::new(),
        cnt: String::new(),
        q: q.to_string(),
        kind: kind.to_string(),
    }
}

/// A decodable compressed-audio payload (WAV-wrapped sine burst)
fn call_payload(seed: u64) -> Vec<u8> {
    call_payload_at(seed, 44100)
}

fn call_payload_at(seed: u64, sample_rate: u32) -> Vec<u8> {
    let samples: Vec<f32> = (0..8192)
        .map(|i| ((i as f32 + seed as f32) * 0.03).sin() * 0.4)
        .collect();
    wav::encode_mono(&samples, sample_rate).unwrap()
}

fn test_config(store: &ArtifactStore, max_pages: u32) -> Config {
    Config {
        data_dir: store.root().to_path_buf(),
        max_pages,
        qualities: vec![Quality::A, Quality::B],
        kinds: vec!["song".to_string()],
        ..Config::default()
    }
}

fn install_allowlist(store: &ArtifactStore) {
    store
        .materialize(
            layout::ALLOWLIST_KEY,
            b"gen\tsp\nTurdus\tmerula\nParus\tmajor\n",
        )
        .unwrap();
}

async fn run_pipeline(
    api: &MockApi,
    store: &ArtifactStore,
    config: &Config,
) -> (Vec<SpeciesGroup>, AcquireSummary, ExtractSummary) {
    let (table, _) = catalog_fetcher::fetch_catalog(api, store, config)
        .await
        .unwrap();
    let allowlist =
        Allowlist::from_tsv(&store.read_to_string(layout::ALLOWLIST_KEY).unwrap()).unwrap();
    let groups = select_records(&table, &allowlist, &config.qualities, &config.kinds);
    let acquired = audio_acquirer::acquire_all(api, store, &groups, config)
        .await
        .unwrap();
    let extracted = feature_extractor::extract_all(store, &groups).unwrap();
    (groups, acquired, extracted)
}

#[tokio::test]
async fn second_run_is_free_and_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    install_allowlist(&store);

    let api = MockApi::new(
        2,
        vec![
            vec![
                rec(1, "Turdus", "merula", "A", "song"),
                rec(2, "Corvus", "corax", "A", "song"),
            ],
            vec![
                rec(3, "Turdus", "merula", "A", "song"),
                rec(4, "Parus", "major", "B", "song"),
            ],
        ],
        HashMap::from([
            (1, call_payload(1)),
            (3, call_payload(3)),
            (4, call_payload(4)),
        ]),
    );
    let config = test_config(&store, 100);

    let (groups, acquired, extracted) = run_pipeline(&api, &store, &config).await;
    assert_eq!(api.page_calls(), 2);
    assert_eq!(api.audio_calls(), 3);
    assert_eq!(acquired.materialized, 3);
    assert_eq!(extracted.computed, 2);
    assert_eq!(groups.len(), 2);

    let table_bytes = store.read(layout::RECORDS_KEY).unwrap();
    let call_bytes = store.read(&layout::call_key("turdus_merula", 1)).unwrap();
    let mean_bytes = store.read("features/turdus_merula/S_mean.bin").unwrap();

    let (_, acquired2, extracted2) = run_pipeline(&api, &store, &config).await;

    // Zero additional network calls
    assert_eq!(api.page_calls(), 2);
    assert_eq!(api.audio_calls(), 3);
    assert_eq!(acquired2.materialized, 0);
    assert_eq!(acquired2.skipped, 3);
    assert_eq!(extracted2.computed, 0);
    assert_eq!(extracted2.skipped, 2);

    // Byte-identical outputs
    assert_eq!(store.read(layout::RECORDS_KEY).unwrap(), table_bytes);
    assert_eq!(
        store.read(&layout::call_key("turdus_merula", 1)).unwrap(),
        call_bytes
    );
    assert_eq!(
        store.read("features/turdus_merula/S_mean.bin").unwrap(),
        mean_bytes
    );
}

#[tokio::test]
async fn page_clamp_then_resume_fetches_only_missing_pages() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    let api = MockApi::new(
        3,
        vec![
            vec![rec(1, "Turdus", "merula", "A", "song")],
            vec![rec(2, "Turdus", "merula", "A", "song")],
            vec![
                rec(3, "Turdus", "merula", "A", "song"),
                // Same id as page 1, later page wins on re-merge
                rec(1, "Turdus", "merula", "B", "song"),
            ],
        ],
        HashMap::new(),
    );

    // numPages=3 but clamped to 2: page 3 never requested
    let config = test_config(&store, 2);
    let (table, summary) = catalog_fetcher::fetch_catalog(&api, &store, &config)
        .await
        .unwrap();
    assert_eq!(api.page_calls(), 2);
    assert_eq!(summary.pages_fetched, 2);
    assert!(!store.exists(&layout::page_key(3)));
    assert_eq!(table.len(), 2);

    // Re-run with a higher cap: only page 3 is fetched
    let config = test_config(&store, 5);
    let (table, summary) = catalog_fetcher::fetch_catalog(&api, &store, &config)
        .await
        .unwrap();
    assert_eq!(api.page_calls(), 3);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.pages_cached, 2);

    // Union of all three pages, deduplicated by id
    let ids: Vec<u64> = table.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(table.records()[0].q, Quality::B);
}

#[tokio::test]
async fn page_failures_are_retried_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    // Page 2 missing from the mock: fetch fails, page stays uncached
    let api = MockApi::new(
        2,
        vec![vec![rec(1, "Turdus", "merula", "A", "song")]],
        HashMap::new(),
    );
    let config = test_config(&store, 10);
    let (table, summary) = catalog_fetcher::fetch_catalog(&api, &store, &config)
        .await
        .unwrap();
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(table.len(), 1);
    assert!(!store.exists(&layout::page_key(2)));

    // Next run retries page 2 (and only page 2)
    let calls_before = api.page_calls();
    let (_, summary) = catalog_fetcher::fetch_catalog(&api, &store, &config)
        .await
        .unwrap();
    assert_eq!(api.page_calls(), calls_before + 1);
    assert_eq!(summary.pages_failed, 1);
}

#[tokio::test]
async fn cold_discovery_failure_is_fatal_and_leaves_no_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    // No pages at all: the page-1 discovery request fails
    let api = MockApi::new(0, vec![], HashMap::new());
    let config = test_config(&store, 10);

    let err = catalog_fetcher::fetch_catalog(&api, &store, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Discovery(_)), "got {:?}", err);
    assert!(!store.exists(layout::NUM_PAGES_KEY));
    assert!(!store.exists(layout::RECORDS_KEY));
}

#[tokio::test]
async fn top_genus_slices_are_written_and_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    // Quality-filtered counts: Turdus 2, Parus 1, Sitta 0. Sitta has the
    // most raw records but none pass the filter, so it ranks last.
    let api = MockApi::new(
        1,
        vec![vec![
            rec(1, "Turdus", "merula", "A", "song"),
            rec(2, "Turdus", "philomelos", "A", "song"),
            rec(3, "Parus", "major", "A", "song"),
            rec(4, "Parus", "major", "C", "song"),
            rec(5, "Sitta", "europaea", "C", "song"),
            rec(6, "Sitta", "europaea", "C", "song"),
            rec(7, "Sitta", "europaea", "C", "song"),
        ]],
        HashMap::new(),
    );
    let mut config = test_config(&store, 10);
    config.max_genera = 2;

    catalog_fetcher::fetch_catalog(&api, &store, &config)
        .await
        .unwrap();
    assert!(store.exists(&layout::genus_key("Turdus")));
    assert!(store.exists(&layout::genus_key("Parus")));
    assert!(!store.exists(&layout::genus_key("Sitta")));

    // The slice is the full-table genus slice, not quality-filtered
    let slice = RecordTable::from_tsv(
        &store
            .read_to_string(&layout::genus_key("Parus"))
            .unwrap(),
    )
    .unwrap();
    let ids: Vec<u64> = slice.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 4]);

    // An existing slice is left untouched on the next run
    store
        .materialize(&layout::genus_key("Parus"), b"sentinel")
        .unwrap();
    catalog_fetcher::fetch_catalog(&api, &store, &config)
        .await
        .unwrap();
    assert_eq!(
        store.read(&layout::genus_key("Parus")).unwrap(),
        b"sentinel"
    );
}

#[tokio::test]
async fn artifacts_are_normalized_to_analysis_rate() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    install_allowlist(&store);

    let api = MockApi::new(
        1,
        vec![vec![rec(1, "Turdus", "merula", "A", "song")]],
        HashMap::from([(1, call_payload_at(1, 22050))]),
    );
    let config = test_config(&store, 10);

    let (_, acquired, extracted) = run_pipeline(&api, &store, &config).await;
    assert_eq!(acquired.materialized, 1);
    assert_eq!(extracted.rows, 1);

    // The 22.05 kHz payload is stored at the 44.1 kHz analysis rate, so
    // its 8192 frames roughly double
    let (samples, rate) =
        wav::read_mono(&store.path(&layout::call_key("turdus_merula", 1))).unwrap();
    assert_eq!(rate, 44100);
    assert!(
        (16100..=16700).contains(&samples.len()),
        "expected ~16384 frames, got {}",
        samples.len()
    );
}

#[tokio::test]
async fn allowlist_and_uniqueness_invariants_hold() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    install_allowlist(&store);

    let api = MockApi::new(
        2,
        vec![
            vec![
                rec(1, "Turdus", "merula", "A", "song"),
                rec(2, "Corvus", "corax", "A", "song"),
            ],
            vec![
                // Duplicate id across pages
                rec(1, "Turdus", "merula", "A", "song"),
                rec(3, "Parus", "major", "A", "song"),
            ],
        ],
        HashMap::new(),
    );
    let config = test_config(&store, 10);
    let (table, _) = catalog_fetcher::fetch_catalog(&api, &store, &config)
        .await
        .unwrap();

    let mut ids: Vec<u64> = table.records().iter().map(|r| r.id).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total, "ids must be unique after merge");

    let allowlist =
        Allowlist::from_tsv(&store.read_to_string(layout::ALLOWLIST_KEY).unwrap()).unwrap();
    let groups = select_records(&table, &allowlist, &[], &[]);
    assert!(groups.iter().all(|g| allowlist.contains(&g.species_key)));
    assert!(groups.iter().all(|g| g.species_key != "corvus_corax"));
}

#[tokio::test]
async fn undecodable_payload_is_excluded_from_features() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    install_allowlist(&store);

    let api = MockApi::new(
        1,
        vec![vec![
            rec(1, "Turdus", "merula", "A", "song"),
            rec(2, "Turdus", "merula", "A", "song"),
            rec(3, "Turdus", "merula", "A", "song"),
        ]],
        HashMap::from([
            (1, call_payload(1)),
            (2, b"definitely not audio".to_vec()),
            (3, call_payload(3)),
        ]),
    );
    let config = test_config(&store, 10);

    let (_, acquired, extracted) = run_pipeline(&api, &store, &config).await;
    assert_eq!(acquired.materialized, 2);
    assert_eq!(acquired.decode_failures, 1);
    assert!(!store.exists(&layout::call_key("turdus_merula", 2)));

    // 3 eligible records, 1 failed acquisition: exactly 2 matrix rows
    assert_eq!(extracted.rows, 2);
    let mean = matrix::decode(&store.read("features/turdus_merula/S_mean.bin").unwrap()).unwrap();
    let std = matrix::decode(&store.read("features/turdus_merula/S_std.bin").unwrap()).unwrap();
    assert_eq!(mean.dim(), (2, 1025));
    assert_eq!(std.dim(), (2, 1025));
}

#[tokio::test]
async fn existing_feature_bundle_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    install_allowlist(&store);

    // Pre-existing bundle directory is the completion marker
    store
        .materialize("features/turdus_merula/S_mean.bin", b"sentinel")
        .unwrap();

    let api = MockApi::new(
        1,
        vec![vec![rec(1, "Turdus", "merula", "A", "song")]],
        HashMap::from([(1, call_payload(1))]),
    );
    let config = test_config(&store, 10);

    let (_, _, extracted) = run_pipeline(&api, &store, &config).await;
    assert_eq!(extracted.computed, 0);
    assert_eq!(extracted.skipped, 1);
    assert_eq!(
        store.read("features/turdus_merula/S_mean.bin").unwrap(),
        b"sentinel"
    );
}

#[tokio::test]
async fn per_species_call_cap_limits_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    install_allowlist(&store);

    let api = MockApi::new(
        1,
        vec![vec![
            rec(1, "Turdus", "merula", "A", "song"),
            rec(2, "Turdus", "merula", "A", "song"),
            rec(3, "Turdus", "merula", "A", "song"),
        ]],
        HashMap::from([
            (1, call_payload(1)),
            (2, call_payload(2)),
            (3, call_payload(3)),
        ]),
    );
    let mut config = test_config(&store, 10);
    config.max_calls_per_species = 2;

    let (_, acquired, _) = run_pipeline(&api, &store, &config).await;
    assert_eq!(api.audio_calls(), 2);
    assert_eq!(acquired.materialized, 2);
    assert!(store.exists(&layout::call_key("turdus_merula", 1)));
    assert!(store.exists(&layout::call_key("turdus_merula", 2)));
    assert!(!store.exists(&layout::call_key("turdus_merula", 3)));
}

//! Feature Extractor stage
//!
//! For each species, reduces every available normalized recording to one
//! mean vector and one std vector of short-time transform magnitudes, and
//! persists the stacked matrices as the species' feature bundle. Existence
//! of the species' output directory is the sole completion marker.

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::audio::{resample, stft, wav};
use crate::error::{Error, Result};
use crate::store::artifacts::ArtifactStore;
use crate::store::{layout, matrix};
use crate::store::records::SpeciesGroup;

/// Per-species extraction outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeciesOutcome {
    /// Bundle computed and persisted with this many matrix rows
    Computed { rows: usize },
    /// Bundle directory already exists; nothing loaded or written
    Skipped,
}

/// Aggregated extraction statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub computed: usize,
    pub skipped: usize,
    /// Total matrix rows across newly computed bundles
    pub rows: usize,
}

/// Compute the feature bundle for one species
///
/// Records without an audio artifact are silently excluded, not
/// zero-filled. Contributing record ids are sorted ascending so matrix row
/// order is reproducible across runs. An empty bundle (no contributing
/// recordings) is still persisted as valid, degenerate matrices.
pub fn extract_species(store: &ArtifactStore, group: &SpeciesGroup) -> Result<SpeciesOutcome> {
    let dir_key = layout::features_key(&group.species_key);
    if store.path(&dir_key).is_dir() {
        info!(species = %group.species_key, "Features already computed, skipping");
        return Ok(SpeciesOutcome::Skipped);
    }

    let mut ids: Vec<u64> = group.records.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut mean_values: Vec<f32> = Vec::new();
    let mut std_values: Vec<f32> = Vec::new();
    let mut rows = 0usize;

    for id in ids {
        let call_key = layout::call_key(&group.species_key, id);
        if !store.exists(&call_key) {
            debug!(id = id, "No audio artifact, excluding from bundle");
            continue;
        }

        let (samples, sample_rate) = match wav::read_mono(&store.path(&call_key)) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(id = id, error = %e, "Failed to load artifact, excluding");
                continue;
            }
        };

        // Pin every recording to the analysis rate so bin indices are
        // comparable across rows; artifacts the acquirer wrote are already
        // there, this covers externally produced ones.
        let samples = match resample::to_rate(samples, sample_rate, resample::TARGET_SAMPLE_RATE) {
            Ok(samples) => samples,
            Err(e) => {
                warn!(id = id, error = %e, "Failed to resample artifact, excluding");
                continue;
            }
        };

        let trimmed = stft::trim_silence(&samples, stft::TRIM_THRESHOLD_DB);
        let summary = stft::spectral_summary(trimmed)?;
        mean_values.extend(summary.mean);
        std_values.extend(summary.std);
        rows += 1;
    }

    let shape = (rows, stft::NUM_BINS);
    let mean = Array2::from_shape_vec(shape, mean_values)
        .map_err(|e| Error::Internal(format!("mean matrix: {}", e)))?;
    let std = Array2::from_shape_vec(shape, std_values)
        .map_err(|e| Error::Internal(format!("std matrix: {}", e)))?;

    let mean_bytes = matrix::encode(&mean);
    let std_bytes = matrix::encode(&std);
    store.publish_dir(
        &dir_key,
        &[
            (layout::MEAN_FILE, &mean_bytes),
            (layout::STD_FILE, &std_bytes),
        ],
    )?;

    info!(
        species = %group.species_key,
        recordings = rows,
        total = group.records.len(),
        "Feature bundle persisted"
    );
    Ok(SpeciesOutcome::Computed { rows })
}

/// Compute feature bundles for every selected species
pub fn extract_all(store: &ArtifactStore, groups: &[SpeciesGroup]) -> Result<ExtractSummary> {
    info!(species = groups.len(), "Computing features");
    let mut summary = ExtractSummary::default();

    for group in groups {
        match extract_species(store, group)? {
            SpeciesOutcome::Computed { rows } => {
                summary.computed += 1;
                summary.rows += rows;
            }
            SpeciesOutcome::Skipped => summary.skipped += 1,
        }
    }

    info!(
        computed = summary.computed,
        skipped = summary.skipped,
        "Feature extraction complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quality, RawRecord};

    fn group(species_key: &str, ids: &[u64]) -> SpeciesGroup {
        SpeciesGroup {
            species_key: species_key.to_string(),
            label: species_key.to_string(),
            records: ids
                .iter()
                .map(|&id| RawRecord {
                    id,
                    gen: "Turdus".to_string(),
                    sp: "merula".to_string(),
                    en: String::new(),
                    cnt: String::new(),
                    q: Quality::A,
                    kind: "song".to_string(),
                })
                .collect(),
        }
    }

    fn write_call(store: &ArtifactStore, species_key: &str, id: u64) {
        let samples: Vec<f32> = (0..8192).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let bytes = wav::encode_mono(&samples, 44100).unwrap();
        store
            .materialize(&layout::call_key(species_key, id), &bytes)
            .unwrap();
    }

    #[test]
    fn test_missing_artifacts_excluded_from_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        write_call(&store, "turdus_merula", 1);
        write_call(&store, "turdus_merula", 3);

        let outcome = extract_species(&store, &group("turdus_merula", &[3, 1, 2])).unwrap();
        assert_eq!(outcome, SpeciesOutcome::Computed { rows: 2 });

        let mean = matrix::decode(
            &store.read("features/turdus_merula/S_mean.bin").unwrap(),
        )
        .unwrap();
        assert_eq!(mean.dim(), (2, 1025));
    }

    #[test]
    fn test_existing_directory_skips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store
            .materialize("features/turdus_merula/sentinel", b"keep")
            .unwrap();

        let outcome = extract_species(&store, &group("turdus_merula", &[1])).unwrap();
        assert_eq!(outcome, SpeciesOutcome::Skipped);
        assert_eq!(store.read("features/turdus_merula/sentinel").unwrap(), b"keep");
    }

    #[test]
    fn test_empty_bundle_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let outcome = extract_species(&store, &group("turdus_merula", &[9])).unwrap();
        assert_eq!(outcome, SpeciesOutcome::Computed { rows: 0 });

        let std = matrix::decode(&store.read("features/turdus_merula/S_std.bin").unwrap()).unwrap();
        assert_eq!(std.dim(), (0, 1025));
    }
}

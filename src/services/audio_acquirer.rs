//! Audio Acquirer stage
//!
//! Downloads the raw audio payload for each eligible record, decodes it,
//! and persists one normalized WAV artifact per record id: mono f32 at the
//! pipeline-wide analysis rate. Existing artifacts are skipped without a
//! network call; failures leave no file behind so the record is retried on
//! the next invocation.

use tracing::{debug, info, warn};

use crate::audio::{decoder, resample, wav};
use crate::config::Config;
use crate::error::{ItemError, Result};
use crate::store::artifacts::ArtifactStore;
use crate::store::layout;
use crate::store::records::SpeciesGroup;

use super::xeno_canto::CatalogApi;

/// Per-record acquisition outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Artifact downloaded, decoded, and persisted this run
    Materialized,
    /// Artifact already present; no network call issued
    Skipped,
    /// No artifact written; `Network` failures retry next run
    Failed(ItemError),
}

/// Aggregated acquisition statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquireSummary {
    pub materialized: usize,
    pub skipped: usize,
    pub network_failures: usize,
    pub decode_failures: usize,
    pub not_found: usize,
}

impl AcquireSummary {
    fn tally(&mut self, outcome: &AcquireOutcome) {
        match outcome {
            AcquireOutcome::Materialized => self.materialized += 1,
            AcquireOutcome::Skipped => self.skipped += 1,
            AcquireOutcome::Failed(ItemError::Network(_)) => self.network_failures += 1,
            AcquireOutcome::Failed(ItemError::Decode(_)) => self.decode_failures += 1,
            AcquireOutcome::Failed(ItemError::NotFound) => self.not_found += 1,
        }
    }

    pub fn failed(&self) -> usize {
        self.network_failures + self.decode_failures + self.not_found
    }
}

/// Acquire one record's audio artifact
pub async fn acquire_one(
    api: &dyn CatalogApi,
    store: &ArtifactStore,
    species_key: &str,
    id: u64,
) -> Result<AcquireOutcome> {
    let key = layout::call_key(species_key, id);
    if store.exists(&key) {
        debug!(id = id, "Artifact exists, skipping");
        return Ok(AcquireOutcome::Skipped);
    }

    let payload = match api.download_audio(id).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!(id = id, error = %e, "Audio download failed");
            return Ok(AcquireOutcome::Failed(e));
        }
    };

    let decoded = match decoder::decode_bytes(payload) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(id = id, error = %e, "Audio payload undecodable");
            return Ok(AcquireOutcome::Failed(ItemError::Decode(e.to_string())));
        }
    };

    let samples = match resample::to_rate(
        decoded.samples,
        decoded.sample_rate,
        resample::TARGET_SAMPLE_RATE,
    ) {
        Ok(samples) => samples,
        Err(e) => {
            warn!(id = id, error = %e, "Resampling failed");
            return Ok(AcquireOutcome::Failed(ItemError::Decode(e.to_string())));
        }
    };

    let bytes = wav::encode_mono(&samples, resample::TARGET_SAMPLE_RATE)
        .map_err(|e| crate::error::Error::Internal(format!("WAV encode: {}", e)))?;
    store.materialize(&key, &bytes)?;
    debug!(id = id, samples = samples.len(), "Artifact materialized");
    Ok(AcquireOutcome::Materialized)
}

/// Acquire artifacts for every record in the selected species groups
///
/// Records per species are capped at `max_calls_per_species` in table
/// order. Per-item failures never abort the batch.
pub async fn acquire_all(
    api: &dyn CatalogApi,
    store: &ArtifactStore,
    groups: &[SpeciesGroup],
    config: &Config,
) -> Result<AcquireSummary> {
    info!(species = groups.len(), "Loading calls");
    let mut summary = AcquireSummary::default();

    for group in groups {
        let records = &group.records[..group.records.len().min(config.max_calls_per_species)];
        info!(
            species = %group.species_key,
            records = records.len(),
            "Loading calls for species"
        );

        for record in records {
            let outcome = acquire_one(api, store, &group.species_key, record.id).await?;
            summary.tally(&outcome);
        }
    }

    info!(
        materialized = summary.materialized,
        skipped = summary.skipped,
        failed = summary.failed(),
        "Call acquisition complete"
    );
    Ok(summary)
}

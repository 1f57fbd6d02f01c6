//! Sample-rate normalization
//!
//! Every recording is analyzed at a single pipeline-wide rate so a
//! frequency bin means the same Hz across all rows of a species' feature
//! matrix. Uses sinc interpolation with a BlackmanHarris2 window and a
//! 0.95 cutoff to prevent aliasing.

use anyhow::{Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Pipeline-wide analysis sample rate (44.1 kHz)
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Resample mono samples from `source_rate` to `target_rate`
///
/// A matching source rate is a no-op. Single-pass: the chunk size equals
/// the input length.
pub fn to_rate(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }

    let num_frames = samples.len();
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / source_rate as f64,
        2.0,
        params,
        num_frames,
        1,
    )
    .context("Failed to create resampler")?;

    let mut output = resampler
        .process(&[samples], None)
        .context("Resampling failed")?;

    debug!(
        in_frames = num_frames,
        out_frames = output[0].len(),
        source_rate = source_rate,
        target_rate = target_rate,
        "Resampled"
    );

    Ok(output.remove(0))
}

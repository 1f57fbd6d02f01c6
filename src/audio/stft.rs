//! Spectral summary features
//!
//! Fixed-window, fixed-hop short-time transform magnitudes reduced across
//! time to a per-frequency-bin mean and population standard deviation.
//! Window and hop are pipeline-wide constants; every recording yields
//! vectors of length `NUM_BINS` regardless of its duration.

use realfft::RealFftPlanner;

use crate::error::{Error, Result};

/// Transform window size in samples
pub const N_FFT: usize = 2048;
/// Hop between consecutive frames in samples
pub const HOP_LENGTH: usize = 512;
/// Frequency bins per frame (`N_FFT / 2 + 1`)
pub const NUM_BINS: usize = N_FFT / 2 + 1;
/// Silence-trim threshold relative to peak frame energy, in dB
pub const TRIM_THRESHOLD_DB: f32 = 60.0;

/// Per-frequency-bin summary of one recording
#[derive(Debug, Clone)]
pub struct SpectralSummary {
    /// Arithmetic mean of magnitude per bin, length `NUM_BINS`
    pub mean: Vec<f32>,
    /// Population standard deviation of magnitude per bin, length `NUM_BINS`
    pub std: Vec<f32>,
}

/// Trim leading and trailing low-energy edges
///
/// Frame-wise RMS against a threshold `threshold_db` below the loudest
/// frame. A fully-silent signal is returned unchanged rather than trimmed
/// to nothing.
pub fn trim_silence(samples: &[f32], threshold_db: f32) -> &[f32] {
    if samples.is_empty() {
        return samples;
    }

    let mut frame_rms = Vec::new();
    let mut offset = 0;
    while offset < samples.len() {
        let end = (offset + N_FFT).min(samples.len());
        frame_rms.push(rms(&samples[offset..end]));
        offset += HOP_LENGTH;
    }

    let peak = frame_rms.iter().cloned().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return samples;
    }

    let threshold = peak * 10f32.powf(-threshold_db / 20.0);
    let first = frame_rms.iter().position(|&r| r > threshold);
    let last = frame_rms.iter().rposition(|&r| r > threshold);

    match (first, last) {
        (Some(first), Some(last)) => {
            let start = first * HOP_LENGTH;
            let end = ((last + 1) * HOP_LENGTH).min(samples.len());
            &samples[start..end]
        }
        _ => samples,
    }
}

/// Magnitude STFT reduced to per-bin mean and population std
///
/// Frames are Hann-windowed, non-centered, hopped by `HOP_LENGTH`; a
/// recording shorter than one window contributes a single zero-padded
/// frame, so the output shape never depends on duration.
pub fn spectral_summary(samples: &[f32]) -> Result<SpectralSummary> {
    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(N_FFT);

    let window = hann_window(N_FFT);
    let num_frames = if samples.len() >= N_FFT {
        1 + (samples.len() - N_FFT) / HOP_LENGTH
    } else {
        1
    };

    let mut input = fft.make_input_vec();
    let mut output = fft.make_output_vec();
    let mut sum = vec![0.0f64; NUM_BINS];
    let mut sum_sq = vec![0.0f64; NUM_BINS];

    for frame in 0..num_frames {
        let offset = frame * HOP_LENGTH;
        for i in 0..N_FFT {
            let sample = samples.get(offset + i).copied().unwrap_or(0.0);
            input[i] = sample * window[i];
        }

        fft.process(&mut input, &mut output)
            .map_err(|e| Error::Internal(format!("FFT failed: {}", e)))?;

        for (bin, value) in output.iter().enumerate() {
            let magnitude = value.norm() as f64;
            sum[bin] += magnitude;
            sum_sq[bin] += magnitude * magnitude;
        }
    }

    let n = num_frames as f64;
    let mut mean = Vec::with_capacity(NUM_BINS);
    let mut std = Vec::with_capacity(NUM_BINS);
    for bin in 0..NUM_BINS {
        let m = sum[bin] / n;
        let variance = (sum_sq[bin] / n - m * m).max(0.0);
        mean.push(m as f32);
        std.push(variance.sqrt() as f32);
    }

    Ok(SpectralSummary { mean, std })
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

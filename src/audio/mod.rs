//! Audio decode, sample-rate normalization, WAV artifact I/O, and spectral
//! summary features

pub mod decoder;
pub mod resample;
pub mod stft;
pub mod wav;

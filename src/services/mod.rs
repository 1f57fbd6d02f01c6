//! Pipeline stages and the remote catalog client

pub mod audio_acquirer;
pub mod catalog_fetcher;
pub mod feature_extractor;
pub mod xeno_canto;

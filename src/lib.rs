//! turdus — incremental bird-vocalization dataset builder
//!
//! Batch pipeline over a remote recordings catalog:
//!
//! 1. **Records**: crawl the paginated catalog with durable per-page
//!    caching and merge into a canonical, id-unique record table.
//! 2. **Calls**: download and normalize audio for records matching the
//!    species allowlist, one WAV artifact per record id.
//! 3. **Features**: reduce each species' recordings to per-frequency-bin
//!    mean/std matrices of short-time transform magnitudes.
//!
//! Every stage checks its durable outputs before recomputation, so any
//! stage is independently restartable and interrupting a run is safe.

pub mod audio;
pub mod config;
pub mod error;
pub mod services;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Error, ItemError, Result};

//! Durable storage: TSV tables, artifact materialization, feature matrices

pub mod artifacts;
pub mod layout;
pub mod matrix;
pub mod records;
pub mod tsv;

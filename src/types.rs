//! Record types and the catalog wire format
//!
//! `RawRecord` is the canonical in-memory row; the `Wire*` structs mirror
//! the catalog's JSON responses, which encode `id` and `numPages` as either
//! numbers or strings depending on service version.

use serde::{Deserialize, Deserializer};

/// Recording quality grade supplied by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    A,
    B,
    C,
    D,
    E,
    /// Missing or unrecognized grade
    Unknown,
}

impl Quality {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            s if s.eq_ignore_ascii_case("A") => Quality::A,
            s if s.eq_ignore_ascii_case("B") => Quality::B,
            s if s.eq_ignore_ascii_case("C") => Quality::C,
            s if s.eq_ignore_ascii_case("D") => Quality::D,
            s if s.eq_ignore_ascii_case("E") => Quality::E,
            _ => Quality::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::A => "A",
            Quality::B => "B",
            Quality::C => "C",
            Quality::D => "D",
            Quality::E => "E",
            Quality::Unknown => "?",
        }
    }
}

/// One row of the canonical record table
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Globally stable catalog id
    pub id: u64,
    /// Genus
    pub gen: String,
    /// Species epithet
    pub sp: String,
    /// English name
    pub en: String,
    /// Country
    pub cnt: String,
    /// Quality grade
    pub q: Quality,
    /// Vocalization type (catalog field `type`, e.g. "song")
    pub kind: String,
}

impl RawRecord {
    /// Join/grouping key used across all stages
    pub fn species_key(&self) -> String {
        species_key(&self.gen, &self.sp)
    }
}

/// `lowercase(genus) + "_" + lowercase(species)`
pub fn species_key(gen: &str, sp: &str) -> String {
    format!("{}_{}", gen.to_lowercase(), sp.to_lowercase())
}

/// Catalog page query response
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPageResponse {
    #[serde(rename = "numPages", deserialize_with = "flexible_u32")]
    pub num_pages: u32,
    pub recordings: Vec<WireRecording>,
}

/// One recording object from the catalog JSON
#[derive(Debug, Clone, Deserialize)]
pub struct WireRecording {
    #[serde(deserialize_with = "flexible_u64")]
    pub id: u64,
    #[serde(default)]
    pub gen: String,
    #[serde(default)]
    pub sp: String,
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub cnt: String,
    #[serde(default)]
    pub q: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl From<WireRecording> for RawRecord {
    fn from(w: WireRecording) -> Self {
        RawRecord {
            id: w.id,
            gen: w.gen,
            sp: w.sp,
            en: w.en,
            cnt: w.cnt,
            q: Quality::parse(&w.q),
            kind: w.kind,
        }
    }
}

fn flexible_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn flexible_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = flexible_u64(deserializer)?;
    u32::try_from(n).map_err(|_| serde::de::Error::custom(format!("{} out of range for u32", n)))
}

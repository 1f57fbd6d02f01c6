//! Record Store: canonical table, allowlist join, grouping, popularity
//!
//! Pure functions over in-memory data. The canonical table invariant is
//! id-uniqueness; `merge` enforces it with last-write-wins semantics.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{species_key, Quality, RawRecord};

use super::tsv::Tsv;

const COLUMNS: [&str; 7] = ["id", "gen", "sp", "en", "cnt", "q", "type"];

/// An ordered table of records with TSV (de)serialization
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    records: Vec<RawRecord>,
}

impl RecordTable {
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn from_tsv(text: &str) -> Result<Self> {
        let tsv = Tsv::parse(text)?;
        let id = tsv.require_column("id")?;
        let gen = tsv.require_column("gen")?;
        let sp = tsv.require_column("sp")?;
        let en = tsv.require_column("en")?;
        let cnt = tsv.require_column("cnt")?;
        let q = tsv.require_column("q")?;
        let kind = tsv.require_column("type")?;

        let mut records = Vec::with_capacity(tsv.rows.len());
        for row in &tsv.rows {
            records.push(RawRecord {
                id: row[id]
                    .parse()
                    .map_err(|_| Error::Tsv(format!("bad record id '{}'", row[id])))?,
                gen: row[gen].clone(),
                sp: row[sp].clone(),
                en: row[en].clone(),
                cnt: row[cnt].clone(),
                q: Quality::parse(&row[q]),
                kind: row[kind].clone(),
            });
        }
        Ok(Self { records })
    }

    pub fn to_tsv(&self) -> String {
        let tsv = Tsv {
            header: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: self
                .records
                .iter()
                .map(|r| {
                    vec![
                        r.id.to_string(),
                        r.gen.clone(),
                        r.sp.clone(),
                        r.en.clone(),
                        r.cnt.clone(),
                        r.q.as_str().to_string(),
                        r.kind.clone(),
                    ]
                })
                .collect(),
        };
        tsv.render()
    }

    /// Union of tables, deduplicated by id
    ///
    /// First appearance fixes a record's position; a later record with the
    /// same id overwrites the value (ids are globally stable so the choice
    /// is immaterial, last write wins).
    pub fn merge(tables: impl IntoIterator<Item = RecordTable>) -> RecordTable {
        let mut by_id: HashMap<u64, usize> = HashMap::new();
        let mut records: Vec<RawRecord> = Vec::new();

        for table in tables {
            for record in table.records {
                match by_id.get(&record.id) {
                    Some(&i) => records[i] = record,
                    None => {
                        by_id.insert(record.id, records.len());
                        records.push(record);
                    }
                }
            }
        }

        RecordTable { records }
    }

    /// Rows whose genus matches exactly, in table order
    pub fn genus_slice(&self, gen: &str) -> RecordTable {
        RecordTable {
            records: self
                .records
                .iter()
                .filter(|r| r.gen == gen)
                .cloned()
                .collect(),
        }
    }

    /// Rows whose quality grade is in `qualities`; empty set accepts all
    pub fn filter_quality(&self, qualities: &[Quality]) -> RecordTable {
        if qualities.is_empty() {
            return self.clone();
        }
        RecordTable {
            records: self
                .records
                .iter()
                .filter(|r| qualities.contains(&r.q))
                .cloned()
                .collect(),
        }
    }
}

/// Species allowlist: accepted species_key → canonical label
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    labels: HashMap<String, String>,
}

impl Allowlist {
    /// Parse from TSV with `gen` and `sp` columns; an optional `name`
    /// column supplies the label, otherwise "Gen sp" is used.
    pub fn from_tsv(text: &str) -> Result<Self> {
        let tsv = Tsv::parse(text)?;
        let gen = tsv.require_column("gen")?;
        let sp = tsv.require_column("sp")?;
        let name = tsv.column("name");

        let mut labels = HashMap::new();
        for row in &tsv.rows {
            let key = species_key(&row[gen], &row[sp]);
            let label = match name {
                Some(i) => row[i].clone(),
                None => format!("{} {}", row[gen], row[sp]),
            };
            labels.insert(key, label);
        }
        Ok(Self { labels })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Records for one species, in table order
#[derive(Debug, Clone)]
pub struct SpeciesGroup {
    pub species_key: String,
    pub label: String,
    pub records: Vec<RawRecord>,
}

/// Inner-join against the allowlist, apply optional quality/type filters,
/// group by species_key.
///
/// Records whose species_key is not allowlisted are dropped silently, that
/// is the filter working as intended. Groups come back sorted by key; rows
/// within a group keep table order.
pub fn select_records(
    table: &RecordTable,
    allowlist: &Allowlist,
    qualities: &[Quality],
    kinds: &[String],
) -> Vec<SpeciesGroup> {
    let mut groups: std::collections::BTreeMap<String, Vec<RawRecord>> =
        std::collections::BTreeMap::new();

    for record in table.records() {
        let key = record.species_key();
        if !allowlist.contains(&key) {
            continue;
        }
        if !qualities.is_empty() && !qualities.contains(&record.q) {
            continue;
        }
        if !kinds.is_empty() && !kinds.contains(&record.kind) {
            continue;
        }
        groups.entry(key).or_default().push(record.clone());
    }

    groups
        .into_iter()
        .map(|(species_key, records)| {
            let label = allowlist
                .label(&species_key)
                .unwrap_or(&species_key)
                .to_string();
            SpeciesGroup {
                species_key,
                label,
                records,
            }
        })
        .collect()
}

/// Top K genera by descending record count
///
/// Ties break in first-appearance order (stable sort); callers must not
/// assume anything stronger.
pub fn top_genera(table: &RecordTable, k: usize) -> Vec<String> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for record in table.records() {
        match index.get(&record.gen) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(record.gen.clone(), counts.len());
                counts.push((record.gen.clone(), 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(k).map(|(gen, _)| gen).collect()
}

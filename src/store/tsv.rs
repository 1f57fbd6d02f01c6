//! Minimal TSV helpers
//!
//! The record tables are plain tab-separated text with a header line.
//! Fields are sanitized on write so a row is always one line.

use crate::error::{Error, Result};

/// A parsed TSV document: header plus rows of equal width
#[derive(Debug, Clone, Default)]
pub struct Tsv {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Tsv {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header: Vec<String> = match lines.next() {
            Some(line) => line.split('\t').map(str::to_string).collect(),
            None => return Err(Error::Tsv("missing header line".to_string())),
        };

        let mut rows = Vec::new();
        for (i, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let row: Vec<String> = line.split('\t').map(str::to_string).collect();
            if row.len() != header.len() {
                return Err(Error::Tsv(format!(
                    "row {} has {} fields, expected {}",
                    i + 2,
                    row.len(),
                    header.len()
                )));
            }
            rows.push(row);
        }

        Ok(Tsv { header, rows })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.header.join("\t"));
        out.push('\n');
        for row in &self.rows {
            let fields: Vec<String> = row.iter().map(|f| sanitize(f)).collect();
            out.push_str(&fields.join("\t"));
            out.push('\n');
        }
        out
    }

    /// Index of a named column
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Index of a named column, or a `Tsv` error naming it
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| Error::Tsv(format!("missing column '{}'", name)))
    }
}

/// Replace separator characters so a field stays within its cell
fn sanitize(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

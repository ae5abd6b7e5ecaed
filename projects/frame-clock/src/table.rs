// Uploaded CSV logs

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;

/// Column whose values end in the wall-clock time of the row.
pub const DATE_TIME_COLUMN: &str = "DATE AND TIME";

#[derive(Debug, Clone, Default, Serialize)]
pub struct LogTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LogTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (idx, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed CSV record {}", idx + 1))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Values of `column` in row order; short rows read as empty.
    pub fn values(&self, column: &str) -> Option<Vec<String>> {
        let idx = self.column_index(column)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Rows whose `column` equals `value`.
    pub fn matching_rows(&self, column: &str, value: &str) -> Vec<&Vec<String>> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter(|row| row.get(idx).map(String::as_str).unwrap_or("") == value)
            .collect()
    }

    pub fn cell<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        let idx = self.column_index(column)?;
        row.get(idx).map(String::as_str)
    }
}

/// Last whitespace-separated token of a `<date> <time>` cell.
pub fn time_token(date_time: &str) -> Option<&str> {
    date_time.split_whitespace().last()
}

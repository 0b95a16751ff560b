use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Candidate;

const HEADER: [&str; 6] = ["ticker", "price", "volume", "percent_change", "score", "rank"];

/// One artifact row. Floats are written in shortest round-trip form, so
/// reading a row back yields the exact values that were written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    pub ticker: String,
    pub price: f64,
    pub volume: i64,
    pub percent_change: f64,
    pub score: f64,
    pub rank: u32,
}

impl From<&Candidate> for CsvRow {
    fn from(candidate: &Candidate) -> Self {
        Self {
            ticker: candidate.quote.ticker.clone(),
            price: candidate.quote.price,
            volume: candidate.quote.volume,
            percent_change: candidate.quote.percent_change,
            score: candidate.score,
            rank: candidate.rank,
        }
    }
}

/// Render candidates as CSV. The header row is present even with no rows.
pub fn to_csv(candidates: &[Candidate]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record(HEADER)
        .context("Failed to write CSV header")?;

    for candidate in candidates {
        writer
            .serialize(CsvRow::from(candidate))
            .with_context(|| format!("Failed to write CSV row for {}", candidate.ticker()))?;
    }

    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush CSV")
}

/// Parse an artifact produced by [`to_csv`]
pub fn from_csv(data: &[u8]) -> Result<Vec<CsvRow>> {
    csv::Reader::from_reader(data)
        .deserialize::<CsvRow>()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse CSV artifact")
}

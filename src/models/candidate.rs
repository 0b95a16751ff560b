use serde::{Deserialize, Serialize};

use super::Quote;

/// A quote that passed every filter rule, with its ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub quote: Quote,

    /// Ranking score (higher is better), rounded to 4 decimals
    pub score: f64,

    /// 1-based position after sorting by score
    pub rank: u32,
}

impl Candidate {
    pub fn ticker(&self) -> &str {
        &self.quote.ticker
    }
}

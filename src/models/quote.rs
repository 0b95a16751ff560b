use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A close within 0.5% of the 20-session high counts as a breakout
const BREAKOUT_TOLERANCE: f64 = 0.995;

/// Latest daily bar for one ticker, as fetched from the quote provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Exchange symbol (e.g., "SNDL")
    pub ticker: String,

    /// Last close
    pub price: f64,

    /// Session volume of the last bar
    pub volume: i64,

    /// Change versus the previous close, in percent (12.0 = +12%)
    pub percent_change: f64,

    /// Start of the session the bar belongs to
    pub timestamp: DateTime<Utc>,

    /// Mean daily volume over the trailing 20 sessions, if known
    pub avg_volume: Option<f64>,

    /// Highest close over the trailing 20 sessions, last bar included
    #[serde(default)]
    pub high_20d: Option<f64>,
}

impl Quote {
    /// Today's volume relative to its trailing average
    pub fn volume_ratio(&self) -> Option<f64> {
        self.avg_volume
            .filter(|avg| *avg > 0.0)
            .map(|avg| self.volume as f64 / avg)
    }

    /// Whether the last close sits at (or within 0.5% of) the 20-session high
    pub fn is_breakout(&self) -> bool {
        self.high_20d
            .is_some_and(|high| high > 0.0 && self.price >= high * BREAKOUT_TOLERANCE)
    }
}

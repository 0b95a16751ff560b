use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::TickerFetchError;

use super::Candidate;

/// Result of a single webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed(String),
}

/// How the alert fared in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed(String),
    /// Delivery was not attempted (dry run)
    Skipped,
}

impl From<DeliveryOutcome> for DeliveryStatus {
    fn from(outcome: DeliveryOutcome) -> Self {
        match outcome {
            DeliveryOutcome::Sent => DeliveryStatus::Sent,
            DeliveryOutcome::Failed(reason) => DeliveryStatus::Failed(reason),
        }
    }
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed(_) => "failed",
            DeliveryStatus::Skipped => "skipped",
        }
    }
}

/// Pipeline stages of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Fetching,
    Filtering,
    Formatting,
    Delivering,
    Done,
    /// Terminal; only reachable from `Fetching`
    Aborted,
}

impl RunState {
    /// Whether the pipeline may move from `self` to `next`
    pub fn can_advance_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Init, RunState::Fetching)
                | (RunState::Fetching, RunState::Filtering)
                | (RunState::Fetching, RunState::Aborted)
                | (RunState::Filtering, RunState::Formatting)
                | (RunState::Formatting, RunState::Delivering)
                | (RunState::Delivering, RunState::Done)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::Fetching => "fetching",
            RunState::Filtering => "filtering",
            RunState::Formatting => "formatting",
            RunState::Delivering => "delivering",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Ranked candidates, rank 1 first
    pub candidates: Vec<Candidate>,

    /// Tickers that could not be fetched, sorted by ticker
    pub fetch_errors: Vec<TickerFetchError>,

    pub delivery_status: DeliveryStatus,

    /// Number of tickers in the universe
    pub scanned: usize,

    /// Written CSV artifact, if the write succeeded
    pub artifact: Option<PathBuf>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    /// Delivery failed or the artifact is missing
    pub fn is_partial(&self) -> bool {
        matches!(self.delivery_status, DeliveryStatus::Failed(_)) || self.artifact.is_none()
    }

    /// Summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} tickers in {:.1}s: {} candidates, {} fetch errors, delivery {}",
            self.scanned,
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0,
            self.candidates.len(),
            self.fetch_errors.len(),
            self.delivery_status.as_str(),
        )
    }
}

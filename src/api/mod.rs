pub mod discord;
pub mod retry;
pub mod universe;
pub mod yahoo;

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

pub use discord::WebhookClient;
pub use retry::RetryPolicy;
pub use universe::{resolve_universe, UniverseClient};
pub use yahoo::{FetchBatch, QuoteClient};

/// Server-requested delay from a `Retry-After: <seconds>` header
fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

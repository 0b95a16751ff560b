use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use crate::config::Config;

/// Used when no ticker list is configured and the listing download fails
pub const FALLBACK_TICKERS: &[&str] = &[
    "RR", "SNDL", "BBIG", "GME", "AMC", "NNDM", "GNS", "NAKD", "CEI", "MARA", "RIOT",
];

/// A real listing has far more symbols than this
const MIN_LISTING_SIZE: usize = 50;

/// Client for the exchange symbol listing
pub struct UniverseClient {
    client: Client,
    url: String,
}

impl UniverseClient {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.to_string(),
        }
    }

    /// Download the listing and return its sorted, unique symbols
    pub async fn load(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to download symbol listing")?;

        if !response.status().is_success() {
            anyhow::bail!("Symbol listing error: {}", response.status());
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read symbol listing")?;

        parse_listing(&body)
    }
}

/// Resolve the tickers to scan: explicit list, then listing, then fallback.
pub async fn resolve_universe(config: &Config) -> Vec<String> {
    if let Some(tickers) = &config.tickers {
        info!("Using {} configured tickers", tickers.len());
        return tickers.clone();
    }

    let client = UniverseClient::new(
        &config.universe_url,
        Duration::from_secs(config.http_timeout_secs),
    );

    match client.load().await {
        Ok(tickers) => {
            info!("Loaded {} symbols from listing", tickers.len());
            tickers
        }
        Err(e) => {
            warn!("Falling back to built-in ticker list: {:#}", e);
            FALLBACK_TICKERS.iter().map(|t| t.to_string()).collect()
        }
    }
}

/// Read the `Symbol` column of a listing CSV
fn parse_listing(body: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_reader(body);

    let column = reader
        .headers()
        .context("Symbol listing has no header row")?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("symbol"))
        .context("Symbol listing has no Symbol column")?;

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record.context("Malformed symbol listing row")?;
        if let Some(symbol) = record.get(column).map(str::trim) {
            if !symbol.is_empty() {
                symbols.push(symbol.to_uppercase());
            }
        }
    }

    symbols.sort();
    symbols.dedup();

    if symbols.len() < MIN_LISTING_SIZE {
        anyhow::bail!("Symbol listing too small ({} symbols)", symbols.len());
    }

    Ok(symbols)
}

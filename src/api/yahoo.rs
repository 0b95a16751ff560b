use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures_util::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::retry::{AttemptError, RetryPolicy};
use super::retry_after_header;
use crate::error::{DataSourceUnavailable, TickerFetchError};
use crate::models::Quote;

/// Sessions averaged for `Quote::avg_volume`
const AVG_VOLUME_WINDOW: usize = 20;

/// Client for the Yahoo Finance chart API
pub struct QuoteClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    concurrency: usize,
}

/// Quotes and per-ticker failures from one fetch, both sorted by ticker
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub quotes: Vec<Quote>,
    pub errors: Vec<TickerFetchError>,
    /// Distinct tickers requested after normalization
    pub requested: usize,
}

/// Why a single ticker could not be fetched
#[derive(Debug, Error)]
enum FetchFailure {
    #[error("request failed: {0}")]
    Network(String),

    #[error("unknown symbol")]
    NotFound,

    #[error("provider refused access: HTTP {0}")]
    Refused(u16),

    #[error("HTTP {status} - {detail}")]
    Status { status: u16, detail: String },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl QuoteClient {
    /// Create a new quote client
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("penny-scan/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            concurrency: 8,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch the latest quote for every ticker.
    ///
    /// Per-ticker failures are collected in the batch. The whole call fails
    /// only when every ticker failed or the provider refused access.
    pub async fn fetch(&self, tickers: &[String]) -> Result<FetchBatch, DataSourceUnavailable> {
        let universe: BTreeSet<String> = tickers
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();

        if universe.is_empty() {
            return Ok(FetchBatch::default());
        }

        info!(
            "Fetching quotes for {} tickers ({} concurrent)",
            universe.len(),
            self.concurrency
        );

        let results: Vec<(String, Result<Quote, FetchFailure>)> = stream::iter(universe)
            .map(|ticker| async move {
                let result = self.fetch_quote(&ticker).await;
                (ticker, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let total = results.len();
        let mut batch = FetchBatch {
            requested: total,
            ..FetchBatch::default()
        };
        let mut refused = None;

        for (ticker, result) in results {
            match result {
                Ok(quote) => batch.quotes.push(quote),
                Err(failure) => {
                    debug!("Failed to fetch {}: {}", ticker, failure);
                    if let FetchFailure::Refused(status) = failure {
                        refused.get_or_insert(status);
                    }
                    batch
                        .errors
                        .push(TickerFetchError::new(ticker, failure.to_string()));
                }
            }
        }

        if let Some(status) = refused {
            return Err(DataSourceUnavailable(format!(
                "quote provider refused access (HTTP {status})"
            )));
        }

        batch.errors.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        if batch.quotes.is_empty() {
            let first = batch
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(DataSourceUnavailable(format!(
                "all {total} ticker fetches failed (first: {first})"
            )));
        }

        batch.quotes.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        if !batch.errors.is_empty() {
            warn!("{} of {} tickers could not be fetched", batch.errors.len(), total);
        }
        info!("Fetched {} quotes", batch.quotes.len());

        Ok(batch)
    }

    /// Fetch one ticker, retrying transient failures
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, FetchFailure> {
        self.retry
            .run(ticker, || self.try_fetch_quote(ticker))
            .await
            .map_err(|failure| failure.error)
    }

    async fn try_fetch_quote(&self, ticker: &str) -> Result<Quote, AttemptError<FetchFailure>> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=1mo&interval=1d",
            self.base_url,
            urlencoding::encode(ticker)
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                let failure = FetchFailure::Network(e.to_string());
                if e.is_builder() {
                    AttemptError::Permanent(failure)
                } else {
                    AttemptError::transient(failure)
                }
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Transient {
                retry_after: retry_after_header(response.headers()),
                error: FetchFailure::Status {
                    status: status.as_u16(),
                    detail: "rate limited".to_string(),
                },
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(AttemptError::Permanent(FetchFailure::NotFound));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AttemptError::Permanent(FetchFailure::Refused(status.as_u16())));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let failure = FetchFailure::Status {
                status: status.as_u16(),
                detail: text.chars().take(120).collect(),
            };
            return Err(if status.is_server_error() {
                AttemptError::transient(failure)
            } else {
                AttemptError::Permanent(failure)
            });
        }

        let chart: ChartResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AttemptError::transient(FetchFailure::Network(e.to_string()))
            } else {
                AttemptError::Permanent(FetchFailure::Malformed(e.to_string()))
            }
        })?;

        quote_from_chart(ticker, chart).map_err(AttemptError::Permanent)
    }
}

/// Convert a chart payload into the quote for its most recent session
fn quote_from_chart(ticker: &str, chart: ChartResponse) -> Result<Quote, FetchFailure> {
    if let Some(error) = chart.chart.error {
        if error.code.eq_ignore_ascii_case("not found") {
            return Err(FetchFailure::NotFound);
        }
        return Err(FetchFailure::Malformed(format!(
            "{}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let result = chart
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| FetchFailure::Malformed("empty result".to_string()))?;

    let series = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchFailure::Malformed("missing quote series".to_string()))?;

    // Sessions with a gap in either column are skipped
    let bars: Vec<(i64, f64, f64)> = result
        .timestamp
        .iter()
        .zip(series.close.iter().zip(series.volume.iter()))
        .filter_map(|(ts, (close, volume))| match (close, volume) {
            (Some(c), Some(v)) if c.is_finite() && v.is_finite() => Some((*ts, *c, *v)),
            _ => None,
        })
        .collect();

    let [.., (_, prev_close, _), (ts, close, volume)] = bars.as_slice() else {
        return Err(FetchFailure::Malformed(format!(
            "need at least 2 sessions, got {}",
            bars.len()
        )));
    };

    if *prev_close <= 0.0 {
        return Err(FetchFailure::Malformed("non-positive previous close".to_string()));
    }

    let timestamp = Utc
        .timestamp_opt(*ts, 0)
        .single()
        .ok_or_else(|| FetchFailure::Malformed(format!("bad timestamp {ts}")))?;

    let window = &bars[bars.len().saturating_sub(AVG_VOLUME_WINDOW)..];
    let avg_volume = window.iter().map(|(_, _, v)| v).sum::<f64>() / window.len() as f64;
    let high_20d = window.iter().map(|(_, c, _)| *c).fold(f64::MIN, f64::max);

    Ok(Quote {
        ticker: ticker.to_string(),
        price: *close,
        volume: volume.round() as i64,
        percent_change: (close / prev_close - 1.0) * 100.0,
        timestamp,
        avg_volume: Some(avg_volume),
        high_20d: Some(high_20d),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_quote_from_last_two_sessions() {
        let payload = chart(
            r#"{"chart":{"result":[{
                "timestamp":[1700000000,1700086400,1700172800],
                "indicators":{"quote":[{
                    "close":[0.9,1.0,1.2],
                    "volume":[100000,300000,500000]
                }]}
            }],"error":null}}"#,
        );

        let quote = quote_from_chart("ABC", payload).unwrap();

        assert_eq!(quote.ticker, "ABC");
        assert_eq!(quote.price, 1.2);
        assert_eq!(quote.volume, 500_000);
        assert!((quote.percent_change - 20.0).abs() < 1e-9);
        assert_eq!(quote.timestamp.timestamp(), 1700172800);
        assert_eq!(quote.avg_volume, Some(300_000.0));
        assert_eq!(quote.high_20d, Some(1.2));
        assert!(quote.is_breakout());
    }

    #[test]
    fn test_gaps_are_skipped() {
        let payload = chart(
            r#"{"chart":{"result":[{
                "timestamp":[1,2,3,4],
                "indicators":{"quote":[{
                    "close":[2.0,null,2.5,null],
                    "volume":[1000,2000,3000,4000]
                }]}
            }],"error":null}}"#,
        );

        let quote = quote_from_chart("GAP", payload).unwrap();

        assert_eq!(quote.price, 2.5);
        assert_eq!(quote.volume, 3000);
        assert!((quote.percent_change - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_20d_uses_trailing_window() {
        // 25 sessions; the 3.0 spike is outside the last 20
        let closes: Vec<String> = (0..25)
            .map(|i| match i {
                0 => "3.0".to_string(),
                10 => "2.4".to_string(),
                _ => "2.0".to_string(),
            })
            .collect();
        let timestamps: Vec<String> = (0..25).map(|i| (1_700_000_000 + i * 86_400).to_string()).collect();
        let volumes = vec!["100000"; 25].join(",");
        let payload = chart(&format!(
            r#"{{"chart":{{"result":[{{
                "timestamp":[{}],
                "indicators":{{"quote":[{{"close":[{}],"volume":[{}]}}]}}
            }}],"error":null}}}}"#,
            timestamps.join(","),
            closes.join(","),
            volumes
        ));

        let quote = quote_from_chart("RNG", payload).unwrap();

        assert_eq!(quote.high_20d, Some(2.4));
        assert!(!quote.is_breakout());
    }

    #[test]
    fn test_single_session_is_malformed() {
        let payload = chart(
            r#"{"chart":{"result":[{
                "timestamp":[1],
                "indicators":{"quote":[{"close":[1.0],"volume":[10]}]}
            }],"error":null}}"#,
        );

        assert!(matches!(
            quote_from_chart("ONE", payload),
            Err(FetchFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_provider_error_not_found() {
        let payload = chart(
            r#"{"chart":{"result":null,"error":{
                "code":"Not Found",
                "description":"No data found, symbol may be delisted"
            }}}"#,
        );

        assert!(matches!(
            quote_from_chart("GONE", payload),
            Err(FetchFailure::NotFound)
        ));
    }
}

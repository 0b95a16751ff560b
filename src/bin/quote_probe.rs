use std::env;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use penny_scan::api::QuoteClient;
use penny_scan::config::Config;
use penny_scan::screening::FilterEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quote_probe=info,penny_scan=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tickers: Vec<String> = env::args().skip(1).collect();
    if tickers.is_empty() {
        anyhow::bail!("Usage: quote_probe <TICKER> [TICKER...]");
    }

    // Filter thresholds come from the usual environment; no alert is sent
    let config = Config::from_env(true)?;

    let client = QuoteClient::new(
        &config.quote_api_url,
        Duration::from_secs(config.http_timeout_secs),
    )
    .with_concurrency(config.fetch_concurrency);
    let engine = FilterEngine::new(config.filter.clone());

    info!("Probing {} tickers", tickers.len());
    let batch = client.fetch(&tickers).await?;

    for quote in &batch.quotes {
        let ratio = quote
            .volume_ratio()
            .map(|r| format!("{r:.2}x"))
            .unwrap_or_else(|| "-".to_string());

        let high = quote
            .high_20d
            .map(|h| format!("{h:.4}"))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<8} price {:>10.4}  vol {:>12}  chg {:>+8.2}%  rel vol {:>7}  20d high {:>10}{}  score {:>8.4}  {}",
            quote.ticker,
            quote.price,
            quote.volume,
            quote.percent_change,
            ratio,
            high,
            if quote.is_breakout() { " BO" } else { "   " },
            engine.score(quote),
            if engine.passes(quote) { "PASS" } else { "----" },
        );
    }

    for failure in &batch.errors {
        println!("{:<8} error: {}", failure.ticker, failure.reason);
    }

    Ok(())
}

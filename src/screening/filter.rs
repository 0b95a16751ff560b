use std::cmp::Ordering;

use tracing::{debug, info};

use crate::config::FilterConfig;
use crate::models::{Candidate, Quote};

/// Applies the screening rules and ranks the survivors
pub struct FilterEngine {
    config: FilterConfig,
}

impl FilterEngine {
    /// Create an engine for the given thresholds
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Check a quote against every rule. Non-finite or negative inputs fail.
    pub fn passes(&self, quote: &Quote) -> bool {
        let cfg = &self.config;

        // Written as positive comparisons so NaN never passes
        let price_ok = quote.price >= cfg.min_price && quote.price <= cfg.max_price;
        let volume_ok = quote.volume >= 0 && quote.volume as u64 >= cfg.min_volume;
        let change_ok = quote.percent_change.is_finite()
            && quote.percent_change >= cfg.min_percent_change;

        let ratio_ok = cfg.min_volume_ratio <= 0.0
            || quote
                .volume_ratio()
                .is_some_and(|ratio| ratio >= cfg.min_volume_ratio);

        price_ok && volume_ok && change_ok && ratio_ok
    }

    /// Weighted sum of volume magnitude and percent change, rounded to 4 decimals.
    ///
    /// Non-decreasing in both volume and percent change for non-negative weights.
    pub fn score(&self, quote: &Quote) -> f64 {
        let magnitude = (quote.volume.max(1) as f64).log10();
        let raw = self.config.volume_weight * magnitude
            + self.config.change_weight * quote.percent_change;

        (raw * 10_000.0).round() / 10_000.0
    }

    /// Filter, score, rank and cap. Rank 1 is the best score; ties go to the
    /// lexically smaller ticker.
    pub fn apply(&self, quotes: &[Quote]) -> Vec<Candidate> {
        let mut scored: Vec<(f64, &Quote)> = quotes
            .iter()
            .filter(|quote| {
                let keep = self.passes(quote);
                if !keep {
                    debug!("{} rejected by filters", quote.ticker);
                }
                keep
            })
            .map(|quote| (self.score(quote), quote))
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| rank_order(*score_a, a, *score_b, b));

        let passed = scored.len();
        if self.config.max_results > 0 {
            scored.truncate(self.config.max_results);
        }

        info!(
            "{} of {} quotes passed filters, keeping {}",
            passed,
            quotes.len(),
            scored.len()
        );

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (score, quote))| Candidate {
                quote: quote.clone(),
                score,
                rank: i as u32 + 1,
            })
            .collect()
    }
}

fn rank_order(score_a: f64, a: &Quote, score_b: f64, b: &Quote) -> Ordering {
    score_b
        .total_cmp(&score_a)
        .then_with(|| a.ticker.cmp(&b.ticker))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn config() -> FilterConfig {
        FilterConfig {
            min_price: 0.50,
            max_price: 5.00,
            min_volume: 100_000,
            min_percent_change: 5.0,
            ..FilterConfig::default()
        }
    }

    fn quote(ticker: &str, price: f64, volume: i64, percent_change: f64) -> Quote {
        Quote {
            ticker: ticker.to_string(),
            price,
            volume,
            percent_change,
            timestamp: Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap(),
            avg_volume: None,
            high_20d: None,
        }
    }

    #[test]
    fn test_penny_band() {
        let engine = FilterEngine::new(config());

        assert!(engine.passes(&quote("ABC", 1.20, 500_000, 12.0)));
        assert!(!engine.passes(&quote("XYZ", 6.00, 500_000, 12.0)));
        assert!(!engine.passes(&quote("XYZ", 6.00, 50_000_000, 90.0)));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let engine = FilterEngine::new(config());

        assert!(engine.passes(&quote("LOW", 0.50, 100_000, 5.0)));
        assert!(engine.passes(&quote("HIGH", 5.00, 100_000, 5.0)));
        assert!(!engine.passes(&quote("VOL", 1.0, 99_999, 5.0)));
        assert!(!engine.passes(&quote("CHG", 1.0, 100_000, 4.99)));
    }

    #[test]
    fn test_malformed_values_fail() {
        let engine = FilterEngine::new(config());

        assert!(!engine.passes(&quote("NEG", 1.0, -500_000, 10.0)));
        assert!(!engine.passes(&quote("NAN", f64::NAN, 500_000, 10.0)));
        assert!(!engine.passes(&quote("NAN", 1.0, 500_000, f64::NAN)));
        assert!(!engine.passes(&quote("INF", 1.0, 500_000, f64::INFINITY)));
    }

    #[test]
    fn test_volume_ratio_rule() {
        let engine = FilterEngine::new(FilterConfig {
            min_volume_ratio: 3.0,
            ..config()
        });

        let mut spike = quote("SPK", 1.0, 600_000, 10.0);
        spike.avg_volume = Some(150_000.0);
        let mut flat = quote("FLT", 1.0, 600_000, 10.0);
        flat.avg_volume = Some(400_000.0);
        let unknown = quote("UNK", 1.0, 600_000, 10.0);

        assert!(engine.passes(&spike));
        assert!(!engine.passes(&flat));
        assert!(!engine.passes(&unknown));
    }

    #[test]
    fn test_score_is_monotonic() {
        let engine = FilterEngine::new(config());
        let base = engine.score(&quote("A", 1.0, 200_000, 6.0));

        assert!(engine.score(&quote("A", 1.0, 2_000_000, 6.0)) >= base);
        assert!(engine.score(&quote("A", 1.0, 200_000, 9.0)) >= base);
        assert!(engine.score(&quote("A", 1.0, 200_001, 6.0)) >= base);
    }

    #[test]
    fn test_ranking_order_and_tie_break() {
        let engine = FilterEngine::new(config());
        let quotes = vec![
            quote("BBB", 1.0, 500_000, 10.0),
            quote("CCC", 2.0, 5_000_000, 30.0),
            quote("AAA", 3.0, 500_000, 10.0),
            quote("ZZZ", 9.0, 5_000_000, 30.0),
        ];

        let candidates = engine.apply(&quotes);
        let order: Vec<(&str, u32)> = candidates.iter().map(|c| (c.ticker(), c.rank)).collect();

        assert_eq!(order, vec![("CCC", 1), ("AAA", 2), ("BBB", 3)]);
        assert_eq!(candidates[1].score, candidates[2].score);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let engine = FilterEngine::new(config());
        let mut quotes = vec![
            quote("DDD", 1.0, 800_000, 7.0),
            quote("AAA", 1.0, 500_000, 10.0),
            quote("CCC", 1.0, 500_000, 10.0),
            quote("BBB", 1.0, 900_000, 25.0),
        ];

        let first = engine.apply(&quotes);
        quotes.reverse();
        let second = engine.apply(&quotes);

        assert_eq!(first, second);
    }

    #[test]
    fn test_max_results_caps_after_ranking() {
        let quotes: Vec<Quote> = (0..10)
            .map(|i| quote(&format!("T{i}"), 1.0, 500_000, 10.0 + i as f64))
            .collect();

        let capped = FilterEngine::new(FilterConfig {
            max_results: 3,
            ..config()
        })
        .apply(&quotes);
        let tickers: Vec<&str> = capped.iter().map(|c| c.ticker()).collect();
        assert_eq!(tickers, vec!["T9", "T8", "T7"]);

        let uncapped = FilterEngine::new(FilterConfig {
            max_results: 0,
            ..config()
        })
        .apply(&quotes);
        assert_eq!(uncapped.len(), 10);
        assert_eq!(uncapped.last().unwrap().rank, 10);
    }
}

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_UNIVERSE_URL: &str =
    "https://raw.githubusercontent.com/datasets/nasdaq-listings/master/data/nasdaq-listed-symbols.csv";
pub const DEFAULT_QUOTE_API_URL: &str = "https://query1.finance.yahoo.com";

/// Smallest digest budget that still fits one entry plus the overflow line.
const MIN_DIGEST_LENGTH: usize = 64;

/// Discord rejects message content longer than this.
const MAX_DIGEST_LENGTH: usize = 2000;

/// Webhook URL. The URL embeds the channel credential, so it is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookUrl(String);

impl WebhookUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WebhookUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookUrl(***)")
    }
}

/// Screening thresholds and ranking knobs
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Lowest accepted last price (inclusive)
    pub min_price: f64,

    /// Highest accepted last price (inclusive)
    pub max_price: f64,

    /// Minimum session volume
    pub min_volume: u64,

    /// Minimum percent change versus the previous close
    pub min_percent_change: f64,

    /// Cap on ranked candidates; 0 means no cap
    pub max_results: usize,

    /// Minimum volume / 20-day average volume; 0 disables the check
    pub min_volume_ratio: f64,

    /// Score points per order of magnitude of volume
    pub volume_weight: f64,

    /// Score points per percent of change
    pub change_weight: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_price: 0.25,
            max_price: 5.00,
            min_volume: 200_000,
            min_percent_change: 5.0,
            max_results: 15,
            min_volume_ratio: 0.0,
            volume_weight: 10.0,
            change_weight: 1.0,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = [
            ("MIN_PRICE", self.min_price),
            ("MAX_PRICE", self.max_price),
            ("MIN_PERCENT_CHANGE", self.min_percent_change),
            ("MIN_VOLUME_RATIO", self.min_volume_ratio),
            ("SCORE_VOLUME_WEIGHT", self.volume_weight),
            ("SCORE_CHANGE_WEIGHT", self.change_weight),
        ];

        for (name, value) in bounds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Constraint(format!(
                    "{name} must be a finite number >= 0 (got {value})"
                )));
            }
        }

        if self.min_price > self.max_price {
            return Err(ConfigError::Constraint(format!(
                "MIN_PRICE ({}) must not exceed MAX_PRICE ({})",
                self.min_price, self.max_price
            )));
        }

        Ok(())
    }
}

/// Run configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord webhook; only optional for dry runs
    pub webhook_url: Option<WebhookUrl>,

    /// Screening thresholds
    pub filter: FilterConfig,

    /// Character budget for the alert message
    pub digest_max_length: usize,

    /// Explicit ticker universe; overrides the remote listing
    pub tickers: Option<Vec<String>>,

    /// Symbol listing CSV used when no tickers are given
    pub universe_url: String,

    /// Quote provider base URL
    pub quote_api_url: String,

    /// Concurrent per-ticker fetches
    pub fetch_concurrency: usize,

    /// Timeout in seconds for every HTTP call
    pub http_timeout_secs: u64,

    /// Directory for the CSV artifact
    pub output_dir: PathBuf,

    /// Skip webhook delivery
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from environment variables and `.env`.
    ///
    /// `force_dry_run` (the `--dry-run` flag) wins over `DRY_RUN`.
    pub fn from_env(force_dry_run: bool) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| match name {
            "DRY_RUN" if force_dry_run => Some("true".to_string()),
            _ => env::var(name).ok(),
        })
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Schedulers often export unset secrets as empty strings
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let defaults = FilterConfig::default();
        let filter = FilterConfig {
            min_price: parse_or(&var, "MIN_PRICE", "number", defaults.min_price)?,
            max_price: parse_or(&var, "MAX_PRICE", "number", defaults.max_price)?,
            min_volume: parse_or(&var, "MIN_VOLUME", "non-negative integer", defaults.min_volume)?,
            min_percent_change: parse_or(
                &var,
                "MIN_PERCENT_CHANGE",
                "number",
                defaults.min_percent_change,
            )?,
            max_results: parse_or(
                &var,
                "MAX_RESULTS",
                "non-negative integer",
                defaults.max_results,
            )?,
            min_volume_ratio: parse_or(
                &var,
                "MIN_VOLUME_RATIO",
                "number",
                defaults.min_volume_ratio,
            )?,
            volume_weight: parse_or(
                &var,
                "SCORE_VOLUME_WEIGHT",
                "number",
                defaults.volume_weight,
            )?,
            change_weight: parse_or(
                &var,
                "SCORE_CHANGE_WEIGHT",
                "number",
                defaults.change_weight,
            )?,
        };

        let dry_run = match var("DRY_RUN") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                name: "DRY_RUN",
                expected: "boolean",
                value: raw,
            })?,
            None => false,
        };

        let webhook_url = var("DISCORD_WEBHOOK_URL").map(|url| WebhookUrl::new(url.trim()));

        let tickers = var("TICKERS").map(|raw| {
            raw.split(',')
                .map(|t| t.trim().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        });

        let config = Config {
            webhook_url,
            filter,
            digest_max_length: parse_or(&var, "DIGEST_MAX_LENGTH", "integer", 1900)?,
            tickers,
            universe_url: var("UNIVERSE_URL").unwrap_or_else(|| DEFAULT_UNIVERSE_URL.to_string()),
            quote_api_url: var("QUOTE_API_URL")
                .unwrap_or_else(|| DEFAULT_QUOTE_API_URL.to_string()),
            fetch_concurrency: parse_or(&var, "FETCH_CONCURRENCY", "integer", 8)?,
            http_timeout_secs: parse_or(&var, "HTTP_TIMEOUT_SECS", "integer", 20)?,
            output_dir: var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            dry_run,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate()?;

        if self.webhook_url.is_none() && !self.dry_run {
            return Err(ConfigError::Missing("DISCORD_WEBHOOK_URL"));
        }

        if !(MIN_DIGEST_LENGTH..=MAX_DIGEST_LENGTH).contains(&self.digest_max_length) {
            return Err(ConfigError::Constraint(format!(
                "DIGEST_MAX_LENGTH must be between {MIN_DIGEST_LENGTH} and {MAX_DIGEST_LENGTH}"
            )));
        }

        if self.fetch_concurrency == 0 {
            return Err(ConfigError::Constraint(
                "FETCH_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Constraint(
                "HTTP_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        if matches!(&self.tickers, Some(t) if t.is_empty()) {
            return Err(ConfigError::Constraint(
                "TICKERS must name at least one symbol".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, expected: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value: raw,
        }),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

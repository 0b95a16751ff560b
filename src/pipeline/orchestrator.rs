use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::api::{resolve_universe, QuoteClient, WebhookClient};
use crate::config::Config;
use crate::error::RunError;
use crate::models::{Candidate, DeliveryStatus, RunResult, RunState};
use crate::report;
use crate::screening::FilterEngine;

/// Runs one scan: fetch, filter, format, deliver
pub struct RunOrchestrator {
    config: Config,
    quotes: QuoteClient,
    webhook: WebhookClient,
    state: RunState,
}

impl RunOrchestrator {
    /// Create an orchestrator with clients built from the configuration
    pub fn new(config: Config) -> Self {
        let timeout = Duration::from_secs(config.http_timeout_secs);
        let quotes = QuoteClient::new(&config.quote_api_url, timeout)
            .with_concurrency(config.fetch_concurrency);
        let webhook = WebhookClient::new(timeout);

        Self::with_clients(config, quotes, webhook)
    }

    /// Create an orchestrator around preconfigured clients
    pub fn with_clients(config: Config, quotes: QuoteClient, webhook: WebhookClient) -> Self {
        Self {
            config,
            quotes,
            webhook,
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute the pipeline once. Each call starts a fresh run from `Init`.
    ///
    /// Only configuration errors and an unavailable data source fail the run.
    /// A failed delivery or artifact write is recorded in the result.
    pub async fn run(&mut self) -> Result<RunResult, RunError> {
        self.state = RunState::Init;
        self.config.validate()?;
        let started_at = Utc::now();

        self.advance(RunState::Fetching);
        let tickers = resolve_universe(&self.config).await;

        let batch = match self.quotes.fetch(&tickers).await {
            Ok(batch) => batch,
            Err(e) => {
                self.advance(RunState::Aborted);
                return Err(e.into());
            }
        };

        for failure in &batch.errors {
            debug!("Fetch error: {}", failure);
        }

        self.advance(RunState::Filtering);
        let candidates = FilterEngine::new(self.config.filter.clone()).apply(&batch.quotes);

        self.advance(RunState::Formatting);
        let artifact = self.write_artifact(&candidates, started_at.date_naive());
        let digest = report::to_digest(&candidates, self.config.digest_max_length);

        self.advance(RunState::Delivering);
        let delivery_status = self.deliver(&digest).await;

        self.advance(RunState::Done);

        let result = RunResult {
            candidates,
            fetch_errors: batch.errors,
            delivery_status,
            scanned: batch.requested,
            artifact,
            started_at,
            completed_at: Utc::now(),
        };

        if result.is_partial() {
            warn!("Run completed with partial failure: {}", result.summary());
        } else {
            info!("{}", result.summary());
        }

        Ok(result)
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid run transition {} -> {}",
            self.state,
            next
        );
        debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
    }

    fn write_artifact(&self, candidates: &[Candidate], date: NaiveDate) -> Option<PathBuf> {
        let written = report::to_csv(candidates)
            .and_then(|csv| report::write_artifact(&self.config.output_dir, date, &csv));

        match written {
            Ok(path) => {
                info!("Saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Failed to write artifact: {:#}", e);
                None
            }
        }
    }

    async fn deliver(&self, digest: &str) -> DeliveryStatus {
        if self.config.dry_run {
            info!("Dry run, alert not sent:\n{}", digest);
            return DeliveryStatus::Skipped;
        }

        match &self.config.webhook_url {
            Some(url) => self.webhook.deliver(digest, url).await.into(),
            None => {
                warn!("No webhook configured, alert not sent");
                DeliveryStatus::Skipped
            }
        }
    }
}

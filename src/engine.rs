// Async HTTP scan engine for idorscan
// Uses reqwest and tokio for concurrent requests

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ScanError;
use crate::models::{ScanConfig, ScanResult, ScanStats, ID_PLACEHOLDER};

/// Issues one GET per identifier in the configured range, at most
/// `concurrency` requests in flight at a time.
///
/// Every identifier is independent: a transport failure is recorded on
/// that result and never aborts the scan. Results come back ordered by
/// ascending identifier regardless of completion order.
pub struct ScanEngine {
    client: Client,
    headers: HeaderMap,
    config: ScanConfig,
}

impl ScanEngine {
    /// Validate the config and build the shared HTTP client.
    /// Fails before anything is sent.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let headers = build_header_map(&config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ScanError::Client(e.to_string()))?;
        Ok(Self {
            client,
            headers,
            config,
        })
    }

    pub async fn run(&self) -> (Vec<ScanResult>, ScanStats) {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Variant that accepts a `CancellationToken`. Cancellation stops new
    /// requests from being issued; in-flight ones complete or fail on
    /// their own, and every collected result is kept.
    pub async fn run_with_cancel(&self, cancel: CancellationToken) -> (Vec<ScanResult>, ScanStats) {
        let expected = (self.config.id_end - self.config.id_start) as usize + 1;
        let results = Arc::new(Mutex::new(Vec::with_capacity(expected)));
        let sem = Arc::new(Semaphore::new(self.config.concurrency));
        let mut set = JoinSet::new();

        info!(
            target_url = %self.config.target,
            id_start = self.config.id_start,
            id_end = self.config.id_end,
            concurrency = self.config.concurrency,
            "starting scan"
        );

        for id in self.config.id_start..=self.config.id_end {
            if cancel.is_cancelled() {
                info!(next_id = id, "scan cancelled, no further requests issued");
                break;
            }
            // At most `concurrency` permits exist, so at most that many
            // tasks are alive at once.
            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore in scope");
            let client = self.client.clone();
            let headers = self.headers.clone();
            let url = build_url(&self.config.target, id);
            let results = Arc::clone(&results);

            set.spawn(async move {
                let _permit = permit; // held until the request finishes
                let result = fetch_one(&client, headers, id, url).await;
                let mut guard = results.lock().await;
                guard.push(result);
            });
        }

        while set.join_next().await.is_some() {}

        let mut collected = {
            let mut guard = results.lock().await;
            std::mem::take(&mut *guard)
        };
        // Completion order depends on network latency; output order is by id.
        collected.sort_by_key(|r| r.id);

        let stats = ScanStats::from_results(&collected);
        (collected, stats)
    }
}

/// Validate the engine config and run a full scan.
pub async fn run_scan(config: ScanConfig) -> Result<(Vec<ScanResult>, ScanStats), ScanError> {
    let engine = ScanEngine::new(config)?;
    Ok(engine.run().await)
}

pub async fn run_scan_with_cancel(
    config: ScanConfig,
    cancel: CancellationToken,
) -> Result<(Vec<ScanResult>, ScanStats), ScanError> {
    let engine = ScanEngine::new(config)?;
    Ok(engine.run_with_cancel(cancel).await)
}

/// Resolve the request URL for one identifier. All placeholder
/// occurrences are replaced identically.
pub fn build_url(target: &str, id: u64) -> String {
    target.replace(ID_PLACEHOLDER, &id.to_string())
}

async fn fetch_one(client: &Client, headers: HeaderMap, id: u64, url: String) -> ScanResult {
    debug!(id, url = %url, "dispatching request");
    match client.get(&url).headers(headers).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            // A failed body read still counts as a completed exchange;
            // the length is simply unavailable.
            let body_len = response.bytes().await.map(|b| b.len()).unwrap_or(0);
            ScanResult::success(id, url, status, body_len)
        }
        Err(e) => {
            let message = transport_error_message(&e);
            debug!(id, error = %message, "request failed");
            ScanResult::failure(id, url, message)
        }
    }
}

/// Short diagnostic for a transport failure, with the common cases
/// classified up front.
fn transport_error_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

fn build_header_map(config: &ScanConfig) -> Result<HeaderMap, ScanError> {
    let mut map = HeaderMap::new();
    for (name, value) in &config.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ScanError::InvalidConfig(format!("invalid header name: {}", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ScanError::InvalidConfig(format!("invalid value for header '{}'", name)))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

// Core data models for idorscan
// Scan configuration, per-identifier results, and aggregate statistics

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Placeholder token in the target URL. Every occurrence is replaced
/// with the decimal form of the identifier under test.
pub const ID_PLACEHOLDER: &str = "{id}";

fn default_concurrency() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    10
}

/// Describes one scan: the templated target URL, the inclusive identifier
/// range, extra request headers, and the concurrency bound.
///
/// A config is built by the CLI or loaded from a YAML file and is never
/// mutated once the scan starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// URL template containing the `{id}` placeholder.
    pub target: String,
    /// First identifier to test (inclusive).
    pub id_start: u64,
    /// Last identifier to test (inclusive).
    pub id_end: u64,
    /// Headers attached to every request, names case-preserved.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Maximum number of simultaneous in-flight requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ScanConfig {
    /// Reject malformed configs before any request is issued.
    pub fn validate(&self) -> Result<(), ScanError> {
        if !self.target.contains(ID_PLACEHOLDER) {
            return Err(ScanError::InvalidConfig(format!(
                "target URL must contain the '{}' placeholder: {}",
                ID_PLACEHOLDER, self.target
            )));
        }
        if self.id_start > self.id_end {
            return Err(ScanError::InvalidConfig(format!(
                "id_start ({}) must not exceed id_end ({})",
                self.id_start, self.id_end
            )));
        }
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a single identifier probe.
///
/// Created once by the scan engine. The `diff_status` and `diff_len`
/// fields stay `None` until the anomaly-marking pass runs, and remain
/// `None` afterwards when no corresponding baseline exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    pub id: u64,
    /// Fully resolved request URL.
    pub url: String,
    /// HTTP status code, absent on transport failure.
    pub status: Option<u16>,
    /// Response body length in bytes, 0 if unavailable.
    pub body_len: usize,
    /// Short diagnostic, present only on transport failure.
    pub error: Option<String>,
    pub diff_status: Option<bool>,
    pub diff_len: Option<bool>,
}

impl ScanResult {
    /// A completed HTTP exchange. Any status code counts, including 4xx/5xx.
    pub fn success(id: u64, url: String, status: u16, body_len: usize) -> Self {
        Self {
            id,
            url,
            status: Some(status),
            body_len,
            error: None,
            diff_status: None,
            diff_len: None,
        }
    }

    /// A transport-level failure (connect, DNS, TLS, timeout).
    pub fn failure(id: u64, url: String, error: String) -> Self {
        Self {
            id,
            url,
            status: None,
            body_len: 0,
            error: Some(error),
            diff_status: None,
            diff_len: None,
        }
    }

    /// True once the marking pass has flagged either dimension.
    pub fn is_anomalous(&self) -> bool {
        self.diff_status == Some(true) || self.diff_len == Some(true)
    }
}

/// Aggregate counters derived from the result collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanStats {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub status_changes: usize,
    pub length_changes: usize,
}

impl ScanStats {
    /// Transport-level counters, computed when the scan pass completes.
    /// Diff counters stay zero until the marking pass has run.
    pub fn from_results(results: &[ScanResult]) -> Self {
        let success = results.iter().filter(|r| r.status.is_some()).count();
        Self {
            total: results.len(),
            success,
            errors: results.len() - success,
            status_changes: 0,
            length_changes: 0,
        }
    }

    /// Fold the marking pass back into the counters.
    pub fn record_diff_counts(&mut self, results: &[ScanResult]) {
        self.status_changes = results
            .iter()
            .filter(|r| r.diff_status == Some(true))
            .count();
        self.length_changes = results
            .iter()
            .filter(|r| r.diff_len == Some(true))
            .count();
    }
}

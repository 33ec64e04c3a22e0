// Response comparison and baseline detection for idorscan
// The most frequent (status, body length) signature is the baseline;
// deviations from it are candidate IDOR findings

use indexmap::IndexMap;

use crate::models::ScanResult;

/// Joint response signature. Status is `None` for transport failures.
pub type Pattern = (Option<u16>, usize);

/// Find the most common (status, body length) combination across all
/// results that carry a status.
///
/// Returns `(None, 0)` when no result has a status. Ties break toward
/// the first-encountered combination, so identical input ordering always
/// yields the same baseline.
pub fn find_baseline_pattern(results: &[ScanResult]) -> (Option<u16>, usize) {
    let mut patterns: IndexMap<(u16, usize), usize> = IndexMap::new();
    for result in results {
        if let Some(status) = result.status {
            *patterns.entry((status, result.body_len)).or_insert(0) += 1;
        }
    }

    match first_mode(&patterns) {
        Some((status, length)) => (Some(status), length),
        None => (None, 0),
    }
}

/// Most common HTTP status code alone. Alternative single-dimension
/// baseline; the default marking pass uses the joint pattern instead.
pub fn find_baseline_by_status(results: &[ScanResult]) -> Option<u16> {
    let mut counts: IndexMap<u16, usize> = IndexMap::new();
    for result in results {
        if let Some(status) = result.status {
            *counts.entry(status).or_insert(0) += 1;
        }
    }
    first_mode(&counts)
}

/// Most common body length alone, considering only results that carry a
/// status. Returns 0 when none do.
pub fn find_baseline_by_length(results: &[ScanResult]) -> usize {
    let mut counts: IndexMap<usize, usize> = IndexMap::new();
    for result in results {
        if result.status.is_some() {
            *counts.entry(result.body_len).or_insert(0) += 1;
        }
    }
    first_mode(&counts).unwrap_or(0)
}

/// Highest-count key. The strict comparison keeps the first-encountered
/// key on ties, which is what makes baseline selection reproducible.
fn first_mode<K: Copy>(counts: &IndexMap<K, usize>) -> Option<K> {
    let mut best_key = None;
    let mut best_count = 0usize;
    for (key, count) in counts {
        if *count > best_count {
            best_count = *count;
            best_key = Some(*key);
        }
    }
    best_key
}

/// Compare one result against baseline values.
///
/// The status differs only when both a baseline status and a result
/// status exist. A zero-length baseline or zero-length body carries no
/// information and is never reported as a length difference.
pub fn compare_response(
    result: &ScanResult,
    baseline_status: Option<u16>,
    baseline_length: usize,
) -> (bool, bool) {
    let diff_status = match (baseline_status, result.status) {
        (Some(baseline), Some(status)) => status != baseline,
        _ => false,
    };

    let diff_len =
        baseline_length > 0 && result.body_len > 0 && result.body_len != baseline_length;

    (diff_status, diff_len)
}

/// Mark every result that deviates from the baseline pattern.
///
/// Computes the joint baseline once, then sets `diff_status` and
/// `diff_len` on every result that carries a status. Each flag stays
/// `None` when the corresponding baseline does not exist, and results
/// without a status are left unmarked entirely. Calling this twice on
/// unchanged input produces identical flags.
pub fn mark_anomalies(results: &mut [ScanResult]) {
    let (baseline_status, baseline_length) = find_baseline_pattern(results);

    for result in results.iter_mut() {
        if result.status.is_none() {
            continue;
        }
        let (diff_status, diff_len) = compare_response(result, baseline_status, baseline_length);
        result.diff_status = baseline_status.map(|_| diff_status);
        result.diff_len = if baseline_length > 0 {
            Some(diff_len)
        } else {
            None
        };
    }
}

/// Results flagged in either dimension. Unmarked results never count.
pub fn get_anomalies(results: &[ScanResult]) -> Vec<&ScanResult> {
    results.iter().filter(|r| r.is_anomalous()).collect()
}

/// Group all results by their (status, body length) signature, transport
/// failures included under `(None, body_len)`. Groups and their members
/// keep input order. Reporting input, not an anomaly decision.
pub fn group_by_pattern(results: &[ScanResult]) -> IndexMap<Pattern, Vec<&ScanResult>> {
    let mut groups: IndexMap<Pattern, Vec<&ScanResult>> = IndexMap::new();
    for result in results {
        groups
            .entry((result.status, result.body_len))
            .or_default()
            .push(result);
    }
    groups
}

/// Similarity between two results in [0.0, 1.0].
///
/// Half the score comes from an exact status match, half from body
/// length closeness. Clustering primitive for future multi-baseline
/// detection; not used by the default pipeline.
pub fn calculate_similarity_score(a: &ScanResult, b: &ScanResult) -> f64 {
    if a.status.is_none() || b.status.is_none() {
        return 0.0;
    }

    let mut score = 0.0;

    if a.status == b.status {
        score += 0.5;
    }

    if a.body_len > 0 && b.body_len > 0 {
        let len_diff = a.body_len.abs_diff(b.body_len) as f64;
        let max_len = a.body_len.max(b.body_len) as f64;
        score += 0.5 * (1.0 - len_diff / max_len);
    } else if a.body_len == b.body_len {
        // Both empty. The lengths agree even though they carry no
        // information on their own.
        score += 0.5;
    }

    score
}

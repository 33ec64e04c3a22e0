// Reporting and output for idorscan
// Writes timestamped JSON, TXT, and HTML reports into an explicit
// reports directory

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::json;
use walkdir::WalkDir;

use crate::diffing::{get_anomalies, group_by_pattern, Pattern};
use crate::error::ScanError;
use crate::models::{ScanResult, ScanStats};

/// Paths of the three reports written for one scan.
pub struct ReportPaths {
    pub json: PathBuf,
    pub txt: PathBuf,
    pub html: PathBuf,
}

/// Generate all report formats for a finished, marked scan.
///
/// The reports directory is created if missing and is always passed in
/// by the caller rather than baked in as process state.
pub fn generate_reports(
    results: &[ScanResult],
    stats: &ScanStats,
    target: &str,
    reports_dir: &Path,
) -> Result<ReportPaths, ScanError> {
    fs::create_dir_all(reports_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let base_name = format!("scan_{}", timestamp);

    let paths = ReportPaths {
        json: reports_dir.join(format!("{}.json", base_name)),
        txt: reports_dir.join(format!("{}.txt", base_name)),
        html: reports_dir.join(format!("{}.html", base_name)),
    };

    generate_json_report(results, stats, target, &paths.json)?;
    generate_txt_report(results, stats, target, &paths.txt)?;
    generate_html_report(results, stats, target, &paths.html)?;

    Ok(paths)
}

pub fn generate_json_report(
    results: &[ScanResult],
    stats: &ScanStats,
    target: &str,
    output_path: &Path,
) -> Result<(), ScanError> {
    let report = json!({
        "metadata": {
            "timestamp": Local::now().to_rfc3339(),
            "target": target,
            "total_scanned": stats.total,
        },
        "statistics": stats,
        "results": results.iter().map(|r| json!({
            "id": r.id,
            "url": r.url,
            "status": r.status,
            "body_length": r.body_len,
            "error": r.error,
            "diff_status": r.diff_status,
            "diff_length": r.diff_len,
        })).collect::<Vec<_>>(),
        "anomalies": get_anomalies(results).iter().map(|r| json!({
            "id": r.id,
            "url": r.url,
            "status": r.status,
            "body_length": r.body_len,
            "reason": anomaly_reason(r),
        })).collect::<Vec<_>>(),
    });

    let content = serde_json::to_string_pretty(&report)?;
    fs::write(output_path, content)?;
    Ok(())
}

pub fn generate_txt_report(
    results: &[ScanResult],
    stats: &ScanStats,
    target: &str,
    output_path: &Path,
) -> Result<(), ScanError> {
    let anomalies = get_anomalies(results);
    let mut file = File::create(output_path)?;

    writeln!(file, "{}", "=".repeat(70))?;
    writeln!(file, "IDOR SCAN REPORT")?;
    writeln!(file, "{}", "=".repeat(70))?;
    writeln!(file, "Timestamp: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(file, "Target: {}", target)?;
    writeln!(file)?;

    writeln!(file, "STATISTICS")?;
    writeln!(file, "{}", "-".repeat(70))?;
    writeln!(file, "Total scanned:      {}", stats.total)?;
    writeln!(file, "Successful:         {}", stats.success)?;
    writeln!(file, "Errors:             {}", stats.errors)?;
    writeln!(file, "Status changes:     {}", stats.status_changes)?;
    writeln!(file, "Length changes:     {}", stats.length_changes)?;
    writeln!(file)?;

    if !anomalies.is_empty() {
        writeln!(file, "ANOMALIES DETECTED (Potential IDOR vulnerabilities)")?;
        writeln!(file, "{}", "-".repeat(70))?;
        for anomaly in &anomalies {
            writeln!(file, "ID: {}", anomaly.id)?;
            writeln!(file, "  URL: {}", anomaly.url)?;
            writeln!(file, "  Status: {}", status_label(anomaly.status))?;
            writeln!(file, "  Body Length: {}", anomaly.body_len)?;
            writeln!(file, "  Reason: {}", anomaly_reason(anomaly))?;
            writeln!(file)?;
        }
    } else {
        writeln!(file, "NO ANOMALIES DETECTED")?;
        writeln!(file, "{}", "-".repeat(70))?;
        writeln!(file, "All responses match the baseline pattern.")?;
        writeln!(file)?;
    }

    writeln!(file, "RESPONSE PATTERNS")?;
    writeln!(file, "{}", "-".repeat(70))?;
    for ((status, length), items) in patterns_by_count(results) {
        writeln!(
            file,
            "Status {}, Length {}: {} occurrences",
            status_label(status),
            length,
            items.len()
        )?;
        let ids: Vec<String> = items.iter().take(10).map(|r| r.id.to_string()).collect();
        writeln!(file, "  IDs: {}", ids.join(", "))?;
        if items.len() > 10 {
            writeln!(file, "  ... and {} more", items.len() - 10)?;
        }
        writeln!(file)?;
    }

    writeln!(file, "{}", "=".repeat(70))?;
    writeln!(file, "END OF REPORT")?;
    writeln!(file, "{}", "=".repeat(70))?;

    Ok(())
}

pub fn generate_html_report(
    results: &[ScanResult],
    stats: &ScanStats,
    target: &str,
    output_path: &Path,
) -> Result<(), ScanError> {
    let anomalies = get_anomalies(results);
    let mut file = File::create(output_path)?;

    writeln!(file, "<!DOCTYPE html>")?;
    writeln!(file, "<html lang=\"en\">")?;
    writeln!(file, "<head>")?;
    writeln!(file, "<meta charset=\"UTF-8\">")?;
    writeln!(file, "<title>IDOR Scan Report</title>")?;
    writeln!(file, "<style>")?;
    writeln!(
        file,
        "body {{ font-family: 'Segoe UI', sans-serif; background: #f0f2f5; color: #333; padding: 20px; }}"
    )?;
    writeln!(
        file,
        ".container {{ max-width: 1200px; margin: 0 auto; background: white; border-radius: 8px; padding: 30px; box-shadow: 0 2px 12px rgba(0,0,0,0.1); }}"
    )?;
    writeln!(file, "h1 {{ color: #4a56a6; }}")?;
    writeln!(
        file,
        "h2 {{ color: #4a56a6; border-bottom: 2px solid #4a56a6; padding-bottom: 8px; }}"
    )?;
    writeln!(
        file,
        ".stats {{ display: flex; gap: 16px; flex-wrap: wrap; margin: 20px 0; }}"
    )?;
    writeln!(
        file,
        ".stat-card {{ background: #4a56a6; color: white; border-radius: 8px; padding: 20px; min-width: 140px; text-align: center; }}"
    )?;
    writeln!(file, ".stat-card h3 {{ font-size: 2em; margin: 0; }}")?;
    writeln!(
        file,
        ".alert {{ padding: 12px; border-radius: 4px; margin: 12px 0; }}"
    )?;
    writeln!(
        file,
        ".alert.danger {{ background: #f8d7da; border-left: 5px solid #dc3545; }}"
    )?;
    writeln!(
        file,
        ".alert.success {{ background: #d4edda; border-left: 5px solid #28a745; }}"
    )?;
    writeln!(
        file,
        "table {{ width: 100%; border-collapse: collapse; margin-top: 12px; }}"
    )?;
    writeln!(
        file,
        "th, td {{ padding: 8px 12px; text-align: left; border-bottom: 1px solid #ddd; }}"
    )?;
    writeln!(file, "thead {{ background: #4a56a6; color: white; }}")?;
    writeln!(
        file,
        ".pattern-box {{ background: #f8f9ff; border-left: 4px solid #4a56a6; padding: 12px; margin-bottom: 10px; }}"
    )?;
    writeln!(
        file,
        ".diff-yes {{ background: #ffc107; color: white; padding: 2px 6px; border-radius: 3px; font-weight: bold; }}"
    )?;
    writeln!(file, ".diff-no {{ color: #28a745; }}")?;
    writeln!(file, "</style>")?;
    writeln!(file, "</head>")?;
    writeln!(file, "<body>")?;
    writeln!(file, "<div class=\"container\">")?;
    writeln!(file, "<h1>IDOR Scan Report</h1>")?;
    writeln!(
        file,
        "<p>{}</p>",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(
        file,
        "<p><strong>Target:</strong> {}</p>",
        html_escape(target)
    )?;

    writeln!(file, "<h2>Scan Statistics</h2>")?;
    writeln!(file, "<div class=\"stats\">")?;
    for (value, label) in [
        (stats.total, "Total Scanned"),
        (stats.success, "Successful"),
        (stats.errors, "Errors"),
        (stats.status_changes, "Status Changes"),
        (stats.length_changes, "Length Changes"),
    ] {
        writeln!(
            file,
            "<div class=\"stat-card\"><h3>{}</h3><p>{}</p></div>",
            value, label
        )?;
    }
    writeln!(file, "</div>")?;

    writeln!(file, "<h2>Anomalies Detected</h2>")?;
    if !anomalies.is_empty() {
        writeln!(
            file,
            "<div class=\"alert danger\"><strong>Warning:</strong> {} potential IDOR vulnerabilities detected!</div>",
            anomalies.len()
        )?;
        writeln!(file, "<table>")?;
        writeln!(
            file,
            "<thead><tr><th>ID</th><th>Status</th><th>Body Length</th><th>Diff Status</th><th>Diff Length</th><th>URL</th></tr></thead>"
        )?;
        writeln!(file, "<tbody>")?;
        for anomaly in &anomalies {
            writeln!(
                file,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
                anomaly.id,
                status_label(anomaly.status),
                anomaly.body_len,
                diff_badge(anomaly.diff_status),
                diff_badge(anomaly.diff_len),
                html_escape(&anomaly.url)
            )?;
        }
        writeln!(file, "</tbody>")?;
        writeln!(file, "</table>")?;
    } else {
        writeln!(
            file,
            "<div class=\"alert success\"><strong>Good news:</strong> No anomalies detected. All responses match the baseline pattern.</div>"
        )?;
    }

    writeln!(file, "<h2>Response Patterns</h2>")?;
    for ((status, length), items) in patterns_by_count(results) {
        let mut ids: Vec<String> = items.iter().take(15).map(|r| r.id.to_string()).collect();
        if items.len() > 15 {
            ids.push(format!("... and {} more", items.len() - 15));
        }
        writeln!(
            file,
            "<div class=\"pattern-box\"><strong>Status {}, Length {}</strong><br>Occurrences: {}<br>IDs: {}</div>",
            status_label(status),
            length,
            items.len(),
            ids.join(", ")
        )?;
    }

    writeln!(file, "<h2>All Scan Results</h2>")?;
    writeln!(file, "<table>")?;
    writeln!(
        file,
        "<thead><tr><th>ID</th><th>Status</th><th>Body Length</th><th>Diff</th></tr></thead>"
    )?;
    writeln!(file, "<tbody>")?;
    for result in results {
        let diff = if result.is_anomalous() {
            "<span class=\"diff-yes\">Y</span>"
        } else {
            "<span class=\"diff-no\">N</span>"
        };
        writeln!(
            file,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            result.id,
            status_label(result.status),
            result.body_len,
            diff
        )?;
    }
    writeln!(file, "</tbody>")?;
    writeln!(file, "</table>")?;

    writeln!(
        file,
        "<p><em>This tool is for authorized security testing only.</em></p>"
    )?;
    writeln!(file, "</div>")?;
    writeln!(file, "</body>")?;
    writeln!(file, "</html>")?;

    Ok(())
}

/// Newest `scan_*.html` in the reports directory, or `None` when no
/// report exists yet. Timestamped names sort chronologically.
pub fn latest_html_report(reports_dir: &Path) -> Option<PathBuf> {
    let mut reports: Vec<PathBuf> = WalkDir::new(reports_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("scan_") && name.ends_with(".html"))
                .unwrap_or(false)
        })
        .collect();
    reports.sort();
    reports.pop()
}

/// Pattern groups sorted by descending occurrence count. Equal counts
/// keep their first-seen order.
fn patterns_by_count(results: &[ScanResult]) -> Vec<(Pattern, Vec<&ScanResult>)> {
    let mut patterns: Vec<(Pattern, Vec<&ScanResult>)> =
        group_by_pattern(results).into_iter().collect();
    patterns.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    patterns
}

fn anomaly_reason(result: &ScanResult) -> String {
    let mut reasons = Vec::new();
    if result.diff_status == Some(true) {
        reasons.push("Status code differs");
    }
    if result.diff_len == Some(true) {
        reasons.push("Body length differs");
    }
    reasons.join(" | ")
}

fn status_label(status: Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "ERROR".to_string(),
    }
}

fn diff_badge(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "<span class=\"diff-yes\">YES</span>",
        _ => "<span class=\"diff-no\">NO</span>",
    }
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_reason_both_dimensions() {
        let mut result = ScanResult::success(1, "http://t/1".to_string(), 403, 50);
        result.diff_status = Some(true);
        result.diff_len = Some(true);
        assert_eq!(
            anomaly_reason(&result),
            "Status code differs | Body length differs"
        );
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label(Some(404)), "404");
        assert_eq!(status_label(None), "ERROR");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("http://t/<id>?a=\"1\"&b=2"),
            "http://t/&lt;id&gt;?a=&quot;1&quot;&amp;b=2"
        );
    }
}

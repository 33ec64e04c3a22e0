/// Integration tests for the scan engine, driven against a minimal
/// in-process HTTP responder so completion order and failures are
/// under test control
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use idorscan::diffing::{get_anomalies, mark_anomalies};
use idorscan::engine::{run_scan, run_scan_with_cancel};
use idorscan::models::ScanConfig;

/// Maps a requested id to (status, body length, delay before responding).
type Responder = dyn Fn(u64) -> (u16, usize, u64) + Send + Sync;

/// Serve canned responses on an ephemeral port. Returns the bound
/// address and a gauge holding the highest number of simultaneously
/// open connections observed.
async fn spawn_server(responder: Arc<Responder>) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let current = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let max_handle = Arc::clone(&max_seen);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let responder = Arc::clone(&responder);
            let current = Arc::clone(&current);
            let max_seen = Arc::clone(&max_handle);
            tokio::spawn(async move {
                let active = current.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(active, Ordering::SeqCst);

                let mut buf = vec![0u8; 2048];
                let mut read_total = 0;
                loop {
                    let Ok(n) = stream.read(&mut buf[read_total..]).await else {
                        current.fetch_sub(1, Ordering::SeqCst);
                        return;
                    };
                    if n == 0 {
                        break;
                    }
                    read_total += n;
                    if buf[..read_total].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                    if read_total == buf.len() {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&buf[..read_total]);
                let id = request
                    .split_whitespace()
                    .nth(1)
                    .and_then(|path| path.rsplit('/').next())
                    .and_then(|last| last.parse::<u64>().ok())
                    .unwrap_or(0);

                let (status, body_len, delay_ms) = responder(id);
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }

                let body = "x".repeat(body_len);
                let response = format!(
                    "HTTP/1.1 {} OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
                current.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    (addr, max_seen)
}

fn config(addr: SocketAddr, id_start: u64, id_end: u64) -> ScanConfig {
    ScanConfig {
        target: format!("http://{}/items/{{id}}", addr),
        id_start,
        id_end,
        headers: IndexMap::new(),
        concurrency: 4,
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn results_cover_range_in_ascending_order() {
    // Per-id delays scramble completion order; output order must not care.
    let (addr, _) = spawn_server(Arc::new(|id| (200, 120, (id % 3) * 40))).await;

    let (results, stats) = run_scan(config(addr, 1, 8)).await.unwrap();

    let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
    assert!(results.iter().all(|r| r.status == Some(200)));
    assert!(results.iter().all(|r| r.body_len == 120));
    assert_eq!(stats.total, 8);
    assert_eq!(stats.success, 8);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn length_outlier_is_the_only_anomaly() {
    let (addr, _) = spawn_server(Arc::new(|id| {
        if id == 3 {
            (200, 340, 0)
        } else {
            (200, 120, 0)
        }
    }))
    .await;

    let (mut results, mut stats) = run_scan(config(addr, 1, 5)).await.unwrap();
    mark_anomalies(&mut results);
    stats.record_diff_counts(&results);

    let anomalies = get_anomalies(&results);
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].id, 3);
    assert_eq!(anomalies[0].diff_status, Some(false));
    assert_eq!(anomalies[0].diff_len, Some(true));
    assert_eq!(stats.status_changes, 0);
    assert_eq!(stats.length_changes, 1);
}

#[tokio::test]
async fn transport_failures_become_data_not_errors() {
    // Bind then drop to get a port that refuses connections.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (mut results, stats) = run_scan(config(addr, 1, 3)).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(stats.errors, 3);
    assert_eq!(stats.success, 0);
    for result in &results {
        assert_eq!(result.status, None);
        assert_eq!(result.body_len, 0);
        assert!(result.error.is_some());
    }

    // With no status anywhere there is no baseline and nothing to flag.
    mark_anomalies(&mut results);
    assert!(get_anomalies(&results).is_empty());
}

#[tokio::test]
async fn timed_out_id_is_excluded_from_anomalies() {
    let (addr, _) = spawn_server(Arc::new(|id| {
        if id == 7 {
            (200, 150, 1500)
        } else {
            (200, 150, 0)
        }
    }))
    .await;

    let mut cfg = config(addr, 5, 9);
    cfg.timeout_secs = 1;

    let (mut results, mut stats) = run_scan(cfg).await.unwrap();
    mark_anomalies(&mut results);
    stats.record_diff_counts(&results);

    assert_eq!(stats.total, 5);
    assert_eq!(stats.errors, 1);

    let timed_out = results.iter().find(|r| r.id == 7).unwrap();
    assert_eq!(timed_out.status, None);
    assert_eq!(timed_out.body_len, 0);
    assert!(timed_out.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(timed_out.diff_status, None);
    assert_eq!(timed_out.diff_len, None);

    assert!(get_anomalies(&results).is_empty());
}

#[tokio::test]
async fn in_flight_requests_respect_the_concurrency_bound() {
    let (addr, max_seen) = spawn_server(Arc::new(|_| (200, 10, 100))).await;

    let mut cfg = config(addr, 1, 6);
    cfg.concurrency = 2;

    let (results, _) = run_scan(cfg).await.unwrap();

    assert_eq!(results.len(), 6);
    let observed = max_seen.load(Ordering::SeqCst);
    assert!(observed <= 2, "expected at most 2 in flight, saw {}", observed);
    assert!(observed >= 2, "expected overlapping requests, saw {}", observed);
}

#[tokio::test]
async fn cancelled_scan_issues_no_requests() {
    let (addr, _) = spawn_server(Arc::new(|_| (200, 10, 0))).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let (results, stats) = run_scan_with_cancel(config(addr, 1, 100), cancel)
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(stats.total, 0);
}

// Main CLI entry point for idorscan
// Uses clap for argument parsing

use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

use idorscan::config::{load_config, parse_header};
use idorscan::diffing::{get_anomalies, mark_anomalies};
use idorscan::engine::ScanEngine;
use idorscan::models::{ScanConfig, ScanResult, ScanStats};
use idorscan::reporting::{generate_reports, latest_html_report};

fn reports_dir_arg() -> Arg {
    Arg::new("reports_dir")
        .long("reports-dir")
        .default_value("reports")
        .num_args(1)
        .help("Directory where reports are written")
}

#[tokio::main]
async fn main() {
    init_tracing();

    let matches = Command::new("idorscan")
        .version("1.0.0")
        .about("Concurrent IDOR endpoint fuzzer with baseline anomaly detection")
        .after_help("EXAMPLES:\n  idorscan scan 'http://localhost:8000/api/items/{id}' --id-range 1 100 -H 'Authorization: Bearer TOKEN'\n  idorscan scan-config scan.yaml\n  idorscan dashboard")
        .subcommand_required(true)
        .subcommand(
            Command::new("scan")
                .about("Fuzz an IDOR endpoint by substituting {id} in the URL")
                .arg(Arg::new("url")
                    .required(true)
                    .num_args(1)
                    .help("URL template containing the '{id}' placeholder"))
                .arg(Arg::new("id_range")
                    .long("id-range")
                    .required(true)
                    .num_args(2)
                    .value_names(["START", "END"])
                    .value_parser(clap::value_parser!(u64))
                    .help("Start and end of ID range (e.g., 1 100)"))
                .arg(Arg::new("header")
                    .short('H')
                    .long("header")
                    .action(ArgAction::Append)
                    .help("HTTP header (e.g., 'Authorization: Bearer TOKEN')"))
                .arg(Arg::new("concurrency")
                    .short('c')
                    .long("concurrency")
                    .default_value("5")
                    .value_parser(clap::value_parser!(usize))
                    .help("Number of concurrent requests"))
                .arg(Arg::new("timeout")
                    .long("timeout")
                    .default_value("10")
                    .value_parser(clap::value_parser!(u64))
                    .help("Per-request timeout in seconds"))
                .arg(reports_dir_arg()))
        .subcommand(
            Command::new("scan-config")
                .about("Run a scan from a YAML configuration file")
                .arg(Arg::new("config_path")
                    .required(true)
                    .num_args(1)
                    .help("Path to the YAML scan config"))
                .arg(reports_dir_arg()))
        .subcommand(
            Command::new("dashboard")
                .about("Locate the latest HTML dashboard report")
                .arg(reports_dir_arg()))
        .get_matches();

    match matches.subcommand() {
        Some(("scan", sub)) => {
            let config = config_from_args(sub).unwrap_or_else(|e| {
                eprintln!("{}", e);
                std::process::exit(2);
            });
            run_pipeline(config, &reports_dir(sub)).await;
        }
        Some(("scan-config", sub)) => {
            let path = sub
                .get_one::<String>("config_path")
                .expect("config_path is required");
            let config = load_config(Path::new(path)).unwrap_or_else(|e| {
                eprintln!("{}", e);
                std::process::exit(2);
            });
            println!("Using config: {}", path);
            println!("Target: {}", config.target);
            println!("ID range: {} -> {}", config.id_start, config.id_end);
            println!("Concurrency: {}", config.concurrency);
            run_pipeline(config, &reports_dir(sub)).await;
        }
        Some(("dashboard", sub)) => match latest_html_report(&reports_dir(sub)) {
            Some(path) => println!("Latest dashboard: {}", path.display()),
            None => println!("No HTML reports found. Run a scan first."),
        },
        _ => unreachable!("a subcommand is required"),
    }
}

fn reports_dir(sub: &ArgMatches) -> PathBuf {
    PathBuf::from(
        sub.get_one::<String>("reports_dir")
            .expect("reports_dir has a default"),
    )
}

fn config_from_args(sub: &ArgMatches) -> Result<ScanConfig, idorscan::error::ScanError> {
    let url = sub.get_one::<String>("url").expect("url is required");
    let range: Vec<u64> = sub
        .get_many::<u64>("id_range")
        .expect("id_range is required")
        .copied()
        .collect();

    let mut headers = IndexMap::new();
    if let Some(raw_headers) = sub.get_many::<String>("header") {
        for raw in raw_headers {
            let (name, value) = parse_header(raw)?;
            headers.insert(name, value);
        }
    }

    let config = ScanConfig {
        target: url.clone(),
        id_start: range[0],
        id_end: range[1],
        headers,
        concurrency: *sub
            .get_one::<usize>("concurrency")
            .expect("concurrency has a default"),
        timeout_secs: *sub
            .get_one::<u64>("timeout")
            .expect("timeout has a default"),
    };
    config.validate()?;
    Ok(config)
}

async fn run_pipeline(config: ScanConfig, reports_dir: &Path) {
    println!(
        "Scanning: {} (ID {} -> {})",
        config.target, config.id_start, config.id_end
    );

    let target = config.target.clone();
    let engine = match ScanEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    // Ctrl-C stops issuing new requests; collected results still get
    // marked and reported.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let (mut results, mut stats) = engine.run_with_cancel(cancel).await;

    mark_anomalies(&mut results);
    stats.record_diff_counts(&results);
    info!(total = stats.total, errors = stats.errors, "scan finished");

    print_results_table(&results);
    print_summary(&results, &stats);

    match generate_reports(&results, &stats, &target, reports_dir) {
        Ok(paths) => {
            println!("\nReports generated:");
            println!("  JSON: {}", paths.json.display());
            println!("  TXT:  {}", paths.txt.display());
            println!("  HTML: {}", paths.html.display());
        }
        Err(e) => {
            eprintln!("Failed to write reports: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_results_table(results: &[ScanResult]) {
    println!("{:>8}  {:>6}  {:>9}  {:>4}", "ID", "Status", "Body len", "Diff");
    for result in results {
        let status = match result.status {
            Some(code) => code.to_string(),
            None => "-".to_string(),
        };
        let diff = match (result.diff_status, result.diff_len) {
            (None, None) => "-",
            _ if result.is_anomalous() => "Y",
            _ => "N",
        };
        println!(
            "{:>8}  {:>6}  {:>9}  {:>4}",
            result.id, status, result.body_len, diff
        );
    }
}

fn print_summary(results: &[ScanResult], stats: &ScanStats) {
    let anomalies = get_anomalies(results);
    println!(
        "\nScanned {} IDs: {} successful, {} errors",
        stats.total, stats.success, stats.errors
    );
    if anomalies.is_empty() {
        println!("No anomalies detected.");
    } else {
        println!(
            "{} potential IDOR findings: {:?}",
            anomalies.len(),
            anomalies.iter().map(|r| r.id).collect::<Vec<_>>()
        );
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // RUST_LOG controls verbosity, e.g. RUST_LOG=debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

//! keyscan CLI
//!
//! Scans a key file against public block explorers and reports hits.

use clap::{Parser, Subcommand};
use keyscan::common::config::{delay_from_secs, max_file_bytes_from_mb};
use keyscan::units::format_btc;
use keyscan::{
    init_from_config, KeyscanError, ProgressCallback, ProgressEvent, ProviderKind,
    ProviderMode, ScanConfig, ScanController, ScanState, ScanSummary,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "keyscan")]
#[command(about = "Bitcoin private key balance scanner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file of private keys
    Scan {
        /// Input file, one key per line
        #[arg(short, long, env = "KEYSCAN_INPUT")]
        input: PathBuf,

        /// Output CSV (default: found_balances.txt or KEYSCAN_OUTPUT)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seconds to wait after each checked key
        #[arg(short, long)]
        delay: Option<f64>,

        /// Provider mode: auto, rotate or a provider name
        #[arg(short, long)]
        api: Option<ProviderMode>,

        /// First line to process (0-indexed)
        #[arg(short, long)]
        start: Option<usize>,

        /// Line to stop before (exclusive)
        #[arg(short, long)]
        end: Option<usize>,

        /// Output file size limit in MB before rolling over
        #[arg(long)]
        max_file_mb: Option<u64>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Debug logging
        #[arg(short, long)]
        verbose: bool,

        /// JSON log lines
        #[arg(long)]
        json_logs: bool,
    },

    /// List balance providers and modes
    Providers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            input,
            output,
            delay,
            api,
            start,
            end,
            max_file_mb,
            timeout,
            verbose,
            json_logs,
        } => {
            let mut config = ScanConfig::from_env()?;
            config.input_path = input;
            if let Some(output) = output {
                config.output_path = output;
            }
            if let Some(secs) = delay {
                config.delay = delay_from_secs(secs)?;
            }
            if let Some(mode) = api {
                config.provider_mode = mode;
            }
            if let Some(start) = start {
                config.start_line = start;
            }
            if end.is_some() {
                config.end_line = end;
            }
            if let Some(mb) = max_file_mb {
                config.max_file_size_bytes = max_file_bytes_from_mb(mb)?;
            }
            if let Some(secs) = timeout {
                config.request_timeout = Duration::from_secs(secs);
            }
            if verbose {
                config.log_level = "debug".to_string();
            }

            config.validate()?;
            init_from_config(&config, json_logs)?;

            let summary = match run_scan(config).await {
                Ok(summary) => summary,
                Err(e) => {
                    eprintln!("[{}] {}", e.error_code(), e);
                    if e.is_retryable() {
                        eprintln!("The error looks temporary; run the scan again.");
                    }
                    std::process::exit(1);
                }
            };
            print_report(&summary);

            if summary.state == ScanState::Failed {
                std::process::exit(1);
            }
        }
        Commands::Providers => print_providers(),
    }

    Ok(())
}

async fn run_scan(config: ScanConfig) -> Result<ScanSummary, KeyscanError> {
    config.print_summary();

    let progress: ProgressCallback = Arc::new(|event: &ProgressEvent| match &event.found {
        Some(found) => {
            println!();
            println!("=== BALANCE FOUND! ===");
            println!("Private Key: {}", found.private_key);
            println!("Address: {}", found.address);
            println!("Balance: {} BTC", format_btc(found.balance));
            println!("API: {}", found.provider_name);
            println!("======================");
        }
        None => println!(
            "Progress: {}/{} | found {} | {} BTC",
            event.processed,
            event.total,
            event.found_count,
            format_btc(event.total_balance)
        ),
    });

    let controller = ScanController::new(config)?.with_progress(progress);
    Ok(controller.run().await)
}

fn print_report(summary: &ScanSummary) {
    println!();
    println!("=== Scan {} ===", summary.state);
    println!("Session: {}", summary.session_id);
    println!(
        "Lines processed: {}/{}",
        summary.lines_processed, summary.total_lines
    );
    println!("Keys with balance: {}", summary.found_count());
    println!("Total balance: {} BTC", format_btc(summary.total_balance));
    if let Some(path) = &summary.output_path {
        println!("Results: {}", path.display());
    }

    if !summary.provider_usage.is_empty() {
        println!();
        println!("API usage:");
        for (provider, hits) in &summary.provider_usage {
            println!("  {}: {}", provider, hits);
        }
    }
}

fn print_providers() {
    println!("{:<14} {}", "auto", "Try every provider in order until one answers");
    println!("{:<14} {}", "rotate", "Use providers in turn, one per key");
    for kind in ProviderKind::ALL {
        println!("{:<14} {}", kind.name(), kind.description());
    }
}

// -----------------------------------------------------------------------------
// sbmark - object storage read-latency benchmark (first byte / last byte)
// -----------------------------------------------------------------------------

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use tokio::runtime::Builder as RtBuilder;
use tracing::info;

use sbmark::config::Config;
use sbmark::constants::DEFAULT_KEY_PREFIX;
use sbmark::key::KeyGenerator;
use sbmark::runner::{run_read_benchmark, PayloadReport, RunOptions};
use sbmark::size_parser::{format_bytes, parse_size};
use sbmark::storage::create_store_for_uri;

// -----------------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------------
#[derive(Parser)]
#[command(name = "sbmark", version, about = "Object storage read-latency benchmark")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the read benchmark from a YAML config
    ///
    /// Examples:
    ///   sbmark run --config read.yaml
    ///   sbmark run --config read.yaml --no-cleanup --samples 100
    Run {
        #[arg(short = 'c', long)]
        config: PathBuf,

        /// Keep provisioned objects (reused by the next run)
        #[arg(long)]
        no_cleanup: bool,

        /// Override the sample count from the config
        #[arg(long)]
        samples: Option<u64>,

        /// Disable progress bars
        #[arg(long)]
        quiet: bool,
    },
    /// Print the object keys a run on this host would use
    ///
    /// Handy for finding objects left behind after errored samples.
    ///
    /// Examples:
    ///   sbmark keys --samples 10 --size 1MiB
    ///   sbmark keys --samples 3 --size 4096 --host worker-7
    Keys {
        #[arg(long)]
        samples: u64,

        /// Payload size (e.g. 1024, 4KiB, 1MB)
        #[arg(long)]
        size: String,

        /// Host identity to derive keys for (defaults to the local host name)
        #[arg(long)]
        host: Option<String>,

        #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
        prefix: String,
    },
}

// -----------------------------------------------------------------------------
// main
// -----------------------------------------------------------------------------
fn main() -> Result<()> {
    // Credentials / endpoints for the storage backend may live in .env
    dotenv().ok();

    let cli = Cli::parse();

    // -v: info, -vv: debug, -vvv: trace; default warnings and errors only
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sbmark={}", level)));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Run { config, no_cleanup, samples, quiet } => {
            run_cmd(&config, no_cleanup, samples, !quiet)
        }
        Commands::Keys { samples, size, host, prefix } => keys_cmd(samples, &size, host, prefix),
    }
}

fn run_cmd(config_path: &Path, no_cleanup: bool, samples: Option<u64>, show_progress: bool) -> Result<()> {
    let mut cfg = Config::from_file(config_path)?;
    if no_cleanup {
        cfg.cleanup = false;
    }
    if let Some(n) = samples {
        cfg.samples = n;
    }
    cfg.validate()?;

    let client = create_store_for_uri(&cfg.target)
        .with_context(|| format!("Failed to create store for {}", cfg.target))?;
    let opts = RunOptions {
        keys: KeyGenerator::for_host(cfg.key_prefix.clone()),
        show_progress,
    };
    info!("Host identity for object keys: {}", opts.keys.host());

    let rt = RtBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let reports = rt.block_on(run_read_benchmark(&cfg, client, &opts))?;

    print_reports(&reports);
    Ok(())
}

fn keys_cmd(samples: u64, size: &str, host: Option<String>, prefix: String) -> Result<()> {
    let payload_size = parse_size(size).with_context(|| format!("Invalid size: {}", size))?;
    let keys = match host {
        Some(h) => KeyGenerator::new(h, prefix),
        None => KeyGenerator::for_host(prefix),
    };
    for sample_id in 1..=samples {
        println!("{}", keys.key(sample_id, payload_size));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Report table
// -----------------------------------------------------------------------------
fn print_reports(reports: &[PayloadReport]) {
    println!(
        "{:>12} {:>8} {:>7} | {:>10} {:>10} {:>10} | {:>10} {:>10} {:>10} | {:>10}",
        "payload", "samples", "errors",
        "ttfb p50", "ttfb p95", "ttfb p99",
        "ttlb p50", "ttlb p95", "ttlb p99",
        "MiB/s"
    );
    for r in reports {
        let fb = r.first_byte();
        let lb = r.last_byte();
        println!(
            "{:>12} {:>8} {:>7} | {:>8}µs {:>8}µs {:>8}µs | {:>8}µs {:>8}µs {:>8}µs | {:>10.2}",
            format_bytes(r.payload_size),
            r.samples,
            r.hists.errored(),
            fb.p50_us, fb.p95_us, fb.p99_us,
            lb.p50_us, lb.p95_us, lb.p99_us,
            r.throughput_mibps()
        );
    }

    let kept: Vec<&String> = reports.iter().flat_map(|r| r.errored_keys.iter()).collect();
    if !kept.is_empty() {
        println!("\nObjects kept for inspection ({}):", kept.len());
        for key in kept {
            println!("  {}", key);
        }
    }
}

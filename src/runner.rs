//! Read benchmark driver
//!
//! For every configured payload size: provision the sample objects, time one
//! read per sample with bounded concurrency, aggregate, then clean up. A
//! provisioning failure aborts the whole run; read failures are counted and the
//! affected objects are left in place.

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::context::BenchmarkContext;
use crate::key::KeyGenerator;
use crate::metrics::{LatencyHists, LatencyStats};
use crate::operation::{Operation, ReadOperation};
use crate::progress::phase_bar;
use crate::size_parser::format_bytes;
use crate::storage::StorageClient;

/// Results for one payload size
#[derive(Debug, Clone)]
pub struct PayloadReport {
    pub payload_size: u64,
    pub samples: u64,
    /// Objects written during provisioning (excludes objects reused from earlier runs)
    pub provisioned: usize,
    pub hists: LatencyHists,
    /// Wall time of the execute phase
    pub wall: Duration,
    /// Objects that saw an error and were kept in storage, sorted
    pub errored_keys: Vec<String>,
}

impl PayloadReport {
    pub fn first_byte(&self) -> LatencyStats {
        self.hists.first_byte()
    }

    pub fn last_byte(&self) -> LatencyStats {
        self.hists.last_byte()
    }

    /// MiB/s over the execute phase, counting successful samples only
    pub fn throughput_mibps(&self) -> f64 {
        let mib = self.hists.bytes() as f64 / (1024.0 * 1024.0);
        mib / self.wall.as_secs_f64().max(1e-9)
    }
}

/// Runner options that are not part of the YAML config
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub keys: KeyGenerator,
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            keys: KeyGenerator::default(),
            show_progress: false,
        }
    }
}

fn bar(opts: &RunOptions, len: u64, msg: String) -> ProgressBar {
    if opts.show_progress {
        phase_bar(len, msg)
    } else {
        ProgressBar::hidden()
    }
}

/// Run the read benchmark for every payload size in `cfg`
pub async fn run_read_benchmark(
    cfg: &Config,
    client: Arc<dyn StorageClient>,
    opts: &RunOptions,
) -> Result<Vec<PayloadReport>> {
    cfg.validate()?;

    info!(
        "Read benchmark: {} samples x {} payload sizes on {} ({}), concurrency {}",
        cfg.samples,
        cfg.payload_sizes.len(),
        cfg.target,
        client.name(),
        cfg.concurrency
    );

    let ctx = BenchmarkContext::new(client, cfg.path.clone(), cfg.samples, opts.keys.clone());
    let mut reports = Vec::with_capacity(cfg.payload_sizes.len());

    for &payload_size in &cfg.payload_sizes {
        let report = run_payload_size(cfg, &ctx, payload_size, opts).await?;
        reports.push(report);
    }

    Ok(reports)
}

async fn run_payload_size(
    cfg: &Config,
    ctx: &BenchmarkContext,
    payload_size: u64,
    opts: &RunOptions,
) -> Result<PayloadReport> {
    let size_label = format_bytes(payload_size);

    // 1. Provisioning (fail-fast, already cleaned up on error)
    let mut op = ReadOperation::new();
    let pb = bar(opts, cfg.samples, format!("provisioning {}", size_label));
    let provisioned = op.ensure_testdata(ctx, payload_size, &pb).await;
    pb.finish_and_clear();
    provisioned.with_context(|| format!("Provisioning failed for payload size {}", size_label))?;
    let provisioned = op.keys().len();

    // 2. Timed reads, one per sample, bounded by the semaphore
    let op = Arc::new(op);
    let sem = Arc::new(Semaphore::new(cfg.concurrency));
    let pb = bar(opts, cfg.samples, format!("reading {}", size_label));
    let start = Instant::now();

    let mut futs = FuturesUnordered::new();
    for sample_id in 1..=cfg.samples {
        let sem = Arc::clone(&sem);
        let op = Arc::clone(&op);
        let ctx = ctx.clone();
        let timeout = cfg.timeout;
        let handle = tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.context("semaphore closed")?;
            let latency = match timeout {
                Some(t) => op.execute_with_timeout(&ctx, sample_id, payload_size, t).await,
                None => op.execute(&ctx, sample_id, payload_size).await,
            };
            Ok::<_, anyhow::Error>(latency)
        });
        futs.push(async move { (sample_id, handle.await) });
    }

    // A failed task is one errored sample; every task is drained before cleanup
    let mut hists = LatencyHists::new();
    while let Some((sample_id, joined)) = futs.next().await {
        let outcome = joined
            .context("execute task failed")
            .and_then(|res| res);
        match outcome {
            Ok(latency) => hists.record(&latency),
            Err(e) => {
                let key = ctx.object_key(sample_id, payload_size);
                error!("Sample {} ({}) failed: {:#}", sample_id, key, e);
                op.mark_errored(&key);
                hists.record_failed();
            }
        }
        pb.inc(1);
    }
    let wall = start.elapsed();
    pb.finish_and_clear();

    // 3. Cleanup
    let mut errored_keys: Vec<String> = op.err_keys().into_iter().collect();
    errored_keys.sort();

    if cfg.cleanup {
        let pb = bar(opts, provisioned as u64, format!("cleaning {}", size_label));
        op.cleanup_testdata(ctx, &pb).await;
        pb.finish_and_clear();
    } else {
        info!("Cleanup disabled, leaving {} objects in {}", provisioned, ctx.path);
    }

    if !errored_keys.is_empty() {
        warn!(
            "{} of {} samples for {} had errors; kept for inspection: {}",
            errored_keys.len(),
            cfg.samples,
            size_label,
            errored_keys.join(", ")
        );
    }

    let report = PayloadReport {
        payload_size,
        samples: cfg.samples,
        provisioned,
        hists,
        wall,
        errored_keys,
    };

    info!(
        "{}: ok={} errors={} ttfb p50={}µs ttlb p50={}µs",
        size_label,
        report.hists.ok_count(),
        report.hists.errored(),
        report.first_byte().p50_us,
        report.last_byte().p50_us
    );

    Ok(report)
}

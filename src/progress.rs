//! Progress signalling
//!
//! Provisioning and cleanup tick a progress signal once per sample/key. The
//! interactive implementation is an `indicatif` bar; fatal-path cleanup uses
//! [`NoopProgress`] so the user-visible bar is not advanced twice.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::{PROGRESS_TEMPLATE, PROGRESS_TICK};

/// Thread-safe progress counter
pub trait Progress: Send + Sync {
    fn add(&self, n: u64);
}

impl Progress for ProgressBar {
    fn add(&self, n: u64) {
        self.inc(n);
    }
}

/// Progress signal that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl Progress for NoopProgress {
    fn add(&self, _n: u64) {}
}

/// Progress signal that only counts updates
#[derive(Debug, Default)]
pub struct CountingProgress {
    count: AtomicU64,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Progress for CountingProgress {
    fn add(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }
}

/// Create a styled progress bar for one benchmark phase
pub fn phase_bar(len: u64, msg: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_message(msg.into());
    pb.enable_steady_tick(PROGRESS_TICK);
    pb
}

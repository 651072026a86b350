// src/config.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_KEY_PREFIX, DEFAULT_PATH, DEFAULT_PAYLOAD_SIZE, DEFAULT_SAMPLES,
    MAX_PAYLOAD_SIZE,
};
use crate::size_parser::deserialize_size_list;

/// Read benchmark configuration (YAML)
///
/// ```yaml
/// target: "file:///tmp/sbmark"
/// path: bench-bucket
/// samples: 50
/// payload_sizes: [1024, "64KiB", "1MiB"]
/// concurrency: 8
/// timeout: 30s
/// ```
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Storage target URI (e.g. "file:///tmp/sbmark", "mem://")
    pub target: String,

    /// Bucket or top-level directory inside the target
    #[serde(default = "default_path")]
    pub path: String,

    /// Samples (objects) per payload size
    #[serde(default = "default_samples")]
    pub samples: u64,

    /// Payload sizes to benchmark, in order. Numbers or size strings ("4KiB", "1MB").
    #[serde(default = "default_payload_sizes", deserialize_with = "deserialize_size_list")]
    pub payload_sizes: Vec<u64>,

    /// Number of concurrent execute workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Optional per-sample deadline (e.g. "500ms", "30s")
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Prefix for every generated object key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Delete provisioned objects after each payload size (errored objects are always kept)
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

fn default_samples() -> u64 {
    DEFAULT_SAMPLES
}

fn default_payload_sizes() -> Vec<u64> {
    vec![DEFAULT_PAYLOAD_SIZE]
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_cleanup() -> bool {
    true
}

impl Config {
    /// Config with defaults for everything but the target
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            path: default_path(),
            samples: default_samples(),
            payload_sizes: default_payload_sizes(),
            concurrency: default_concurrency(),
            timeout: None,
            key_prefix: default_key_prefix(),
            cleanup: default_cleanup(),
        }
    }

    /// Load and validate a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let buf = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config =
            serde_yaml::from_slice(&buf).with_context(|| format!("parse {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            bail!("target must not be empty");
        }
        if self.path.trim_matches('/').is_empty() {
            bail!("path must not be empty");
        }
        if self.samples == 0 {
            bail!("samples must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.payload_sizes.is_empty() {
            bail!("payload_sizes must list at least one size");
        }
        if let Some(&too_big) = self.payload_sizes.iter().find(|&&s| s > MAX_PAYLOAD_SIZE) {
            bail!(
                "payload size {} exceeds the maximum of {} bytes",
                too_big,
                MAX_PAYLOAD_SIZE
            );
        }
        if let Some(t) = self.timeout {
            if t.is_zero() {
                bail!("timeout must be greater than zero");
            }
        }
        Ok(())
    }
}

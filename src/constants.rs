// src/constants.rs
//
// Central location for the tunables used throughout sbmark

use std::time::Duration;

// =============================================================================
// Run Defaults
// =============================================================================

/// Number of samples (objects) per payload size if not specified
/// User can override via config: samples
pub const DEFAULT_SAMPLES: u64 = 10;

/// Number of concurrent execute workers if not specified
/// User can override via config: concurrency
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Payload size used when the config lists none (1 KiB)
pub const DEFAULT_PAYLOAD_SIZE: u64 = 1024;

/// Largest payload a sample object may have (4 GiB)
/// Provisioning builds each body in memory
pub const MAX_PAYLOAD_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Bucket / top-level directory used when the config omits `path`
pub const DEFAULT_PATH: &str = "sbmark";

// =============================================================================
// Object Keys
// =============================================================================

/// Prefix prepended to every generated object key
/// User can override via config: key_prefix
pub const DEFAULT_KEY_PREFIX: &str = "sbmark/";

/// Number of hex characters of the SHA-256 digest kept in a key
/// 16 hex chars = 64 bits, enough to separate hosts and spread partitions
pub const KEY_HASH_HEX_LEN: usize = 16;

/// Host name used when the local host name cannot be read
pub const UNKNOWN_HOST: &str = "unknown";

// =============================================================================
// Streaming Reads
// =============================================================================

/// Chunk size for streaming reads from the file backend (256 KiB)
pub const READ_CHUNK_SIZE: usize = 256 * 1024;

// =============================================================================
// Histograms
// =============================================================================

/// Lowest discernible latency in microseconds
pub const HIST_LOW_US: u64 = 1;

/// Highest trackable latency in microseconds (1 hour)
pub const HIST_HIGH_US: u64 = 3_600_000_000;

/// Significant figures kept by the latency histograms
pub const HIST_SIGFIG: u8 = 3;

// =============================================================================
// Progress Display
// =============================================================================

/// Progress bar template shared by provisioning, execute and cleanup phases
pub const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar redraw interval
pub const PROGRESS_TICK: Duration = Duration::from_millis(100);

//! Object key generation
//!
//! Keys are a pure function of (host, prefix, sample id, payload size). Provisioning,
//! execute and cleanup all derive the key again instead of passing it around, so the
//! same inputs must always yield the same string, across phases and across runs.

use sha2::{Digest, Sha256};

use crate::constants::{DEFAULT_KEY_PREFIX, KEY_HASH_HEX_LEN, UNKNOWN_HOST};

/// Derive the object key for one sample.
///
/// Format: `{prefix}{hash}-{sample:08}-{size}`. The hash is the leading
/// [`KEY_HASH_HEX_LEN`] hex chars of SHA-256 over `host/sample/size`; it keeps
/// two hosts sharing a bucket apart and spreads keys over storage partitions.
/// The readable suffix makes the mapping injective over (sample, size).
pub fn object_key(host: &str, prefix: &str, sample_id: u64, payload_size: u64) -> String {
    let digest = Sha256::digest(format!("{}/{}/{}", host, sample_id, payload_size).as_bytes());
    let hex = format!("{:x}", digest);
    format!(
        "{}{}-{:08}-{}",
        prefix,
        &hex[..KEY_HASH_HEX_LEN],
        sample_id,
        payload_size
    )
}

/// Key generator bound to one host identity and key prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGenerator {
    host: String,
    prefix: String,
}

impl KeyGenerator {
    pub fn new(host: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            prefix: prefix.into(),
        }
    }

    /// Generator for the local host with the given prefix
    pub fn for_host(prefix: impl Into<String>) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| UNKNOWN_HOST.to_string());
        Self::new(host, prefix)
    }

    pub fn key(&self, sample_id: u64, payload_size: u64) -> String {
        object_key(&self.host, &self.prefix, sample_id, payload_size)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::for_host(DEFAULT_KEY_PREFIX)
    }
}

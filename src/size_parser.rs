//! Size string parsing utilities
//!
//! Payload sizes can be written as raw byte counts or with decimal (KB, MB, GB, TB)
//! and binary (KiB, MiB, GiB, TiB) suffixes. Suffixes are case-insensitive and the
//! short forms (k, m, Ki, Mi, ...) are accepted too.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Deserializer};

/// Parse a size string into bytes
///
/// Examples:
/// - "1024" → 1,024 bytes
/// - "4KB" → 4,000 bytes
/// - "4KiB" → 4,096 bytes
/// - "1.5MiB" → 1,572,864 bytes
pub fn parse_size(input: &str) -> Result<u64> {
    let input = input.trim();
    if input.is_empty() {
        bail!("Empty size string");
    }

    if let Ok(num) = input.parse::<u64>() {
        return Ok(num);
    }

    let split = input
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| anyhow!("Invalid size: {}", input))?;
    let (number, suffix) = input.split_at(split);
    if number.is_empty() {
        bail!("No number found in size: {}", input);
    }

    let value: f64 = number
        .parse()
        .map_err(|_| anyhow!("Invalid number in size: {}", input))?;
    let multiplier = suffix_multiplier(suffix.trim())?;

    Ok((value * multiplier as f64).round() as u64)
}

fn suffix_multiplier(suffix: &str) -> Result<u64> {
    let m = match suffix.to_ascii_uppercase().as_str() {
        "B" => 1,
        "K" | "KB" => 1_000,
        "M" | "MB" => 1_000_000,
        "G" | "GB" => 1_000_000_000,
        "T" | "TB" => 1_000_000_000_000,
        "KI" | "KIB" => 1 << 10,
        "MI" | "MIB" => 1 << 20,
        "GI" | "GIB" => 1 << 30,
        "TI" | "TIB" => 1 << 40,
        _ => bail!(
            "Unknown size suffix: {}. Supported: B, k/KB/KiB, m/MB/MiB, g/GB/GiB, t/TB/TiB",
            suffix
        ),
    };
    Ok(m)
}

/// Render a byte count with binary units, e.g. `4.00 KiB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    fn into_bytes(self) -> Result<u64> {
        match self {
            SizeValue::Bytes(n) => Ok(n),
            SizeValue::Text(s) => parse_size(&s),
        }
    }
}

/// Serde helper for a list of sizes where each entry is a number or a size string
pub fn deserialize_size_list<'de, D>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<SizeValue>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|v| v.into_bytes().map_err(serde::de::Error::custom))
        .collect()
}

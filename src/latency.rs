//! Latency record for a single timed read

use std::time::Duration;

use crate::error::ExecutionError;

/// Timings and errors for one execute call.
///
/// `first_byte` is set once a readable stream handle exists, `last_byte` once the
/// stream has been drained (possibly truncated) and closed. Both are `None` when
/// the request itself failed. A record with errors may still carry timings;
/// aggregation has to check `errors` rather than the timings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Latency {
    pub first_byte: Option<Duration>,
    pub last_byte: Option<Duration>,
    /// Body bytes drained before end-of-stream or the first read error
    pub bytes: u64,
    pub errors: Vec<ExecutionError>,
}

impl Latency {
    /// Record for a sample whose request never produced a stream
    pub fn errored(error: ExecutionError) -> Self {
        Self {
            errors: vec![error],
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_timings(&self) -> bool {
        self.first_byte.is_some() && self.last_byte.is_some()
    }

    /// Timings usable for statistics: no errors and both timings present
    pub fn valid_timings(&self) -> Option<(Duration, Duration)> {
        if !self.is_ok() {
            return None;
        }
        self.first_byte.zip(self.last_byte)
    }
}

//! Cumulative-to-delta conversion.
//!
//! The sampler holds the only copy of the previous cumulative reading. Two
//! consecutive readings always map to the same delta:
//!
//! | previous | current vs previous          | delta                  |
//! |----------|------------------------------|------------------------|
//! | none     | -                            | 0 (baseline)           |
//! | some     | both counters grew or held   | current - previous     |
//! | some     | either counter went down     | current (reset)        |
//!
//! On a reset the usage is assumed to restart from zero, which undercounts the
//! reset interval rather than ever reporting a negative delta.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collector::{CollectError, CounterReader, Counters};
use crate::storage::Record;
use crate::util::align_floor;

/// Delta between two cumulative readings, applying the baseline and reset rules.
pub fn compute_delta(previous: Option<Counters>, current: Counters) -> Counters {
    let Some(previous) = previous else {
        return Counters::default();
    };

    let received = current.received.saturating_sub(previous.received);
    let sent = current.sent.saturating_sub(previous.sent);

    if received < 0 || sent < 0 {
        return current;
    }

    Counters { received, sent }
}

/// Produces one delta record per call from a [`CounterReader`].
pub struct IntervalSampler<R: CounterReader> {
    reader: R,
    previous: Option<Counters>,
}

impl<R: CounterReader> IntervalSampler<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            previous: None,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Last cumulative reading, if any.
    pub fn baseline(&self) -> Option<Counters> {
        self.previous
    }

    /// Replaces the previous reading (used after gap reconciliation).
    pub fn set_baseline(&mut self, counters: Counters) {
        self.previous = Some(counters);
    }

    /// Reads the counters and returns the record for the interval containing `now`.
    pub fn sample(
        &mut self,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> Result<Record, CollectError> {
        let current = self.reader.read_counters()?;
        Ok(self.observe(align_floor(now, interval), current))
    }

    /// Turns an already-read cumulative value into a record and advances the baseline.
    pub fn observe(&mut self, time: DateTime<Utc>, current: Counters) -> Record {
        let delta = compute_delta(self.previous, current);

        if let Some(previous) = self.previous
            && (current.received < previous.received || current.sent < previous.sent)
        {
            debug!(
                prev_received = previous.received,
                prev_sent = previous.sent,
                received = current.received,
                sent = current.sent,
                "counter reset detected, re-baselining"
            );
        }

        self.previous = Some(current);

        Record {
            time,
            bytes_received: delta.received,
            bytes_sent: delta.sent,
            cumulative_bytes_received: current.received,
            cumulative_bytes_sent: current.sent,
        }
    }
}

//! Startup backfill for intervals missed while the collector was not running.
//!
//! The stored history ends at some record `last`; the first live sample after
//! startup is `current`. Every whole interval between them gets one synthetic
//! record, and the cumulative growth is spread evenly across them:
//!
//! ```text
//!   last (T, 1000)                                   current (T+3, 4000)
//!      │                                                   │
//!      ├──────────────┬──────────────┬─────────────────────┤
//!                T+1 (+1000, 2000)  T+2 (+1000, 3000)  T+3 (+1000, 4000)
//! ```
//!
//! Actual usage during the outage is unknown; a flat spread keeps range totals
//! right without drawing a spike or a hole.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collector::Counters;
use crate::storage::Record;
use crate::util::{align_floor, interval_secs};

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Records to append, oldest first.
    pub synthetic: Vec<Record>,
    /// Cumulative reading the sampler should diff the next live sample against.
    pub baseline: Counters,
    /// Whole intervals between the reference record and the live sample.
    pub intervals: i64,
    /// The record the gap was measured from.
    pub from: Record,
}

/// Computes the backfill for one startup.
///
/// * `stored` - persisted history, time ordered
/// * `last_start` - estimated boot instant of the current host session
/// * `current` - first live sample of this process
/// * `cutoff` - retention cutoff; synthetic records before it are not emitted
pub fn reconcile(
    stored: &[Record],
    last_start: DateTime<Utc>,
    current: &Record,
    interval: Duration,
    cutoff: DateTime<Utc>,
) -> Reconciliation {
    let secs = interval_secs(interval);

    // History from before the current boot is not contiguous with the live
    // counters; start over from zero at the session start.
    let mut last = match stored.last() {
        Some(record) if record.time >= last_start => *record,
        Some(record) => {
            debug!(
                last = %record.time,
                session_start = %last_start,
                "stored history predates this boot"
            );
            Record::zero(align_floor(last_start, interval))
        }
        None => Record::zero(align_floor(last_start, interval)),
    };

    if current.cumulative_bytes_received < last.cumulative_bytes_received
        || current.cumulative_bytes_sent < last.cumulative_bytes_sent
    {
        debug!(
            last_received = last.cumulative_bytes_received,
            last_sent = last.cumulative_bytes_sent,
            received = current.cumulative_bytes_received,
            sent = current.cumulative_bytes_sent,
            "counters reset while stopped"
        );
        last = Record::zero(last.time);
    }

    let elapsed = (current.time - last.time).num_seconds();
    let intervals = elapsed.div_euclid(secs);

    if intervals <= 0 {
        return Reconciliation {
            synthetic: Vec::new(),
            baseline: last.cumulative(),
            intervals: 0,
            from: last,
        };
    }

    let n = i128::from(intervals);
    let growth_received =
        i128::from(current.cumulative_bytes_received) - i128::from(last.cumulative_bytes_received);
    let growth_sent =
        i128::from(current.cumulative_bytes_sent) - i128::from(last.cumulative_bytes_sent);

    // Running share of the growth after k intervals; differences of consecutive
    // shares sum exactly to the growth.
    let share = |growth: i128, k: i64| growth * i128::from(k) / n;
    let narrow = |value: i128| i64::try_from(value).unwrap_or(i64::MAX);

    // Skip straight past intervals that retention would drop anyway.
    let first_k = if cutoff > last.time {
        let behind = (cutoff - last.time).num_seconds();
        (behind + secs - 1).div_euclid(secs).max(1)
    } else {
        1
    };

    let mut synthetic = Vec::new();
    for k in first_k..=intervals {
        let time = last.time + chrono::Duration::seconds(secs.saturating_mul(k));
        let received = share(growth_received, k);
        let sent = share(growth_sent, k);

        synthetic.push(Record {
            time,
            bytes_received: narrow(received - share(growth_received, k - 1)),
            bytes_sent: narrow(sent - share(growth_sent, k - 1)),
            cumulative_bytes_received: narrow(
                i128::from(last.cumulative_bytes_received) + received,
            ),
            cumulative_bytes_sent: narrow(i128::from(last.cumulative_bytes_sent) + sent),
        });
    }

    // After the last interval the running share equals the full growth.
    let baseline = Counters::new(
        current.cumulative_bytes_received,
        current.cumulative_bytes_sent,
    );

    debug!(
        from = %last.time,
        to = %current.time,
        intervals,
        emitted = synthetic.len(),
        "gap reconciled"
    );

    Reconciliation {
        synthetic,
        baseline,
        intervals,
        from: last,
    }
}

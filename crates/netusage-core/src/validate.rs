//! Consistency checks over a loaded record sequence.
//!
//! Findings are advisory: they are logged and never change the data.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::storage::Record;

/// How many findings are logged one by one before switching to a summary.
const MAX_REPORTED_FINDINGS: usize = 10;

/// A single integrity problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Two or more records share a time.
    DuplicateTime { time: DateTime<Utc>, count: usize },
    /// A record carries a negative delta.
    NegativeDelta {
        time: DateTime<Utc>,
        received: i64,
        sent: i64,
    },
    /// Cumulative growth between adjacent records does not match the deltas of
    /// the later record.
    CumulativeMismatch {
        previous: DateTime<Utc>,
        time: DateTime<Utc>,
        expected_received: i64,
        expected_sent: i64,
        received: i64,
        sent: i64,
    },
}

impl Finding {
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Finding::DuplicateTime { time, .. }
            | Finding::NegativeDelta { time, .. }
            | Finding::CumulativeMismatch { time, .. } => *time,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::DuplicateTime { time, count } => {
                write!(f, "{count} records share time {time}")
            }
            Finding::NegativeDelta {
                time,
                received,
                sent,
            } => write!(
                f,
                "negative delta at {time}: received {received}, sent {sent}"
            ),
            Finding::CumulativeMismatch {
                previous,
                time,
                expected_received,
                expected_sent,
                received,
                sent,
            } => write!(
                f,
                "cumulative mismatch {previous} -> {time}: expected +{expected_received}/+{expected_sent}, recorded +{received}/+{sent}"
            ),
        }
    }
}

/// Checks `records` for duplicates, negative deltas and cumulative drift.
///
/// The input is examined in time order (stable, so file order breaks ties).
/// An adjacent pair where both cumulative counters went down is read as an
/// unflagged counter reset and not reported.
pub fn validate(records: &[Record]) -> Vec<Finding> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by_key(|r| r.time);

    let mut findings = Vec::new();

    for record in &sorted {
        if record.bytes_received < 0 || record.bytes_sent < 0 {
            findings.push(Finding::NegativeDelta {
                time: record.time,
                received: record.bytes_received,
                sent: record.bytes_sent,
            });
        }
    }

    for group in sorted.chunk_by(|a, b| a.time == b.time) {
        if group.len() > 1 {
            findings.push(Finding::DuplicateTime {
                time: group[0].time,
                count: group.len(),
            });
        }
    }

    for pair in sorted.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if prev.time == curr.time {
            continue;
        }

        let diff_received = curr
            .cumulative_bytes_received
            .saturating_sub(prev.cumulative_bytes_received);
        let diff_sent = curr
            .cumulative_bytes_sent
            .saturating_sub(prev.cumulative_bytes_sent);

        if diff_received < 0 && diff_sent < 0 {
            continue;
        }

        if diff_received != curr.bytes_received || diff_sent != curr.bytes_sent {
            findings.push(Finding::CumulativeMismatch {
                previous: prev.time,
                time: curr.time,
                expected_received: diff_received,
                expected_sent: diff_sent,
                received: curr.bytes_received,
                sent: curr.bytes_sent,
            });
        }
    }

    findings.sort_by_key(Finding::time);
    findings
}

/// Logs findings at `warn`, the first few individually.
pub fn report(findings: &[Finding]) {
    for finding in findings.iter().take(MAX_REPORTED_FINDINGS) {
        warn!(%finding, "usage log inconsistency");
    }
    if findings.len() > MAX_REPORTED_FINDINGS {
        warn!(
            total = findings.len(),
            "usage log has more inconsistencies than shown"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 7, 17, minute, 0).unwrap()
    }

    fn rec(minute: u32, delta: (i64, i64), cumulative: (i64, i64)) -> Record {
        Record {
            time: at(minute),
            bytes_received: delta.0,
            bytes_sent: delta.1,
            cumulative_bytes_received: cumulative.0,
            cumulative_bytes_sent: cumulative.1,
        }
    }

    #[test]
    fn test_consistent_sequence_has_no_findings() {
        let records = vec![
            rec(0, (0, 0), (1000, 500)),
            rec(1, (100, 50), (1100, 550)),
            rec(2, (0, 0), (1100, 550)),
            rec(3, (900, 10), (2000, 560)),
        ];
        assert!(validate(&records).is_empty());
    }

    #[test]
    fn test_flagged_reset_is_consistent_when_both_went_down() {
        // Reset record carries its own cumulative values as deltas; both
        // counters dropped so the pair is not compared.
        let records = vec![rec(0, (0, 0), (5000, 5000)), rec(1, (300, 200), (300, 200))];
        assert!(validate(&records).is_empty());
    }

    #[test]
    fn test_single_counter_reset_is_reported() {
        let records = vec![rec(0, (0, 0), (5000, 100)), rec(1, (300, 200), (300, 300))];
        let findings = validate(&records);
        assert_eq!(findings.len(), 1);
        assert!(matches!(
            findings[0],
            Finding::CumulativeMismatch {
                expected_received: -4700,
                expected_sent: 200,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_delta() {
        let records = vec![rec(0, (0, 0), (100, 100)), rec(1, (-5, 0), (95, 100))];
        let findings = validate(&records);
        assert!(findings.contains(&Finding::NegativeDelta {
            time: at(1),
            received: -5,
            sent: 0,
        }));
    }

    #[test]
    fn test_duplicate_time() {
        let records = vec![
            rec(0, (0, 0), (100, 100)),
            rec(1, (10, 0), (110, 100)),
            rec(1, (12, 0), (112, 100)),
        ];
        let findings = validate(&records);
        assert_eq!(
            findings,
            vec![Finding::DuplicateTime {
                time: at(1),
                count: 2
            }]
        );
    }

    #[test]
    fn test_unsorted_input_is_checked_in_time_order() {
        let records = vec![rec(1, (100, 0), (200, 0)), rec(0, (0, 0), (100, 0))];
        assert!(validate(&records).is_empty());
    }

    #[test]
    fn test_display() {
        let finding = Finding::DuplicateTime {
            time: at(1),
            count: 3,
        };
        assert_eq!(
            finding.to_string(),
            "3 records share time 2026-02-07 17:01:00 UTC"
        );
    }
}

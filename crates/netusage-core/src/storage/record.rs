//! The per-interval usage record and its one-line JSON encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::Counters;

/// Network usage for the interval ending at `time`.
///
/// Counters are signed so that lines written by older or foreign tools with
/// negative values still load and can be reported by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Interval boundary, floor-aligned to the polling interval.
    pub time: DateTime<Utc>,
    pub bytes_received: i64,
    pub bytes_sent: i64,
    /// Raw counter value observed at `time`.
    pub cumulative_bytes_received: i64,
    pub cumulative_bytes_sent: i64,
}

impl Record {
    /// A record with zero deltas and zero cumulative values.
    pub fn zero(time: DateTime<Utc>) -> Self {
        Self {
            time,
            bytes_received: 0,
            bytes_sent: 0,
            cumulative_bytes_received: 0,
            cumulative_bytes_sent: 0,
        }
    }

    pub fn bytes_total(&self) -> i64 {
        self.bytes_received.saturating_add(self.bytes_sent)
    }

    pub fn cumulative(&self) -> Counters {
        Counters::new(self.cumulative_bytes_received, self.cumulative_bytes_sent)
    }

    /// Encodes the record as a single log line (without trailing newline).
    pub fn encode(&self) -> String {
        // Serializing plain integers and a timestamp cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses one log line.
    pub fn parse(line: &str) -> Result<Self, RecordParseError> {
        serde_json::from_str(line.trim()).map_err(|e| RecordParseError {
            message: e.to_string(),
        })
    }
}

/// A log line that is not a valid record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordParseError {
    pub message: String,
}

impl std::fmt::Display for RecordParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid record: {}", self.message)
    }
}

impl std::error::Error for RecordParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Record {
        Record {
            time: Utc.with_ymd_and_hms(2026, 2, 7, 17, 3, 0).unwrap(),
            bytes_received: 1500,
            bytes_sent: 300,
            cumulative_bytes_received: 98_765_432_100,
            cumulative_bytes_sent: 12_345_678,
        }
    }

    #[test]
    fn test_encode_format() {
        let line = sample().encode();
        assert_eq!(
            line,
            r#"{"time":"2026-02-07T17:03:00Z","bytesReceived":1500,"bytesSent":300,"cumulativeBytesReceived":98765432100,"cumulativeBytesSent":12345678}"#
        );
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_round_trip() {
        let record = sample();
        assert_eq!(Record::parse(&record.encode()).unwrap(), record);

        let zero = Record::zero(record.time);
        assert_eq!(Record::parse(&zero.encode()).unwrap(), zero);

        let extremes = Record {
            bytes_received: i64::MAX,
            cumulative_bytes_sent: i64::MAX,
            ..zero
        };
        assert_eq!(Record::parse(&extremes.encode()).unwrap(), extremes);
    }

    #[test]
    fn test_parse_accepts_offset_timestamps() {
        let line = r#"{"time":"2026-02-07T19:03:00+02:00","bytesReceived":1,"bytesSent":2,"cumulativeBytesReceived":3,"cumulativeBytesSent":4}"#;
        let record = Record::parse(line).unwrap();
        assert_eq!(record.time, Utc.with_ymd_and_hms(2026, 2, 7, 17, 3, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Record::parse("").is_err());
        assert!(Record::parse("not json").is_err());
        assert!(Record::parse(r#"{"time":"2026-02-07T17:03:00Z","bytesRec"#).is_err());
        let bad_time = r#"{"time":"yesterday","bytesReceived":1,"bytesSent":2,"cumulativeBytesReceived":3,"cumulativeBytesSent":4}"#;
        assert!(Record::parse(bad_time).is_err());
        // Missing field
        assert!(Record::parse(r#"{"time":"2026-02-07T17:03:00Z","bytesReceived":1}"#).is_err());
    }

    #[test]
    fn test_bytes_total() {
        assert_eq!(sample().bytes_total(), 1800);
    }
}

//! Range queries over the record history.
//!
//! A query never touches the input slice; it yields re-aggregated copies. Bucket
//! boundaries follow the local wall clock of the time zone `now` is given in,
//! so day buckets start at local midnight.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use netusage_core::query::{query, Range};
//! use netusage_core::storage::Record;
//!
//! let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
//! let records: Vec<Record> = (0..3)
//!     .map(|h| Record {
//!         bytes_received: 100,
//!         ..Record::zero(now - chrono::Duration::hours(h))
//!     })
//!     .rev()
//!     .collect();
//!
//! assert_eq!(query(&records, Range::Hours24, &now).count(), 3);
//! ```

mod range;
mod unit;

pub use range::{Range, UnknownName};
pub use unit::Unit;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::storage::Record;
use crate::util::interval_secs;
use crate::util::time::local_seconds;

/// Lazy iterator of bucketed records produced by [`query`].
///
/// Cloning restarts nothing; it forks the iteration at the current position.
#[derive(Debug, Clone)]
pub struct Buckets<'a, Tz: TimeZone> {
    records: &'a [Record],
    pos: usize,
    cutoff: Option<DateTime<Utc>>,
    bucket_secs: i64,
    tz: Tz,
}

impl<Tz: TimeZone> Buckets<'_, Tz> {
    fn in_range(&self, record: &Record) -> bool {
        self.cutoff.is_none_or(|cutoff| record.time >= cutoff)
    }

    fn key(&self, record: &Record) -> i64 {
        local_seconds(record.time, &self.tz).div_euclid(self.bucket_secs)
    }
}

impl<Tz: TimeZone> Iterator for Buckets<'_, Tz> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let mut acc = loop {
            let record = self.records.get(self.pos)?;
            self.pos += 1;
            if self.in_range(record) {
                break *record;
            }
        };
        let key = self.key(&acc);

        while let Some(record) = self.records.get(self.pos) {
            if !self.in_range(record) {
                self.pos += 1;
                continue;
            }
            if self.key(record) != key {
                break;
            }
            acc.bytes_received = acc.bytes_received.saturating_add(record.bytes_received);
            acc.bytes_sent = acc.bytes_sent.saturating_add(record.bytes_sent);
            acc.cumulative_bytes_received = record.cumulative_bytes_received;
            acc.cumulative_bytes_sent = record.cumulative_bytes_sent;
            self.pos += 1;
        }

        Some(acc)
    }
}

/// Buckets the records of `range` as seen at `now`.
///
/// Consecutive records falling into the same bucket collapse into one record
/// carrying the first record's time, the summed deltas and the last record's
/// cumulative values. `records` is expected in time order.
pub fn query<'a, Tz: TimeZone>(
    records: &'a [Record],
    range: Range,
    now: &DateTime<Tz>,
) -> Buckets<'a, Tz> {
    Buckets {
        records,
        pos: 0,
        cutoff: range.cutoff(now),
        bucket_secs: interval_secs(range.bucket()),
        tz: now.timezone(),
    }
}

/// Total traffic inside a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub received: i64,
    pub sent: i64,
}

impl Usage {
    pub fn total(&self) -> i64 {
        self.received.saturating_add(self.sent)
    }
}

/// Sums the deltas of every record inside `range`.
pub fn total<Tz: TimeZone>(records: &[Record], range: Range, now: &DateTime<Tz>) -> Usage {
    let cutoff = range.cutoff(now);
    records
        .iter()
        .filter(|r| cutoff.is_none_or(|c| r.time >= c))
        .fold(Usage::default(), |acc, r| Usage {
            received: acc.received.saturating_add(r.bytes_received),
            sent: acc.sent.saturating_add(r.bytes_sent),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, m, 0).unwrap()
    }

    fn rec(time: DateTime<Utc>, received: i64, sent: i64, cumulative: i64) -> Record {
        Record {
            time,
            bytes_received: received,
            bytes_sent: sent,
            cumulative_bytes_received: cumulative,
            cumulative_bytes_sent: cumulative,
        }
    }

    #[test]
    fn test_hourly_records_keep_their_buckets() {
        let now = utc(19, 12, 0);
        let records = vec![
            rec(utc(19, 9, 0), 100, 0, 100),
            rec(utc(19, 10, 0), 200, 0, 300),
            rec(utc(19, 11, 0), 300, 0, 600),
        ];

        let buckets: Vec<Record> = query(&records, Range::Hours24, &now).collect();
        assert_eq!(buckets.len(), 3);
        let received: Vec<_> = buckets.iter().map(|r| r.bytes_received).collect();
        assert_eq!(received, vec![100, 200, 300]);
    }

    #[test]
    fn test_minutes_collapse_into_hour_bucket() {
        let now = utc(19, 12, 0);
        let records = vec![
            rec(utc(19, 10, 58), 1, 10, 1),
            rec(utc(19, 10, 59), 2, 20, 3),
            rec(utc(19, 11, 0), 3, 30, 6),
            rec(utc(19, 11, 1), 4, 40, 10),
            rec(utc(19, 11, 2), 5, 50, 15),
        ];

        let buckets: Vec<Record> = query(&records, Range::Day, &now).collect();
        assert_eq!(
            buckets,
            vec![rec(utc(19, 10, 58), 3, 30, 3), rec(utc(19, 11, 0), 12, 120, 15)]
        );
    }

    #[test]
    fn test_cutoff_filters_and_input_is_untouched() {
        let now = utc(19, 12, 0);
        let records = vec![
            rec(utc(19, 10, 59), 7, 7, 7),
            rec(utc(19, 11, 0), 1, 1, 8),
            rec(utc(19, 11, 30), 1, 1, 9),
        ];
        let before = records.clone();

        let buckets: Vec<Record> = query(&records, Range::Hour, &now).collect();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].time, utc(19, 11, 0));
        assert_eq!(records, before);
    }

    #[test]
    fn test_day_buckets_follow_local_midnight() {
        let records = vec![
            rec(utc(17, 21, 30), 10, 0, 10),
            rec(utc(17, 22, 30), 20, 0, 30),
        ];

        let now_utc = utc(19, 12, 0);
        assert_eq!(query(&records, Range::Days30, &now_utc).count(), 1);

        // 22:30Z is already the next day at +02:00
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now_local = now_utc.with_timezone(&tz);
        let buckets: Vec<Record> = query(&records, Range::Days30, &now_local).collect();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].bytes_received, 20);
    }

    #[test]
    fn test_buckets_clone_forks_iteration() {
        let now = utc(19, 12, 0);
        let records = vec![
            rec(utc(19, 9, 0), 1, 0, 1),
            rec(utc(19, 10, 0), 2, 0, 3),
            rec(utc(19, 11, 0), 3, 0, 6),
        ];

        let mut buckets = query(&records, Range::Hours24, &now);
        let fresh = buckets.clone();
        buckets.next();
        assert_eq!(buckets.clone().count(), 2);
        assert_eq!(fresh.count(), 3);
    }

    #[test]
    fn test_empty_and_out_of_range() {
        let now = utc(19, 12, 0);
        assert_eq!(query(&[], Range::All, &now).count(), 0);

        let old = vec![rec(utc(1, 0, 0), 5, 5, 5)];
        assert_eq!(query(&old, Range::Days7, &now).count(), 0);
        assert_eq!(query(&old, Range::All, &now).count(), 1);
    }

    #[test]
    fn test_totals_per_range() {
        let now = utc(19, 12, 0);
        let records = vec![
            rec(utc(1, 12, 0), 1000, 100, 0),
            rec(utc(15, 12, 0), 200, 20, 0),
            rec(utc(19, 11, 30), 30, 3, 0),
        ];

        assert_eq!(
            total(&records, Range::Hour, &now),
            Usage {
                received: 30,
                sent: 3
            }
        );
        assert_eq!(total(&records, Range::Days7, &now).total(), 253);
        assert_eq!(total(&records, Range::Month, &now).received, 1230);
        assert_eq!(total(&records, Range::All, &now).sent, 123);
    }
}

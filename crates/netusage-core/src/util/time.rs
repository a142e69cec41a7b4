//! Interval alignment and calendar boundaries.
//!
//! Interval alignment works on UTC epoch seconds. Calendar boundaries (start of
//! day, week, month) are computed on the local wall clock of the time zone the
//! caller's `now` is expressed in, then converted back to UTC.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

/// Interval length in whole seconds, never less than one.
pub fn interval_secs(interval: Duration) -> i64 {
    i64::try_from(interval.as_secs()).unwrap_or(i64::MAX).max(1)
}

/// Floors `time` to the start of its interval.
pub fn align_floor(time: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let secs = interval_secs(interval);
    let aligned = time.timestamp().div_euclid(secs) * secs;
    DateTime::from_timestamp(aligned, 0).unwrap_or(time)
}

/// First interval boundary strictly after `time`.
pub fn next_boundary(time: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    align_floor(time, interval) + chrono::Duration::seconds(interval_secs(interval))
}

/// Seconds since the epoch as read on the local wall clock of `tz`.
///
/// Used as the bucketing key so that day buckets start at local midnight.
pub fn local_seconds<Tz: TimeZone>(time: DateTime<Utc>, tz: &Tz) -> i64 {
    time.with_timezone(tz).naive_local().and_utc().timestamp()
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive).earliest() {
        Some(t) => t.with_timezone(&Utc),
        // Wall-clock time skipped by a DST jump; read it as UTC instead.
        None => tz.from_utc_datetime(&naive).with_timezone(&Utc),
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

/// Start of the wall-clock hour containing `now`.
pub fn start_of_hour<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let local = now.naive_local();
    let naive = local
        .date()
        .and_hms_opt(local.hour(), 0, 0)
        .unwrap_or(local);
    resolve_local(&now.timezone(), naive)
}

/// Local midnight of the day containing `now`.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    resolve_local(&now.timezone(), midnight(now.naive_local().date()))
}

/// Local midnight of the Monday starting the week containing `now`.
pub fn start_of_week<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let date = now.naive_local().date();
    let days_from_monday = i64::from(date.weekday().num_days_from_monday());
    let monday = date - chrono::Duration::days(days_from_monday);
    resolve_local(&now.timezone(), midnight(monday))
}

/// Local midnight of the first day of the month containing `now`.
pub fn start_of_month<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let date = now.naive_local().date();
    let first = date.with_day(1).unwrap_or(date);
    resolve_local(&now.timezone(), midnight(first))
}

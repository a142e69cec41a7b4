//! Shared formatting helpers for the daemon logs and the viewer.
//!
//! Functions that differ between compact table columns and verbose output are
//! parameterized via [`FmtStyle`].

use chrono::{DateTime, TimeZone, Utc};

use crate::query::Unit;

/// Controls compact (table columns) vs verbose (log lines) output.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FmtStyle {
    /// Compact: no spaces ("1.5G", "3m5s")
    Compact,
    /// Detail: spaces and unit names ("1.5 GB", "3m 5s")
    Detail,
}

/// Format byte count as human-readable size.
///
/// Compact: `"1.5G"`, `"100.3M"`, `"50.0K"`, `"512B"`
/// Detail:  `"1.5 GB"`, `"100.3 MB"`, `"50.0 KB"`, `"512 B"`
pub fn format_bytes(bytes: i64, style: FmtStyle) -> String {
    let unit = Unit::fit(bytes);
    match (style, unit) {
        (FmtStyle::Compact, Unit::B) => format!("{}B", bytes),
        (FmtStyle::Compact, _) => {
            let suffix = unit.as_str().trim_end_matches('B');
            format!("{:.1}{}", unit.scale(bytes), suffix)
        }
        (FmtStyle::Detail, _) => unit.format(bytes),
    }
}

/// Format duration in seconds as human-readable.
///
/// Compact: `"3m5s"` (no spaces)
/// Detail:  `"3m 5s"` (with spaces)
pub fn format_duration(secs: i64, style: FmtStyle) -> String {
    let sep = match style {
        FmtStyle::Compact => "",
        FmtStyle::Detail => " ",
    };
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}{}s", secs / 60, sep, secs % 60)
    } else if secs < 86400 {
        format!("{}h{}{}m", secs / 3600, sep, (secs % 3600) / 60)
    } else {
        format!("{}d{}{}h", secs / 86400, sep, (secs % 86400) / 3600)
    }
}

/// Bucket label on the local clock of `tz`: `"2026-10-19 14:00"` or just the date.
pub fn format_bucket_time<Tz: TimeZone>(time: DateTime<Utc>, tz: &Tz, time_of_day: bool) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local = time.with_timezone(tz);
    if time_of_day {
        local.format("%Y-%m-%d %H:%M").to_string()
    } else {
        local.format("%Y-%m-%d").to_string()
    }
}

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::util::time::{start_of_day, start_of_month, start_of_week};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Named time window for viewing usage.
///
/// Calendar ranges (`Day`, `Week`, `Month`) start at a local wall-clock
/// boundary; rolling ranges (`Hours24`, `Days7`, `Days30`) reach back a fixed
/// duration from now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Range {
    Hour,
    Day,
    Hours24,
    Week,
    Days7,
    Month,
    Days30,
    All,
}

impl Range {
    pub const ALL: [Range; 8] = [
        Range::Hour,
        Range::Day,
        Range::Hours24,
        Range::Week,
        Range::Days7,
        Range::Month,
        Range::Days30,
        Range::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Range::Hour => "Last hour",
            Range::Day => "Today",
            Range::Hours24 => "Last 24 hours",
            Range::Week => "This week",
            Range::Days7 => "Last 7 days",
            Range::Month => "This month",
            Range::Days30 => "Last 30 days",
            Range::All => "All time",
        }
    }

    /// Short name accepted on the command line.
    pub fn code(self) -> &'static str {
        match self {
            Range::Hour => "1h",
            Range::Day => "1d",
            Range::Hours24 => "24h",
            Range::Week => "1w",
            Range::Days7 => "7d",
            Range::Month => "1M",
            Range::Days30 => "30d",
            Range::All => "all",
        }
    }

    /// Width of one aggregation bucket.
    pub fn bucket(self) -> Duration {
        match self {
            Range::Hour => MINUTE,
            Range::Day | Range::Hours24 | Range::Week | Range::Days7 => HOUR,
            Range::Month | Range::Days30 | Range::All => DAY,
        }
    }

    /// Earliest record time included, or `None` for no lower bound.
    pub fn cutoff<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        let utc = now.with_timezone(&Utc);
        match self {
            Range::Hour => Some(utc - chrono::Duration::hours(1)),
            Range::Day => Some(start_of_day(now)),
            Range::Hours24 => Some(utc - chrono::Duration::hours(24)),
            Range::Week => Some(start_of_week(now)),
            Range::Days7 => Some(utc - chrono::Duration::days(7)),
            Range::Month => Some(start_of_month(now)),
            Range::Days30 => Some(utc - chrono::Duration::days(30)),
            Range::All => None,
        }
    }

    /// Whether bucket labels need the time of day, not just the date.
    pub fn shows_time_of_day(self) -> bool {
        matches!(self, Range::Hour | Range::Day | Range::Hours24)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Range {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Range::ALL
            .into_iter()
            .find(|r| r.code() == s)
            .ok_or_else(|| UnknownName::new("range", s))
    }
}

/// A range or unit name that does not match any variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName {
    pub kind: &'static str,
    pub input: String,
}

impl UnknownName {
    pub(crate) fn new(kind: &'static str, input: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }
}

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.input)
    }
}

impl std::error::Error for UnknownName {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_codes_round_trip() {
        for range in Range::ALL {
            assert_eq!(range.to_string().parse::<Range>(), Ok(range));
        }
        // "1M" is month, "1m" is nothing
        assert!("1m".parse::<Range>().is_err());
        assert_eq!(
            "2h".parse::<Range>().unwrap_err().to_string(),
            "unknown range '2h'"
        );
    }

    #[test]
    fn test_rolling_cutoffs() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 30, 0).unwrap();
        assert_eq!(
            Range::Hour.cutoff(&now),
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 11, 30, 0).unwrap())
        );
        assert_eq!(
            Range::Days7.cutoff(&now),
            Some(Utc.with_ymd_and_hms(2026, 10, 12, 12, 30, 0).unwrap())
        );
        assert_eq!(Range::All.cutoff(&now), None);
    }

    #[test]
    fn test_calendar_cutoffs_use_local_clock() {
        // 2026-10-19 is a Monday; 00:30 local is still Sunday in UTC.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 10, 19, 0, 30, 0).unwrap();

        let midnight = Utc.with_ymd_and_hms(2026, 10, 18, 22, 0, 0).unwrap();
        assert_eq!(Range::Day.cutoff(&now), Some(midnight));
        assert_eq!(Range::Week.cutoff(&now), Some(midnight));
        assert_eq!(
            Range::Month.cutoff(&now),
            Some(Utc.with_ymd_and_hms(2026, 9, 30, 22, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_properties() {
        assert_eq!(Range::Hour.bucket(), MINUTE);
        assert_eq!(Range::Hours24.bucket(), HOUR);
        assert_eq!(Range::Days30.bucket(), DAY);
        let with_time: Vec<_> = Range::ALL
            .into_iter()
            .filter(|r| r.shows_time_of_day())
            .collect();
        assert_eq!(with_time, vec![Range::Hour, Range::Day, Range::Hours24]);
    }
}

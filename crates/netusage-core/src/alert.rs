//! Usage limit for the current hour, day or month.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};

use crate::query::{UnknownName, Unit};
use crate::storage::Record;
use crate::util::time::{start_of_day, start_of_hour, start_of_month};

/// Calendar period an alert limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlertPeriod {
    Hour,
    #[default]
    Day,
    Month,
}

impl AlertPeriod {
    /// Start of the period containing `now`, on the local wall clock.
    pub fn start<Tz: TimeZone>(self, now: &DateTime<Tz>) -> DateTime<Utc> {
        match self {
            AlertPeriod::Hour => start_of_hour(now),
            AlertPeriod::Day => start_of_day(now),
            AlertPeriod::Month => start_of_month(now),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertPeriod::Hour => "hour",
            AlertPeriod::Day => "day",
            AlertPeriod::Month => "month",
        }
    }
}

impl fmt::Display for AlertPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertPeriod {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(AlertPeriod::Hour),
            "day" => Ok(AlertPeriod::Day),
            "month" => Ok(AlertPeriod::Month),
            _ => Err(UnknownName::new("alert period", s.trim())),
        }
    }
}

/// Traffic limit of `limit` units per period. A zero limit disables the alert.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlertConfig {
    pub limit: f64,
    pub unit: Unit,
    pub period: AlertPeriod,
}

impl AlertConfig {
    pub fn new(limit: f64, unit: Unit, period: AlertPeriod) -> Self {
        Self {
            limit,
            unit,
            period,
        }
    }

    pub fn enabled(&self) -> bool {
        self.limit > 0.0
    }

    /// Received plus sent bytes in the current period.
    pub fn period_usage<Tz: TimeZone>(&self, records: &[Record], now: &DateTime<Tz>) -> i64 {
        let start = self.period.start(now);
        records
            .iter()
            .filter(|r| r.time >= start)
            .fold(0i64, |acc, r| acc.saturating_add(r.bytes_total()))
    }

    /// Fraction of the limit used in the current period, `None` when disabled.
    pub fn usage_ratio<Tz: TimeZone>(&self, records: &[Record], now: &DateTime<Tz>) -> Option<f64> {
        if !self.enabled() {
            return None;
        }
        let used = self.unit.scale(self.period_usage(records, now));
        Some(used / self.limit)
    }
}

use std::fmt;
use std::str::FromStr;

use super::range::UnknownName;

/// Display unit for byte counts. Each step is a factor of 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    B,
    KB,
    #[default]
    MB,
    GB,
    TB,
    PB,
}

impl Unit {
    pub const ALL: [Unit; 6] = [Unit::B, Unit::KB, Unit::MB, Unit::GB, Unit::TB, Unit::PB];

    /// Bytes per unit.
    pub fn factor(self) -> u64 {
        match self {
            Unit::B => 1,
            Unit::KB => 1 << 10,
            Unit::MB => 1 << 20,
            Unit::GB => 1 << 30,
            Unit::TB => 1 << 40,
            Unit::PB => 1 << 50,
        }
    }

    /// `bytes` expressed in this unit.
    pub fn scale(self, bytes: i64) -> f64 {
        bytes as f64 / self.factor() as f64
    }

    /// Largest unit in which `bytes` is at least one.
    pub fn fit(bytes: i64) -> Unit {
        let abs = bytes.unsigned_abs();
        Unit::ALL
            .into_iter()
            .rev()
            .find(|u| abs >= u.factor())
            .unwrap_or(Unit::B)
    }

    /// `bytes` in this unit with one decimal, e.g. `1.5 GB`.
    pub fn format(self, bytes: i64) -> String {
        match self {
            Unit::B => format!("{bytes} B"),
            _ => format!("{:.1} {}", self.scale(bytes), self),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::B => "B",
            Unit::KB => "KB",
            Unit::MB => "MB",
            Unit::GB => "GB",
            Unit::TB => "TB",
            Unit::PB => "PB",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Unit::ALL
            .into_iter()
            .find(|u| u.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownName::new("unit", s))
    }
}

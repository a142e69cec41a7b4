//! Host-wide cumulative network byte counters.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::collector::parser::{ParseError, parse_net_dev, parse_uptime};
use crate::collector::traits::FileSystem;

/// A cumulative reading: total bytes since interface initialization,
/// summed over every counted interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub received: i64,
    pub sent: i64,
}

impl Counters {
    pub fn new(received: i64, sent: i64) -> Self {
        Self { received, sent }
    }
}

/// Error reading counters or uptime.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a `/proc` file.
    Io(std::io::Error),
    /// Malformed `/proc` content.
    Parse(ParseError),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Io(e) => Some(e),
            CollectError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e)
    }
}

/// Source of cumulative counters and host uptime.
pub trait CounterReader: Send {
    /// Reads the current cumulative counters. No interfaces means zero.
    fn read_counters(&self) -> Result<Counters, CollectError>;

    /// Time since the host booted.
    fn uptime(&self) -> Result<Duration, CollectError>;
}

/// Estimated instant the current host session began.
pub fn last_start(now: DateTime<Utc>, uptime: Duration) -> DateTime<Utc> {
    let uptime = chrono::Duration::from_std(uptime).unwrap_or(chrono::Duration::MAX);
    now.checked_sub_signed(uptime).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Reads counters from `<proc>/net/dev` and uptime from `<proc>/uptime`.
pub struct ProcNetReader<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    ignored: Vec<String>,
}

impl<F: FileSystem> ProcNetReader<F> {
    /// Creates a reader.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            ignored: Vec::new(),
        }
    }

    /// Excludes interfaces by exact name (e.g. `lo`).
    pub fn ignore_interfaces(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.ignored = names.into_iter().map(Into::into).collect();
        self
    }
}

impl<F: FileSystem> CounterReader for ProcNetReader<F> {
    fn read_counters(&self) -> Result<Counters, CollectError> {
        let content = self.fs.read_to_string(&self.proc_path.join("net/dev"))?;

        let mut received: u64 = 0;
        let mut sent: u64 = 0;
        let mut counted = 0usize;
        for dev in parse_net_dev(&content) {
            if self.ignored.iter().any(|name| *name == dev.interface) {
                continue;
            }
            received = received.saturating_add(dev.rx_bytes);
            sent = sent.saturating_add(dev.tx_bytes);
            counted += 1;
        }

        trace!(interfaces = counted, received, sent, "read net/dev");

        Ok(Counters {
            received: i64::try_from(received).unwrap_or(i64::MAX),
            sent: i64::try_from(sent).unwrap_or(i64::MAX),
        })
    }

    fn uptime(&self) -> Result<Duration, CollectError> {
        let content = self.fs.read_to_string(&self.proc_path.join("uptime"))?;
        let seconds = parse_uptime(&content)?;
        Ok(Duration::from_secs_f64(seconds))
    }
}

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::storage::record::Record;

/// File name of the usage log inside the log directory.
pub const LOG_FILE_NAME: &str = "network_usage.log";

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 365;

/// How many unparsable line numbers are logged individually on load.
const MAX_REPORTED_BAD_LINES: usize = 5;

/// Result of loading the log.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Records in file order.
    pub records: Vec<Record>,
    /// Number of non-empty lines that failed to parse.
    pub skipped: usize,
}

/// Result of [`compact`].
#[derive(Debug, Default)]
pub struct Compaction {
    /// Time-ordered, deduplicated records inside the retention window.
    pub records: Vec<Record>,
    /// Records dropped because another record had the same time.
    pub duplicates_removed: usize,
    /// Records dropped for being older than the retention cutoff.
    pub expired_removed: usize,
}

impl Compaction {
    /// True when compaction dropped anything.
    pub fn changed(&self) -> bool {
        self.duplicates_removed > 0 || self.expired_removed > 0
    }
}

/// Oldest instant still inside the retention window. Records at exactly the
/// cutoff are kept.
pub fn retention_cutoff(now: DateTime<Utc>, retention: chrono::Duration) -> DateTime<Utc> {
    now.checked_sub_signed(retention)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Sorts, deduplicates and applies retention.
///
/// Records sharing a `time` collapse to the most complete one: the greatest
/// cumulative total, ties going to the record that appears later in the input
/// (the later write). Deltas are never summed.
pub fn compact(
    records: Vec<Record>,
    now: DateTime<Utc>,
    retention: chrono::Duration,
) -> Compaction {
    let cutoff = retention_cutoff(now, retention);
    let before = records.len();

    let mut live: Vec<Record> = records.into_iter().filter(|r| r.time >= cutoff).collect();
    let expired_removed = before - live.len();

    // Stable sort keeps file order among equal times.
    live.sort_by_key(|r| r.time);

    let mut out: Vec<Record> = Vec::with_capacity(live.len());
    for record in live {
        match out.last_mut() {
            Some(kept) if kept.time == record.time => {
                if completeness(&record) >= completeness(kept) {
                    *kept = record;
                }
            }
            _ => out.push(record),
        }
    }

    let duplicates_removed = before - expired_removed - out.len();

    Compaction {
        records: out,
        duplicates_removed,
        expired_removed,
    }
}

fn completeness(record: &Record) -> i128 {
    i128::from(record.cumulative_bytes_received) + i128::from(record.cumulative_bytes_sent)
}

/// Append-only JSON-lines log of usage records.
///
/// Owned by a single writer; there is no locking between processes.
#[derive(Debug, Clone)]
pub struct LogStore {
    dir: PathBuf,
    path: PathBuf,
}

impl LogStore {
    /// Creates a store for `<dir>/network_usage.log`. Nothing is touched on disk
    /// until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(LOG_FILE_NAME);
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads every line, skipping the ones that do not parse.
    ///
    /// A missing file is an empty log. Truncated data from a crash during a
    /// write only costs the damaged line.
    pub fn load(&self) -> io::Result<LoadReport> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no usage log yet");
                return Ok(LoadReport::default());
            }
            Err(e) => return Err(e),
        };

        let mut report = LoadReport::default();
        let reader = BufReader::new(file);

        for (idx, line) in reader.split(b'\n').enumerate() {
            let bytes = line?;
            // Invalid UTF-8 is just another corrupt line.
            let line = String::from_utf8_lossy(&bytes);
            if line.trim().is_empty() {
                continue;
            }
            match Record::parse(&line) {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    report.skipped += 1;
                    if report.skipped <= MAX_REPORTED_BAD_LINES {
                        warn!(line = idx + 1, error = %e, "skipping unreadable usage log line");
                    }
                }
            }
        }

        if report.skipped > MAX_REPORTED_BAD_LINES {
            warn!(
                skipped = report.skipped,
                "usage log contained unreadable lines"
            );
        }

        debug!(
            path = %self.path.display(),
            records = report.records.len(),
            skipped = report.skipped,
            "usage log loaded"
        );

        Ok(report)
    }

    /// Appends one record.
    pub fn append(&self, record: &Record) -> io::Result<()> {
        self.append_all(std::slice::from_ref(record))
    }

    /// Appends records in order and syncs the file.
    pub fn append_all(&self, records: &[Record]) -> io::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;

        let mut buf = String::new();
        for record in records {
            buf.push_str(&record.encode());
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf.as_bytes())?;
        file.sync_data()
    }

    /// Replaces the whole log with `records` (atomic via .tmp rename).
    pub fn rewrite(&self, records: &[Record]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = io::BufWriter::new(File::create(&tmp_path)?);
            for record in records {
                file.write_all(record.encode().as_bytes())?;
                file.write_all(b"\n")?;
            }
            let file = file.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), records = records.len(), "usage log rewritten");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 7, 17, minute, 0).unwrap()
    }

    fn record(minute: u32, received: i64, cumulative: i64) -> Record {
        Record {
            time: at(minute),
            bytes_received: received,
            bytes_sent: 0,
            cumulative_bytes_received: cumulative,
            cumulative_bytes_sent: 0,
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("nested"));
        let report = store.load().unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn test_append_creates_directory_and_round_trips() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("a").join("b"));

        store.append(&record(0, 0, 100)).unwrap();
        store.append(&record(1, 50, 150)).unwrap();

        assert!(store.path().exists());
        let report = store.load().unwrap();
        assert_eq!(report.records, vec![record(0, 0, 100), record(1, 50, 150)]);
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path());
        let good = record(0, 10, 10);
        let content = format!(
            "{}\n{{\"time\":\"2026-02-07T17:01:00Z\",\"bytesRec\n",
            good.encode()
        );
        std::fs::write(store.path(), content).unwrap();

        let report = store.load().unwrap();
        assert_eq!(report.records, vec![good]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_invalid_utf8_and_blank_lines() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path());
        let good = record(2, 1, 1);
        let mut content = Vec::new();
        content.extend_from_slice(b"\xff\xfe\x00garbage\n\n   \n");
        content.extend_from_slice(good.encode().as_bytes());
        content.push(b'\n');
        std::fs::write(store.path(), content).unwrap();

        let report = store.load().unwrap();
        assert_eq!(report.records, vec![good]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_rewrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path());
        store
            .append_all(&[record(0, 1, 1), record(1, 1, 2), record(2, 1, 3)])
            .unwrap();

        store.rewrite(&[record(2, 1, 3)]).unwrap();

        let report = store.load().unwrap();
        assert_eq!(report.records, vec![record(2, 1, 3)]);
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_compact_sorts_and_deduplicates_without_summing() {
        let now = at(30);
        let records = vec![
            record(2, 5, 30),
            record(1, 10, 20),
            // Restart inside the same interval: same time, more complete reading
            record(1, 12, 22),
            record(0, 0, 10),
        ];

        let result = compact(records, now, chrono::Duration::days(365));
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.expired_removed, 0);
        assert_eq!(
            result.records,
            vec![record(0, 0, 10), record(1, 12, 22), record(2, 5, 30)]
        );
    }

    #[test]
    fn test_compact_duplicate_tie_keeps_later_write() {
        let first = record(1, 10, 20);
        let second = Record {
            bytes_sent: 7,
            ..first
        };
        let result = compact(vec![first, second], at(30), chrono::Duration::days(1));
        assert_eq!(result.records, vec![second]);
    }

    #[test]
    fn test_retention_across_reload() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path());
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let retention = chrono::Duration::days(DEFAULT_RETENTION_DAYS);

        let boundary = Record::zero(now - retention);
        let expired = Record::zero(now - retention - chrono::Duration::minutes(1));
        let recent = Record::zero(now - chrono::Duration::days(1));
        store.append_all(&[expired, boundary, recent]).unwrap();

        let loaded = store.load().unwrap();
        let result = compact(loaded.records, now, retention);
        assert_eq!(result.expired_removed, 1);
        store.rewrite(&result.records).unwrap();

        let reloaded = store.load().unwrap().records;
        assert_eq!(reloaded, vec![boundary, recent]);

        // A second pass is stable.
        let again = compact(reloaded.clone(), now, retention);
        assert!(!again.changed());
        assert_eq!(again.records, reloaded);
    }
}

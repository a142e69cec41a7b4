//! The collector service: one sample per interval, appended to the log.
//!
//! ```text
//!   start()
//!     │
//!     ▼
//!   prepare ── load ─ validate ─ sample ─ reconcile ─ compact/rewrite ─ publish
//!     │
//!     ▼
//!   loop ──── sleep to boundary ─ sample ─ append ─ publish ─ notify
//!               ▲                                              │
//!               └──────────── rotate on local day change ◄─────┘
//! ```
//!
//! The loop task is the only writer. Readers take [`CollectorService::records`]
//! snapshots or subscribe to [`DataUpdated`] notifications.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::collector::{CounterReader, ProcNetReader, RealFs, last_start};
use crate::reconcile::reconcile;
use crate::sampler::IntervalSampler;
use crate::storage::{DEFAULT_RETENTION_DAYS, LogStore, Record, compact, retention_cutoff};
use crate::util::{align_floor, next_boundary};
use crate::validate;

/// Capacity of the notification channel; slow receivers lose older events.
const NOTIFY_CAPACITY: usize = 64;

/// Collector settings.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Directory holding `network_usage.log`.
    pub log_dir: PathBuf,
    /// Polling interval; samples land on multiples of it.
    pub interval: Duration,
    /// How long records are kept.
    pub retention: chrono::Duration,
    /// Base path of the proc filesystem.
    pub proc_path: PathBuf,
    /// Interfaces left out of the totals.
    pub ignore_interfaces: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./data"),
            interval: Duration::from_secs(60),
            retention: chrono::Duration::days(DEFAULT_RETENTION_DAYS),
            proc_path: PathBuf::from("/proc"),
            ignore_interfaces: Vec::new(),
        }
    }
}

/// Error type for the collector service.
#[derive(Debug)]
pub enum ServiceError {
    /// `start` was called on a service that is already running.
    AlreadyStarted,
    /// Log file could not be read or written.
    Io(std::io::Error),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::AlreadyStarted => write!(f, "collector already started"),
            ServiceError::Io(e) => write!(f, "usage log I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::AlreadyStarted => None,
            ServiceError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        ServiceError::Io(e)
    }
}

/// Published after every successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUpdated {
    /// Most recent record written.
    pub latest: Record,
    /// Records held in memory after the append.
    pub total: usize,
}

/// State visible to readers.
struct Shared {
    records: RwLock<Arc<Vec<Record>>>,
    tx: broadcast::Sender<DataUpdated>,
}

impl Shared {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            records: RwLock::new(Arc::new(Vec::new())),
            tx,
        }
    }

    fn snapshot(&self) -> Arc<Vec<Record>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, records: Vec<Record>) -> usize {
        let total = records.len();
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(records);
        total
    }

    /// Appends in place unless a reader still holds the current snapshot.
    fn push(&self, record: Record) -> usize {
        let mut guard = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let records = Arc::make_mut(&mut guard);
        records.push(record);
        records.len()
    }

    fn notify(&self, latest: Record, total: usize) {
        // No receivers is fine
        let _ = self.tx.send(DataUpdated { latest, total });
    }
}

/// Everything the loop task owns.
struct Engine<R: CounterReader> {
    sampler: IntervalSampler<R>,
    store: LogStore,
    interval: Duration,
    retention: chrono::Duration,
    shared: Arc<Shared>,
    last_day: Option<NaiveDate>,
    /// Time of the newest record written; later samples must be strictly after it.
    last_time: Option<DateTime<Utc>>,
}

impl<R: CounterReader> Engine<R> {
    /// Loads history and backfills the gap since the last run.
    fn prepare(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let loaded = self.store.load()?;
        let loaded_count = loaded.records.len();

        let findings = validate::validate(&loaded.records);
        validate::report(&findings);

        let mut compaction = compact(loaded.records, now, self.retention);
        if compaction.changed() {
            info!(
                duplicates = compaction.duplicates_removed,
                expired = compaction.expired_removed,
                "compacted usage log"
            );
        }

        let mut synthetic = Vec::new();
        match self.sampler.sample(now, self.interval) {
            Ok(current) => {
                let boot = match self.sampler.reader().uptime() {
                    Ok(uptime) => Some(last_start(now, uptime)),
                    // Without a boot instant only stored history can anchor the gap
                    Err(e) => {
                        warn!(error = %e, "failed to read uptime");
                        compaction.records.last().map(|r| r.time)
                    }
                };
                match boot {
                    Some(boot) => {
                        let cutoff = retention_cutoff(now, self.retention);
                        let result =
                            reconcile(&compaction.records, boot, &current, self.interval, cutoff);
                        self.sampler.set_baseline(result.baseline);
                        if result.intervals > 0 {
                            info!(
                                from = %result.from.time,
                                intervals = result.intervals,
                                records = result.synthetic.len(),
                                "backfilled gap since last run"
                            );
                        }
                        synthetic = result.synthetic;
                    }
                    None => {
                        info!("no usage history and no boot time, skipping backfill");
                        self.sampler.set_baseline(current.cumulative());
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "failed to read network counters at startup");
            }
        }

        self.store.append_all(&synthetic)?;
        compaction.records.extend_from_slice(&synthetic);

        if compaction.changed() || loaded.skipped > 0 {
            self.store.rewrite(&compaction.records)?;
        }

        let latest = compaction.records.last().copied();
        self.last_time = latest.map(|r| r.time);
        let total = self.shared.replace(compaction.records);
        if !synthetic.is_empty()
            && let Some(latest) = latest
        {
            self.shared.notify(latest, total);
        }

        self.last_day = Some(now.with_timezone(&Local).date_naive());

        info!(
            path = %self.store.path().display(),
            loaded = loaded_count,
            skipped = loaded.skipped,
            records = total,
            "usage log ready"
        );
        Ok(())
    }

    /// One loop iteration at `now`.
    fn tick(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let time = align_floor(now, self.interval);
        match self.last_time {
            // The counters stay unread so the next interval carries this usage
            Some(last) if time <= last => {
                warn!(%time, %last, "interval already recorded, deferring sample");
            }
            _ => self.record(now)?,
        }

        // Run retention when the local day changes
        let day = now.with_timezone(&Local).date_naive();
        if self.last_day != Some(day) {
            self.last_day = Some(day);
            self.rotate(now)?;
        }
        Ok(())
    }

    fn record(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        match self.sampler.sample(now, self.interval) {
            Ok(record) => {
                self.store.append(&record)?;
                self.last_time = Some(record.time);
                let total = self.shared.push(record);
                self.shared.notify(record, total);
                debug!(
                    time = %record.time,
                    received = record.bytes_received,
                    sent = record.bytes_sent,
                    "sample recorded"
                );
            }
            Err(e) => {
                error!(error = %e, "failed to read network counters");
            }
        }
        Ok(())
    }

    fn rotate(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let records = self.shared.snapshot().as_ref().clone();
        let compaction = compact(records, now, self.retention);
        if !compaction.changed() {
            return Ok(());
        }

        self.store.rewrite(&compaction.records)?;
        info!(
            duplicates = compaction.duplicates_removed,
            expired = compaction.expired_removed,
            remaining = compaction.records.len(),
            "rotation"
        );
        self.shared.replace(compaction.records);
        Ok(())
    }

    async fn run(mut self) -> Result<(), ServiceError> {
        self.prepare(Utc::now())?;

        info!(interval_secs = self.interval.as_secs(), "starting collection loop");

        let mut target = next_boundary(Utc::now(), self.interval);
        loop {
            let wait = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            // The timer is monotonic; a lagging wall clock must not pull the
            // sample back into the previous interval.
            let now = Utc::now().max(target);
            self.tick(now)?;
            target = next_boundary(now, self.interval);
        }
    }
}

/// Periodic network usage collector.
///
/// Created idle; [`start`](Self::start) moves it to running exactly once.
pub struct CollectorService<R: CounterReader> {
    engine: Mutex<Option<Engine<R>>>,
    shared: Arc<Shared>,
    interval: Duration,
    log_path: PathBuf,
}

impl CollectorService<ProcNetReader<RealFs>> {
    /// Collector reading the host's proc filesystem.
    pub fn for_host(config: CollectorConfig) -> Self {
        let reader = ProcNetReader::new(RealFs::new(), &config.proc_path)
            .ignore_interfaces(config.ignore_interfaces.clone());
        Self::new(config, reader)
    }
}

impl<R: CounterReader + 'static> CollectorService<R> {
    pub fn new(config: CollectorConfig, reader: R) -> Self {
        let shared = Arc::new(Shared::new());
        let store = LogStore::new(&config.log_dir);
        let log_path = store.path().to_path_buf();

        let engine = Engine {
            sampler: IntervalSampler::new(reader),
            store,
            interval: config.interval,
            retention: config.retention,
            shared: Arc::clone(&shared),
            last_day: None,
            last_time: None,
        };

        Self {
            engine: Mutex::new(Some(engine)),
            shared,
            interval: config.interval,
            log_path,
        }
    }

    /// Spawns the collection loop on the current tokio runtime.
    ///
    /// The handle resolves only if the loop stops on a log I/O error.
    pub fn start(&self) -> Result<JoinHandle<Result<(), ServiceError>>, ServiceError> {
        let engine = self
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ServiceError::AlreadyStarted)?;

        Ok(tokio::spawn(engine.run()))
    }

    /// Current records, oldest first.
    pub fn records(&self) -> Arc<Vec<Record>> {
        self.shared.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataUpdated> {
        self.shared.tx.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

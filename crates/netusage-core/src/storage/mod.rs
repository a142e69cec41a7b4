pub mod log;
pub mod record;

pub use log::{
    Compaction, DEFAULT_RETENTION_DAYS, LOG_FILE_NAME, LoadReport, LogStore, compact,
    retention_cutoff,
};
pub use record::{Record, RecordParseError};

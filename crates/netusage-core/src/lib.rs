//! netusage-core - shared library for the netusage collector and viewer.
//!
//! Provides:
//! - `collector` - cumulative network counters from `/proc`
//! - `sampler` - cumulative readings to per-interval deltas
//! - `storage` - usage records and the append-only log
//! - `reconcile` - backfill for intervals missed while stopped
//! - `validate` - advisory consistency checks on the log
//! - `service` - the scheduled collection loop and change notifications
//! - `query` - range bucketing, totals and display units
//! - `alert` - usage limits per hour, day or month
//! - `fmt` - shared formatting helpers
//! - `util` - interval and calendar arithmetic

pub mod alert;
pub mod collector;
pub mod fmt;
pub mod query;
pub mod reconcile;
pub mod sampler;
pub mod service;
pub mod storage;
pub mod util;
pub mod validate;

//! Utility modules.

pub mod time;

pub use time::{align_floor, interval_secs, next_boundary};

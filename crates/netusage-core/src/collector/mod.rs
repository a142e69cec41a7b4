//! Network counter collection for Linux.
//!
//! Reads host-wide cumulative byte counters from `/proc/net/dev` and the boot
//! estimate from `/proc/uptime`, with a mockable filesystem for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │           ProcNetReader (CounterReader)   │
//! │   - /proc/net/dev  → Counters             │
//! │   - /proc/uptime   → Duration             │
//! └─────────────────────┬─────────────────────┘
//!                       │
//!                ┌──────▼──────┐
//!                │  FileSystem │ (trait)
//!                └──────┬──────┘
//!              ┌────────┴────────┐
//!       ┌──────▼──────┐   ┌──────▼──────┐
//!       │   RealFs    │   │   MockFs    │
//!       │  (Linux)    │   │  (Testing)  │
//!       └─────────────┘   └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use netusage_core::collector::{CounterReader, MockFs, ProcNetReader};
//!
//! let reader = ProcNetReader::new(MockFs::typical_host(), "/proc");
//! let counters = reader.read_counters().unwrap();
//! assert_eq!(counters.received, 1_000_000);
//! ```

mod counters;
pub mod mock;
pub mod parser;
pub mod traits;

pub use counters::{CollectError, CounterReader, Counters, ProcNetReader, last_start};
pub use mock::MockFs;
pub use parser::ParseError;
pub use traits::{FileSystem, RealFs};

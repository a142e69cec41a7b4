//! Mock filesystem for testing the counter reader without real `/proc`.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;

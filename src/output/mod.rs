//! Output module for reporting archive state
//!
//! This module handles loading ledger and archive statistics from storage and
//! rendering them for the `--stats` mode.

pub mod stats;

pub use stats::{format_statistics, load_statistics, print_statistics, ScanStatistics};

//! Output module for snapshots and reports
//!
//! This module handles:
//! - Saving and loading JSON snapshots of scanned products
//! - Extracting and printing harvest statistics

pub mod snapshot;
pub mod stats;

pub use snapshot::{load_snapshot, save_snapshot};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};

//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! scan and dispatch statistics from the storage layer.

use crate::state::DispatchStatus;
use crate::storage::{RunRecord, Storage};
use crate::HarvestError;
use std::collections::HashMap;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of identities captured
    pub total_scanned: u64,

    /// Captured identities per category name
    pub scanned_by_category: HashMap<String, u64>,

    /// Identities acknowledged by the remote store
    pub stored: u64,

    /// Identities that exhausted their attempts in their latest store run
    pub failed: u64,

    /// Captured identities without a successful store
    pub not_stored: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    Ok(HarvestStatistics {
        total_scanned: storage.count_scanned()?,
        scanned_by_category: storage.count_scanned_by_category()?,
        stored: storage.count_dispatch_by_status(DispatchStatus::Success)?,
        failed: storage.count_dispatch_by_status(DispatchStatus::Failed)?,
        not_stored: storage.list_undispatched_identities()?.len() as u64,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total products scanned: {}", stats.total_scanned);
    println!("  Stored: {}", stats.stored);
    println!("  Failed: {}", stats.failed);
    println!("  Not yet stored: {}", stats.not_stored);
    println!();

    if !stats.scanned_by_category.is_empty() {
        println!("Products by Category:");
        // Sort categories by count (descending), then by name
        let mut category_counts: Vec<_> = stats.scanned_by_category.iter().collect();
        category_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (category, count) in category_counts {
            let percentage = if stats.total_scanned > 0 {
                (*count as f64 / stats.total_scanned as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", category, count, percentage);
        }
        println!();
    }

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!(
            "  #{} {} ({}), started {}",
            run.id,
            run.kind.to_db_string(),
            run.status.to_db_string(),
            run.started_at
        );
        println!();
    }

    println!(
        "Store Rate: {:.1}% ({} / {} products stored)",
        store_rate(stats),
        stats.stored,
        stats.total_scanned
    );
}

/// Percentage of scanned identities that have been stored
pub fn store_rate(stats: &HarvestStatistics) -> f64 {
    if stats.total_scanned > 0 {
        (stats.stored as f64 / stats.total_scanned as f64) * 100.0
    } else {
        0.0
    }
}

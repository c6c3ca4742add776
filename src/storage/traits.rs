//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::identity::Identity;
use crate::state::{DispatchStatus, ScannedMarker};
use crate::storage::{RunKind, RunRecord, RunStatus};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run
    ///
    /// # Arguments
    ///
    /// * `kind` - What the run does (scan, import or store)
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, kind: RunKind, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Scanned Products =====

    /// Inserts a marker unless its identity is already known
    ///
    /// # Returns
    ///
    /// The row ID of the marker for this identity (either newly created or existing)
    fn insert_if_absent(&mut self, marker: &ScannedMarker, run_id: i64) -> StorageResult<i64>;

    /// Gets every identity that has ever been captured
    fn list_known_identities(&self) -> StorageResult<HashSet<Identity>>;

    /// Gets all captured markers in capture order
    fn list_scanned(&self) -> StorageResult<Vec<ScannedMarker>>;

    /// Counts captured identities
    fn count_scanned(&self) -> StorageResult<u64>;

    /// Counts captured identities per category name
    fn count_scanned_by_category(&self) -> StorageResult<HashMap<String, u64>>;

    // ===== Dispatch Results =====

    /// Records the outcome of a dispatch run for one identity
    ///
    /// A later result for the same identity replaces the earlier one.
    fn record_dispatch_result(
        &mut self,
        identity: &Identity,
        status: DispatchStatus,
        attempts: u32,
        run_id: i64,
    ) -> StorageResult<()>;

    /// Gets captured identities that have never been stored successfully
    fn list_undispatched_identities(&self) -> StorageResult<Vec<Identity>>;

    /// Counts dispatch results by status
    fn count_dispatch_by_status(&self, status: DispatchStatus) -> StorageResult<u64>;
}

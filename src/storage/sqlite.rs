//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::identity::Identity;
use crate::state::{DispatchStatus, ScannedMarker};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunKind, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        kind: RunKind::from_db_string(&row.get::<_, String>(1)?).unwrap_or(RunKind::Scan),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn marker_from_row(row: &Row<'_>) -> rusqlite::Result<ScannedMarker> {
    let scanned_at: String = row.get(3)?;
    let scanned_at = DateTime::parse_from_rfc3339(&scanned_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(ScannedMarker {
        identity: row.get(0)?,
        category_name: row.get(1)?,
        subcategory_name: row.get(2)?,
        scanned_at,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, kind: RunKind, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (kind, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![run_id], run_from_row)
            .map_err(|_| StorageError::RunNotFound(run_id))?;

        Ok(run)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt.query_row([], run_from_row).optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Scanned Products =====

    fn insert_if_absent(&mut self, marker: &ScannedMarker, run_id: i64) -> StorageResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM scanned_products WHERE identity = ?1",
                params![marker.identity],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn.execute(
            "INSERT INTO scanned_products (identity, category_name, subcategory_name, scanned_at, discovered_run)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                marker.identity,
                marker.category_name,
                marker.subcategory_name,
                marker.scanned_at.to_rfc3339(),
                run_id
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn list_known_identities(&self) -> StorageResult<HashSet<Identity>> {
        let mut stmt = self.conn.prepare("SELECT identity FROM scanned_products")?;
        let identities = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<Identity>, _>>()?;
        Ok(identities)
    }

    fn list_scanned(&self) -> StorageResult<Vec<ScannedMarker>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity, category_name, subcategory_name, scanned_at
             FROM scanned_products ORDER BY id",
        )?;
        let markers = stmt
            .query_map([], marker_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(markers)
    }

    fn count_scanned(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM scanned_products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_scanned_by_category(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_name, COUNT(*) FROM scanned_products GROUP BY category_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (category, count) = row?;
            breakdown.insert(category, count as u64);
        }

        Ok(breakdown)
    }

    // ===== Dispatch Results =====

    fn record_dispatch_result(
        &mut self,
        identity: &Identity,
        status: DispatchStatus,
        attempts: u32,
        run_id: i64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO dispatch_results (identity, status, attempts, updated_at, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(identity) DO UPDATE SET
                status = excluded.status,
                attempts = excluded.attempts,
                updated_at = excluded.updated_at,
                run_id = excluded.run_id",
            params![identity, status.to_db_string(), attempts, now, run_id],
        )?;
        Ok(())
    }

    fn list_undispatched_identities(&self) -> StorageResult<Vec<Identity>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity FROM scanned_products
             WHERE identity NOT IN (SELECT identity FROM dispatch_results WHERE status = ?1)
             ORDER BY id",
        )?;
        let identities = stmt
            .query_map(params![DispatchStatus::Success.to_db_string()], |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(identities)
    }

    fn count_dispatch_by_status(&self, status: DispatchStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dispatch_results WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(id: &str, category: &str) -> ScannedMarker {
        ScannedMarker::new(
            Identity::parse(id).unwrap(),
            category.to_string(),
            "Misc".to_string(),
        )
    }

    #[test]
    fn test_create_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(RunKind::Store, "test_hash").unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.kind, RunKind::Store);
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_complete_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(RunKind::Scan, "test_hash").unwrap();
        storage.complete_run(run_id).unwrap();

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, run_id);
        assert_eq!(latest.status, RunStatus::Completed);
        assert!(latest.finished_at.is_some());
    }

    #[test]
    fn test_missing_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
        assert!(storage
            .update_run_status(42, RunStatus::Failed)
            .is_err());
        assert!(storage.get_latest_run().unwrap().is_none());
    }

    #[test]
    fn test_insert_if_absent_keeps_first_marker() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(RunKind::Import, "test_hash").unwrap();

        let first = storage.insert_if_absent(&marker("3236", "Fruit"), run_id).unwrap();
        let second = storage
            .insert_if_absent(&marker("3236.0", "Bakery"), run_id)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.count_scanned().unwrap(), 1);
        let scanned = storage.list_scanned().unwrap();
        assert_eq!(scanned[0].category_name, "Fruit");
    }

    #[test]
    fn test_list_scanned_roundtrips_markers() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(RunKind::Scan, "test_hash").unwrap();
        let original = marker("12.5", "Fruit");

        storage.insert_if_absent(&original, run_id).unwrap();

        let scanned = storage.list_scanned().unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].identity, original.identity);
        assert_eq!(
            scanned[0].scanned_at.timestamp_millis(),
            original.scanned_at.timestamp_millis()
        );
    }

    #[test]
    fn test_known_identities_and_category_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(RunKind::Scan, "test_hash").unwrap();
        storage.insert_if_absent(&marker("1", "Fruit"), run_id).unwrap();
        storage.insert_if_absent(&marker("2", "Fruit"), run_id).unwrap();
        storage.insert_if_absent(&marker("3", "Bakery"), run_id).unwrap();

        let known = storage.list_known_identities().unwrap();
        assert_eq!(known.len(), 3);
        assert!(known.contains(&Identity::parse("2").unwrap()));

        let breakdown = storage.count_scanned_by_category().unwrap();
        assert_eq!(breakdown.get("Fruit"), Some(&2));
        assert_eq!(breakdown.get("Bakery"), Some(&1));
    }

    #[test]
    fn test_dispatch_results_replace_earlier_outcome() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(RunKind::Store, "test_hash").unwrap();
        let id = Identity::parse("7").unwrap();

        storage
            .record_dispatch_result(&id, DispatchStatus::Failed, 3, run_id)
            .unwrap();
        storage
            .record_dispatch_result(&id, DispatchStatus::Success, 1, run_id)
            .unwrap();

        assert_eq!(
            storage
                .count_dispatch_by_status(DispatchStatus::Failed)
                .unwrap(),
            0
        );
        assert_eq!(
            storage
                .count_dispatch_by_status(DispatchStatus::Success)
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_undispatched_excludes_successes_only() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(RunKind::Scan, "test_hash").unwrap();
        for id in ["1", "2", "3"] {
            storage.insert_if_absent(&marker(id, "Fruit"), run_id).unwrap();
        }

        storage
            .record_dispatch_result(&Identity::parse("1").unwrap(), DispatchStatus::Success, 0, run_id)
            .unwrap();
        storage
            .record_dispatch_result(&Identity::parse("2").unwrap(), DispatchStatus::Failed, 3, run_id)
            .unwrap();

        let remaining: Vec<String> = storage
            .list_undispatched_identities()
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(remaining, vec!["2", "3"]);
    }
}

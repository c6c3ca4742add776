//! Dispatcher - bounded-retry fetch-then-submit orchestration
//!
//! This module pushes captured identities to the remote store:
//! - Selecting which identities to dispatch (all, not yet stored, half)
//! - Batching pending identities and rotating the network identity per batch
//! - Running the concurrent fetch and submit phases of each batch
//! - Persisting the final status of every identity

use crate::config::{Config, DispatchConfig};
use crate::crawler::remote::{HttpRemoteClient, RemoteClient};
use crate::crawler::rotator::{rotator_for, IdentityRotator};
use crate::identity::Identity;
use crate::state::{DispatchEntry, DispatchStateTracker, DispatchStatus};
use crate::storage::{RunKind, RunStatus, SqliteStorage, Storage};
use crate::HarvestError;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Pause between warm-up requests
const WARM_UP_PAUSE: Duration = Duration::from_secs(1);

/// Timing and sizing of a dispatch loop
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub batch_size: usize,
    pub stagger: Duration,
    pub batch_pause: Duration,
    pub warm_up_requests: u32,
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            stagger: Duration::from_millis(config.stagger_ms),
            batch_pause: Duration::from_millis(config.batch_pause_ms),
            warm_up_requests: config.warm_up_requests,
        }
    }
}

/// Outcome of one fetch+submit cycle
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Number of identities in the batch
    pub attempted: usize,

    /// Identities acknowledged by the remote store
    pub succeeded: HashSet<Identity>,

    /// Identities whose fetch failed, with the reason
    pub fetch_failures: Vec<(Identity, String)>,

    /// Identities whose submit failed, with the reason
    pub submit_failures: Vec<(Identity, String)>,
}

/// Runs one batch through the fetch phase, then the submit phase
///
/// Fetches start `stagger` apart and run concurrently. Only well-formed
/// details proceed to the submit phase. A failure of one identity never
/// affects the others.
pub async fn run_batch(
    client: &dyn RemoteClient,
    batch: &[DispatchEntry],
    stagger: Duration,
) -> BatchReport {
    let mut report = BatchReport {
        attempted: batch.len(),
        ..Default::default()
    };

    let fetches = batch.iter().enumerate().map(|(i, entry)| async move {
        tokio::time::sleep(stagger * i as u32).await;
        (entry.identity.clone(), client.fetch_detail(&entry.identity).await)
    });

    let mut details = Vec::with_capacity(batch.len());
    for (identity, result) in join_all(fetches).await {
        match result {
            Ok(detail) => details.push(detail),
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", identity, e);
                report.fetch_failures.push((identity, e.to_string()));
            }
        }
    }

    let submits = details.iter().map(|detail| async move {
        (detail.identity.clone(), client.submit_detail(detail).await)
    });

    for (identity, result) in join_all(submits).await {
        match result {
            Ok(ack) => {
                if ack.identity != identity {
                    tracing::warn!(
                        "Store acknowledged {} for a submit of {}",
                        ack.identity,
                        identity
                    );
                }
                report.succeeded.insert(ack.identity);
            }
            Err(e) => {
                tracing::warn!("Submit failed for {}: {}", identity, e);
                report.submit_failures.push((identity, e.to_string()));
            }
        }
    }

    tracing::info!(
        "Tried: {} -- Stored: {}",
        report.attempted,
        report.succeeded.len()
    );

    report
}

/// Drives the tracker until every identity is terminal
///
/// # Arguments
///
/// * `tracker` - Seeded dispatch state; returned with every entry terminal
/// * `client` - The fetch/submit endpoints
/// * `rotator` - Called once before each batch
/// * `settings` - Batch size, stagger and pauses
pub async fn run_dispatch(
    mut tracker: DispatchStateTracker,
    client: &dyn RemoteClient,
    rotator: &dyn IdentityRotator,
    settings: &DispatchSettings,
) -> DispatchStateTracker {
    let batch_size = settings.batch_size.max(1);

    loop {
        let pending = tracker.get_pending();
        if pending.is_empty() {
            break;
        }

        for batch in pending.chunks(batch_size) {
            rotator.rotate().await;

            let report = run_batch(client, batch, settings.stagger).await;
            tracker.record_batch_outcome(batch, &report.succeeded);

            let counts = tracker.counts();
            tracing::info!(
                "Pending: {} -- Failed: {} -- Success: {}",
                counts.pending,
                counts.failed,
                counts.success
            );

            if counts.pending > 0 && !settings.batch_pause.is_zero() {
                tokio::time::sleep(settings.batch_pause).await;
            }
        }
    }

    tracker
}

/// Which half of the identity set a partial store covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialStore {
    FirstHalf,
    SecondHalf,
}

impl PartialStore {
    /// Selects this half of `identities`
    pub fn sample<T>(&self, mut identities: Vec<T>) -> Vec<T> {
        let middle = identities.len() / 2;
        match self {
            Self::FirstHalf => {
                identities.truncate(middle);
                identities
            }
            Self::SecondHalf => identities.split_off(middle),
        }
    }
}

impl FromStr for PartialStore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-half" | "first_half" => Ok(Self::FirstHalf),
            "second-half" | "second_half" => Ok(Self::SecondHalf),
            other => Err(format!(
                "Invalid partial store '{}', expected first-half or second-half",
                other
            )),
        }
    }
}

/// Which identities a store run dispatches
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreSelection {
    /// Skip identities that were already stored successfully
    pub only_new: bool,

    /// Restrict to one half of the selection
    pub partial: Option<PartialStore>,
}

/// Final result of a store run
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub run_id: i64,
    pub attempted: usize,
    pub success: Vec<Identity>,
    pub failed: Vec<Identity>,
}

/// Main dispatch coordinator structure
pub struct Dispatcher {
    client: Box<dyn RemoteClient>,
    rotator: Box<dyn IdentityRotator>,
    storage: SqliteStorage,
    settings: DispatchSettings,
    max_attempts: u32,
    config_hash: String,
}

impl Dispatcher {
    /// Creates a dispatcher from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - Hash of the configuration file, recorded with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Dispatcher)` - Successfully created dispatcher
    /// * `Err(HarvestError)` - Failed to open storage or build the HTTP client
    pub fn new(config: &Config, config_hash: String) -> Result<Self, HarvestError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let client = HttpRemoteClient::new(&config.remote)?;
        let rotator = rotator_for(config.remote.rotate_command.as_deref());

        Ok(Self::with_parts(
            Box::new(client),
            rotator,
            storage,
            &config.dispatch,
            config_hash,
        ))
    }

    /// Creates a dispatcher from already-built parts
    pub fn with_parts(
        client: Box<dyn RemoteClient>,
        rotator: Box<dyn IdentityRotator>,
        storage: SqliteStorage,
        config: &DispatchConfig,
        config_hash: String,
    ) -> Self {
        Self {
            client,
            rotator,
            storage,
            settings: DispatchSettings::from(config),
            max_attempts: config.max_attempts,
            config_hash,
        }
    }

    /// Lists the identities a store run will dispatch
    pub fn select_identities(&self, selection: &StoreSelection) -> Result<Vec<Identity>, HarvestError> {
        let identities = if selection.only_new {
            self.storage.list_undispatched_identities()?
        } else {
            self.storage
                .list_scanned()?
                .into_iter()
                .map(|marker| marker.identity)
                .collect()
        };

        Ok(match selection.partial {
            Some(partial) => partial.sample(identities),
            None => identities,
        })
    }

    /// Runs a store pass and persists the outcome of every identity
    pub async fn run(&mut self, selection: &StoreSelection) -> Result<DispatchSummary, HarvestError> {
        let identities = self.select_identities(selection)?;
        let run_id = self.storage.create_run(RunKind::Store, &self.config_hash)?;
        tracing::info!(
            "Starting store run {} with {} identities",
            run_id,
            identities.len()
        );

        if identities.is_empty() {
            tracing::info!("Nothing to store");
            self.storage.complete_run(run_id)?;
            return Ok(DispatchSummary {
                run_id,
                ..Default::default()
            });
        }

        self.warm_up().await;

        let tracker = DispatchStateTracker::with_max_attempts(identities, self.max_attempts);
        let tracker = run_dispatch(
            tracker,
            self.client.as_ref(),
            self.rotator.as_ref(),
            &self.settings,
        )
        .await;

        if let Err(e) = self.persist_outcome(&tracker, run_id) {
            self.storage.update_run_status(run_id, RunStatus::Failed)?;
            return Err(e);
        }
        self.storage.complete_run(run_id)?;

        let summary = DispatchSummary {
            run_id,
            attempted: tracker.len(),
            success: tracker.get_success().into_iter().map(|e| e.identity).collect(),
            failed: tracker.get_failed().into_iter().map(|e| e.identity).collect(),
        };

        for identity in &summary.failed {
            tracing::warn!("Failed to store {}", identity);
        }
        tracing::info!(
            "Store run {} complete: {} stored, {} failed",
            run_id,
            summary.success.len(),
            summary.failed.len()
        );

        Ok(summary)
    }

    async fn warm_up(&self) {
        for i in 0..self.settings.warm_up_requests {
            if i > 0 {
                tokio::time::sleep(WARM_UP_PAUSE).await;
            }
            if let Err(e) = self.client.warm_up().await {
                tracing::warn!("Warm up request failed: {}", e);
            }
        }
    }

    fn persist_outcome(&mut self, tracker: &DispatchStateTracker, run_id: i64) -> Result<(), HarvestError> {
        for entry in tracker.entries() {
            if entry.status == DispatchStatus::Pending {
                tracing::warn!("{} still pending at the end of the run", entry.identity);
            }
            self.storage
                .record_dispatch_result(&entry.identity, entry.status, entry.attempts, run_id)?;
        }
        Ok(())
    }

    /// Read access to the underlying storage
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }
}

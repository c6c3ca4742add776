//! Catalog scan driver
//!
//! Walks a navigable three-level catalog and records every item it reaches.
//! Each pass starts with a full reload of the view, which invalidates every
//! handle the tracker holds; the tracker re-binds them level by level as the
//! pass descends. A pass that hits a transient failure leaves the tracker
//! intact so the next pass resumes where it stopped.

use crate::config::ScanConfig;
use crate::identity::Identity;
use crate::state::{HierarchyTracker, NodeHandle, ScannedMarker, StaleHandle, TrackerError};
use crate::storage::Storage;
use crate::HarvestError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a catalog view
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("View timed out")]
    Timeout,

    #[error("Too many requests")]
    RateLimited,

    #[error(transparent)]
    Stale(#[from] StaleHandle),
}

/// A navigable rendering of the catalog
///
/// Every call returns a fresh batch of handles for the level it opens.
#[async_trait]
pub trait CatalogView: Send {
    type Handle: NodeHandle + Send + Sync;

    /// Reloads the view and lists the categories
    ///
    /// Every handle issued before the reload becomes stale.
    async fn load_categories(&mut self) -> Result<Vec<Self::Handle>, ViewError>;

    /// Opens a category and lists its subcategories
    async fn open_category(&mut self, category: &Self::Handle) -> Result<Vec<Self::Handle>, ViewError>;

    /// Opens a subcategory and lists its items
    async fn open_subcategory(
        &mut self,
        subcategory: &Self::Handle,
    ) -> Result<Vec<Self::Handle>, ViewError>;

    /// Opens an item and reads its identity
    async fn open_item(&mut self, item: &Self::Handle) -> Result<Identity, ViewError>;
}

/// How a single traversal pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// No pending categories remain
    Finished,

    /// A transient failure stopped the pass
    Interrupted(String),
}

/// Limits of a scan loop
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub max_iterations: u32,
    pub retry_pause: Duration,
}

impl From<&ScanConfig> for ScanSettings {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            retry_pause: Duration::from_millis(config.retry_pause_ms),
        }
    }
}

/// Failure inside a pass, before classification
#[derive(Debug, Error)]
enum PassError {
    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("{0}")]
    Empty(&'static str),
}

impl From<StaleHandle> for PassError {
    fn from(err: StaleHandle) -> Self {
        Self::Tracker(TrackerError::StaleHandle(err))
    }
}

/// Runs one traversal attempt
///
/// # Returns
///
/// * `Ok(PassOutcome::Finished)` - Every category has been walked
/// * `Ok(PassOutcome::Interrupted(_))` - A stale handle, view error or empty
///   listing stopped the pass
/// * `Err(HarvestError::Tracker)` - The live catalog no longer contains a node
///   the tracker expects
pub async fn scan_pass<V: CatalogView>(
    tracker: &mut HierarchyTracker<V::Handle>,
    view: &mut V,
) -> Result<PassOutcome, HarvestError> {
    match traverse(tracker, view).await {
        Ok(()) => {
            tracker.set_finished();
            Ok(PassOutcome::Finished)
        }
        Err(PassError::Tracker(e)) if !e.is_retryable() => Err(e.into()),
        Err(e) => Ok(PassOutcome::Interrupted(e.to_string())),
    }
}

async fn traverse<V: CatalogView>(
    tracker: &mut HierarchyTracker<V::Handle>,
    view: &mut V,
) -> Result<(), PassError> {
    tracing::debug!("Fresh start");
    let categories = view.load_categories().await?;
    tracing::debug!("Found {} categories", categories.len());
    if categories.is_empty() {
        return Err(PassError::Empty("No categories found"));
    }
    tracker.add_categories(&categories)?;

    while let Some(category) = tracker.get_pending_categories()?.into_iter().next() {
        tracing::debug!("Load category {}", category.resolve_text()?);
        let subcategories = view.open_category(&category).await?;
        tracker.add_subcategories(&category, &subcategories)?;

        while let Some(subcategory) = tracker
            .get_pending_subcategories(&category)?
            .into_iter()
            .next()
        {
            tracing::debug!("Load subcategory {}", subcategory.resolve_text()?);
            let items = view.open_subcategory(&subcategory).await?;
            if items.is_empty() {
                return Err(PassError::Empty("No items found"));
            }
            tracker.add_items(&category, &subcategory, &items)?;

            while let Some(item) = tracker
                .get_pending_products(&category, &subcategory)?
                .into_iter()
                .next()
            {
                let identity = view.open_item(&item).await?;
                let marker = ScannedMarker::new(
                    identity.clone(),
                    category.resolve_text()?,
                    subcategory.resolve_text()?,
                );

                if !tracker.mark_scanned(&category, &subcategory, &item, marker)? {
                    return Err(PassError::Empty("Item vanished while scanning"));
                }
                tracing::info!("Official product ID: {}", identity);
            }
        }
    }

    Ok(())
}

/// Repeats traversal passes until the catalog is fully scanned
///
/// # Returns
///
/// * `Ok(passes)` - Number of passes it took
/// * `Err(HarvestError::IterationLimit)` - The ceiling was reached first
pub async fn scan_catalog<V: CatalogView>(
    tracker: &mut HierarchyTracker<V::Handle>,
    view: &mut V,
    settings: &ScanSettings,
) -> Result<u32, HarvestError> {
    if tracker.is_finished() {
        return Ok(0);
    }

    for iteration in 1..=settings.max_iterations {
        match scan_pass(tracker, view).await? {
            PassOutcome::Finished => {
                tracing::info!(
                    "Catalog scanned in {} passes: {} items",
                    iteration,
                    tracker.scanned_count()
                );
                return Ok(iteration);
            }
            PassOutcome::Interrupted(reason) => {
                tracing::warn!(
                    "Pass {} interrupted ({} scanned, {} pending): {}",
                    iteration,
                    tracker.scanned_count(),
                    tracker.pending_count(),
                    reason
                );
                if !settings.retry_pause.is_zero() {
                    tokio::time::sleep(settings.retry_pause).await;
                }
            }
        }
    }

    Err(HarvestError::IterationLimit {
        iterations: settings.max_iterations,
        scanned: tracker.scanned_count(),
    })
}

/// Persists the markers whose identity the store has not seen yet
///
/// # Returns
///
/// The number of markers inserted
pub fn persist_new_markers<S: Storage>(
    storage: &mut S,
    markers: &[ScannedMarker],
    run_id: i64,
) -> Result<usize, HarvestError> {
    let known = storage.list_known_identities()?;

    let mut inserted = 0;
    for marker in markers.iter().filter(|m| !known.contains(&m.identity)) {
        tracing::debug!("Persisting product: {}", marker.identity);
        storage.insert_if_absent(marker, run_id)?;
        inserted += 1;
    }

    tracing::info!(
        "{} scanned, {} already known, {} new",
        markers.len(),
        markers.len() - inserted,
        inserted
    );

    Ok(inserted)
}

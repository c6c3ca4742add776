//! Crawler module for walking the catalog and dispatching what it finds
//!
//! This module contains the core harvesting logic, including:
//! - Scan passes over a navigable catalog view
//! - The HTTP fetch/submit client for the remote store
//! - Network identity rotation between batches
//! - Bounded-retry dispatch coordination

pub mod dispatcher;
pub mod remote;
pub mod rotator;
pub mod scan;

pub use dispatcher::{
    run_batch, run_dispatch, BatchReport, DispatchSettings, DispatchSummary, Dispatcher,
    PartialStore, StoreSelection,
};
pub use remote::{build_http_client, Ack, DetailObject, HttpRemoteClient, RemoteClient, RemoteError};
pub use rotator::{rotator_for, CommandRotator, IdentityRotator, NoopRotator};
pub use scan::{persist_new_markers, scan_catalog, scan_pass, CatalogView, PassOutcome, ScanSettings, ViewError};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete store pass
///
/// This is the main entry point for dispatching. It will:
/// 1. Open the storage layer
/// 2. Build the HTTP client and rotator
/// 3. Select the identities to dispatch
/// 4. Run batches until every identity is stored or given up
/// 5. Record the outcome of every identity
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `config_hash` - Hash of the configuration file
/// * `selection` - Which identities to dispatch
pub async fn store(
    config: &Config,
    config_hash: String,
    selection: &StoreSelection,
) -> Result<DispatchSummary, HarvestError> {
    let mut dispatcher = Dispatcher::new(config, config_hash)?;
    dispatcher.run(selection).await
}

//! Catalog-Harvest: a resumable catalog harvester
//!
//! This crate walks a three-level catalog (category → subcategory → item) whose
//! node references go stale on every reload, records the identity of every item
//! it reaches, and pushes those identities through a bounded-retry
//! fetch-then-submit pipeline against a remote store.

pub mod config;
pub mod crawler;
pub mod identity;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Catalog-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Hierarchy tracker error: {0}")]
    Tracker(#[from] state::TrackerError),

    #[error("Catalog traversal gave up after {iterations} passes ({scanned} items scanned)")]
    IterationLimit { iterations: u32, scanned: usize },

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Identity-specific errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Identity not found in URL: {0}")]
    NotFound(String),

    #[error("Malformed identity: '{0}'")]
    Malformed(String),
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for identity operations
pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

// Re-export commonly used types
pub use config::Config;
pub use identity::{canonicalize, extract_from_url, Identity};
pub use state::{
    DispatchEntry, DispatchStateTracker, DispatchStatus, HierarchyTracker, NodeHandle,
    ScannedMarker, StaleHandle, TrackerError,
};

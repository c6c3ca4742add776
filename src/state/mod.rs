//! State module for tracking harvest progress
//!
//! This module provides the two trackers that drive a harvest run.
//!
//! # Components
//!
//! - `HierarchyTracker`: Pending/scanned view of the catalog that survives stale node handles
//! - `ProductState`: One entry of the tracker's working set (category, subcategory, item or scanned)
//! - `DispatchStateTracker`: Per-identity status and attempt counts for the dispatch pipeline

mod dispatch_state;
pub(crate) mod handle;
mod hierarchy;
mod product_state;

// Re-export main types
pub use dispatch_state::{
    DispatchCounts, DispatchEntry, DispatchStateTracker, DispatchStatus, DEFAULT_MAX_ATTEMPTS,
};
pub use handle::{NodeHandle, StaleHandle};
pub use hierarchy::{HierarchyTracker, TrackerError};
pub use product_state::{BoundNode, NodeKey, ProductState, ScannedMarker};

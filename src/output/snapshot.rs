//! JSON snapshot of scanned markers
//!
//! The snapshot lets a scan survive a process restart and feeds the import
//! pass that persists new identities.

use crate::state::ScannedMarker;
use crate::HarvestError;
use std::path::Path;

/// Writes the markers as pretty JSON
///
/// # Arguments
///
/// * `path` - Destination file, replaced if it exists
/// * `markers` - Markers in capture order
pub fn save_snapshot(path: &Path, markers: &[ScannedMarker]) -> Result<(), HarvestError> {
    let json = serde_json::to_string_pretty(markers)?;
    std::fs::write(path, json)?;
    tracing::info!("Saved {} scanned products to {}", markers.len(), path.display());
    Ok(())
}

/// Reads markers written by [`save_snapshot`]
pub fn load_snapshot(path: &Path) -> Result<Vec<ScannedMarker>, HarvestError> {
    let content = std::fs::read_to_string(path)?;
    let markers: Vec<ScannedMarker> = serde_json::from_str(&content)?;
    tracing::info!("Loaded {} scanned products from {}", markers.len(), path.display());
    Ok(markers)
}

//! Node handles supplied by the navigable catalog view
use thiserror::Error;

/// A handle outlived the view it was taken from
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stale node handle: {0}")]
pub struct StaleHandle(pub String);

/// Opaque reference to a currently visible catalog node
///
/// Handles are disposable: the view invalidates all of them on every full
/// reload. The only capability the trackers rely on is resolving the node's
/// display text, which fails once the handle is stale.
pub trait NodeHandle: Clone {
    /// Resolves the display text of the node
    fn resolve_text(&self) -> Result<String, StaleHandle>;
}

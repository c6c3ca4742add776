/// Working-set entries of the hierarchy tracker
///
/// Each entry sits at exactly one depth of the catalog. Pending entries carry
/// live handles next to their display text; scanned entries drop the handles
/// and keep only text plus the immutable capture record.
use crate::identity::Identity;
use crate::state::NodeHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Write-once record that a catalog leaf has been captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedMarker {
    pub identity: Identity,
    pub category_name: String,
    pub subcategory_name: String,
    pub scanned_at: DateTime<Utc>,
}

impl ScannedMarker {
    /// Creates a marker stamped with the current time
    pub fn new(identity: Identity, category_name: String, subcategory_name: String) -> Self {
        Self {
            identity,
            category_name,
            subcategory_name,
            scanned_at: Utc::now(),
        }
    }
}

/// Durable text key of a catalog node
///
/// Handles are re-bound on every reload; this triple is what stays stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub category: String,
    pub subcategory: Option<String>,
    pub item: Option<String>,
}

/// A handle together with the display text it resolved to when bound
#[derive(Debug, Clone)]
pub struct BoundNode<H> {
    pub handle: H,
    pub name: String,
}

impl<H: NodeHandle> BoundNode<H> {
    pub fn new(handle: H, name: String) -> Self {
        Self { handle, name }
    }
}

/// One node in the tracker's working set
#[derive(Debug, Clone)]
pub enum ProductState<H> {
    /// A category whose subcategories are not known yet
    Category { category: BoundNode<H> },

    /// A subcategory whose items are not known yet
    Subcategory {
        category: BoundNode<H>,
        subcategory: BoundNode<H>,
    },

    /// An item waiting to be captured
    Item {
        category: BoundNode<H>,
        subcategory: BoundNode<H>,
        item: BoundNode<H>,
    },

    /// A captured item. `seq` is the capture order within the run.
    Scanned {
        category: String,
        subcategory: String,
        item: String,
        marker: ScannedMarker,
        seq: u64,
    },
}

impl<H> ProductState<H> {
    pub fn category_name(&self) -> &str {
        match self {
            Self::Category { category }
            | Self::Subcategory { category, .. }
            | Self::Item { category, .. } => &category.name,
            Self::Scanned { category, .. } => category,
        }
    }

    pub fn subcategory_name(&self) -> Option<&str> {
        match self {
            Self::Category { .. } => None,
            Self::Subcategory { subcategory, .. } | Self::Item { subcategory, .. } => {
                Some(&subcategory.name)
            }
            Self::Scanned { subcategory, .. } => Some(subcategory),
        }
    }

    pub fn item_name(&self) -> Option<&str> {
        match self {
            Self::Category { .. } | Self::Subcategory { .. } => None,
            Self::Item { item, .. } => Some(&item.name),
            Self::Scanned { item, .. } => Some(item),
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey {
            category: self.category_name().to_string(),
            subcategory: self.subcategory_name().map(str::to_string),
            item: self.item_name().map(str::to_string),
        }
    }

    pub fn is_scanned(&self) -> bool {
        matches!(self, Self::Scanned { .. })
    }

    pub fn is_pending(&self) -> bool {
        !self.is_scanned()
    }

    pub fn marker(&self) -> Option<&ScannedMarker> {
        match self {
            Self::Scanned { marker, .. } => Some(marker),
            _ => None,
        }
    }

    /// Returns true if this entry lives under the given category
    pub fn in_category(&self, category: &str) -> bool {
        self.category_name() == category
    }

    /// Returns true if this entry lives under the given subcategory
    pub fn in_subcategory(&self, category: &str, subcategory: &str) -> bool {
        self.in_category(category) && self.subcategory_name() == Some(subcategory)
    }

    pub(crate) fn category_mut(&mut self) -> Option<&mut BoundNode<H>> {
        match self {
            Self::Category { category }
            | Self::Subcategory { category, .. }
            | Self::Item { category, .. } => Some(category),
            Self::Scanned { .. } => None,
        }
    }

    pub(crate) fn subcategory_mut(&mut self) -> Option<&mut BoundNode<H>> {
        match self {
            Self::Subcategory { subcategory, .. } | Self::Item { subcategory, .. } => {
                Some(subcategory)
            }
            Self::Category { .. } | Self::Scanned { .. } => None,
        }
    }
}

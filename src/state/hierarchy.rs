//! Hierarchy tracker for the three-level catalog
//!
//! The tracker keeps the pending/scanned view of the catalog across reloads of
//! the navigable view. Every reload invalidates all node handles, so entries
//! are keyed by display text and handles are re-bound from each fresh batch:
//!
//! - `add_*` seeds a level on first sight and resyncs it afterwards
//! - `get_pending_*` lists what remains, sorted by resolved text
//! - `mark_scanned` retires a leaf with an immutable [`ScannedMarker`]

use crate::identity::Identity;
use crate::state::product_state::{BoundNode, NodeKey, ProductState, ScannedMarker};
use crate::state::{NodeHandle, StaleHandle};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised by the hierarchy tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A handle no longer resolves; re-fetch a fresh batch and retry
    #[error(transparent)]
    StaleHandle(#[from] StaleHandle),

    /// A node the tracker expects is absent from the live hierarchy
    #[error("Expected {level} '{name}' is missing from the catalog")]
    MissingNode { level: &'static str, name: String },
}

impl TrackerError {
    /// Returns true if the driver may retry after re-fetching handles
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleHandle(_))
    }

    fn missing_category(name: &str) -> Self {
        Self::MissingNode {
            level: "category",
            name: name.to_string(),
        }
    }

    fn missing_subcategory(category: &str, subcategory: &str) -> Self {
        Self::MissingNode {
            level: "subcategory",
            name: format!("{} / {}", category, subcategory),
        }
    }
}

/// Pending/scanned view of the catalog
pub struct HierarchyTracker<H> {
    /// Working set in insertion order
    products: Vec<ProductState<H>>,

    /// Next capture sequence number
    next_seq: u64,

    finished: bool,
}

impl<H: NodeHandle> Default for HierarchyTracker<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: NodeHandle> HierarchyTracker<H> {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
            next_seq: 0,
            finished: false,
        }
    }

    /// Seeds the categories, or re-binds their handles on later calls
    ///
    /// # Errors
    ///
    /// * `StaleHandle` - one of `refs` does not resolve
    /// * `MissingNode` - a pending category is absent from `refs`
    pub fn add_categories(&mut self, refs: &[H]) -> Result<(), TrackerError> {
        if self.products.is_empty() {
            for (name, handle) in resolve_distinct(refs)? {
                tracing::debug!("Added category: {}", name);
                self.products.push(ProductState::Category {
                    category: BoundNode::new(handle, name),
                });
            }
            return Ok(());
        }

        let fresh = resolve_batch(refs)?;

        if let Some(missing) = self
            .products
            .iter()
            .filter(|p| p.is_pending())
            .find(|p| !fresh.contains_key(p.category_name()))
        {
            return Err(TrackerError::missing_category(missing.category_name()));
        }

        for product in self.products.iter_mut() {
            if let Some(category) = product.category_mut() {
                category.handle = fresh[category.name.as_str()].clone();
            }
        }
        tracing::debug!("Synced {} category handles", fresh.len());

        Ok(())
    }

    /// Expands a category into subcategories, or re-binds them on later calls
    ///
    /// The first expansion replaces the category-only placeholder with one
    /// entry per subcategory. Once expanded, the same call re-binds the
    /// subcategory handles of pending entries under that category.
    ///
    /// # Errors
    ///
    /// * `StaleHandle` - `category_ref` or one of `refs` does not resolve
    /// * `MissingNode` - the category is unknown, or a pending subcategory is
    ///   absent from `refs`
    pub fn add_subcategories(&mut self, category_ref: &H, refs: &[H]) -> Result<(), TrackerError> {
        let category_name = category_ref.resolve_text()?;

        let indices: Vec<usize> = self
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.in_category(&category_name))
            .map(|(i, _)| i)
            .collect();

        match indices.as_slice() {
            [] => Err(TrackerError::missing_category(&category_name)),
            [index] if matches!(self.products[*index], ProductState::Category { .. }) => {
                let fresh = resolve_distinct(refs)?;
                let category = match self.products.remove(*index) {
                    ProductState::Category { category } => category,
                    _ => unreachable!("placeholder shape checked above"),
                };

                for (name, handle) in fresh {
                    let entry = ProductState::Subcategory {
                        category: category.clone(),
                        subcategory: BoundNode::new(handle, name),
                    };
                    tracing::debug!("Added: {:?}", entry.key());
                    self.products.push(entry);
                }
                Ok(())
            }
            _ => self.sync_subcategories(category_ref, &category_name, refs),
        }
    }

    fn sync_subcategories(
        &mut self,
        category_ref: &H,
        category_name: &str,
        refs: &[H],
    ) -> Result<(), TrackerError> {
        let fresh = resolve_batch(refs)?;

        if let Some(missing) = self
            .products
            .iter()
            .filter(|p| p.is_pending() && p.in_category(category_name))
            .filter_map(|p| p.subcategory_name())
            .find(|name| !fresh.contains_key(*name))
        {
            return Err(TrackerError::missing_subcategory(category_name, missing));
        }

        for product in self
            .products
            .iter_mut()
            .filter(|p| p.is_pending() && p.in_category(category_name))
        {
            if let Some(category) = product.category_mut() {
                category.handle = category_ref.clone();
            }
            if let Some(subcategory) = product.subcategory_mut() {
                subcategory.handle = fresh[subcategory.name.as_str()].clone();
                tracing::debug!("Synced subcategory: {} / {}", category_name, subcategory.name);
            }
        }

        Ok(())
    }

    /// Expands a subcategory into items, or refreshes its items on later calls
    ///
    /// The whole batch is resolved before the tree changes, so a stale handle
    /// leaves the tracker as it was. On the first expansion the subcategory
    /// placeholder is replaced, after checking that its stored handle still
    /// resolves. Afterwards the most recent pending item of the pair serves as
    /// the template for the fresh entries, and pending items whose name
    /// reappears are replaced. Pending items absent from the batch are kept.
    /// Items whose `(category, item name)` pair is already scanned are dropped.
    ///
    /// # Errors
    ///
    /// * `StaleHandle` - a supplied handle or the placeholder's handle does not
    ///   resolve
    /// * `MissingNode` - the category or subcategory is unknown
    pub fn add_items(
        &mut self,
        category_ref: &H,
        subcategory_ref: &H,
        refs: &[H],
    ) -> Result<(), TrackerError> {
        let category_name = category_ref.resolve_text()?;
        if !self.products.iter().any(|p| p.in_category(&category_name)) {
            return Err(TrackerError::missing_category(&category_name));
        }

        let subcategory_name = subcategory_ref.resolve_text()?;
        let fresh = resolve_distinct(refs)?;
        let indices: Vec<usize> = self
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.in_subcategory(&category_name, &subcategory_name))
            .map(|(i, _)| i)
            .collect();

        let (category, subcategory) = match indices.as_slice() {
            [] => {
                return Err(TrackerError::missing_subcategory(
                    &category_name,
                    &subcategory_name,
                ))
            }
            [index] if matches!(self.products[*index], ProductState::Subcategory { .. }) => {
                let (category, subcategory) = match &self.products[*index] {
                    ProductState::Subcategory {
                        category,
                        subcategory,
                    } => (category.clone(), subcategory.clone()),
                    _ => unreachable!("placeholder shape checked above"),
                };
                // Verify before removing so a stale placeholder leaves state intact
                subcategory.handle.resolve_text()?;
                self.products.remove(*index);
                (category, subcategory)
            }
            _ => {
                let template = indices.iter().rev().find_map(|&i| match &self.products[i] {
                    ProductState::Item {
                        category,
                        subcategory,
                        ..
                    } => Some((category.clone(), subcategory.clone())),
                    _ => None,
                });

                match template {
                    Some(template) => template,
                    // Every item of the pair is scanned; bind to the caller's live handles
                    None => (
                        BoundNode::new(category_ref.clone(), category_name.clone()),
                        BoundNode::new(subcategory_ref.clone(), subcategory_name.clone()),
                    ),
                }
            }
        };

        let mut new_items: Vec<ProductState<H>> = fresh
            .into_iter()
            .map(|(name, handle)| ProductState::Item {
                category: category.clone(),
                subcategory: subcategory.clone(),
                item: BoundNode::new(handle, name),
            })
            .collect();

        // Pending items reappearing in the fresh batch are superseded; the rest
        // stay pending with their old handles
        let fresh_keys: HashSet<NodeKey> = new_items.iter().map(|p| p.key()).collect();
        self.products.retain(|p| {
            if !matches!(p, ProductState::Item { .. })
                || !p.in_subcategory(&category_name, &subcategory_name)
            {
                return true;
            }
            let superseded = fresh_keys.contains(&p.key());
            if !superseded {
                tracing::warn!("Item missing from the fresh listing, kept pending: {:?}", p.key());
            }
            !superseded
        });

        // Display names recur across categories, so the scanned key is the pair
        let scanned_pairs: HashSet<(&str, &str)> = self
            .products
            .iter()
            .filter(|p| p.is_scanned())
            .filter_map(|p| p.item_name().map(|item| (p.category_name(), item)))
            .collect();
        new_items.retain(|p| {
            let pair = (p.category_name(), p.item_name().unwrap_or_default());
            !scanned_pairs.contains(&pair)
        });

        for entry in &new_items {
            tracing::debug!("Added: {:?}", entry.key());
        }
        self.products.extend(new_items);

        Ok(())
    }

    /// Returns one handle per pending category, sorted by resolved text
    pub fn get_pending_categories(&self) -> Result<Vec<H>, TrackerError> {
        let pending = distinct_by_name(
            self.products
                .iter()
                .filter_map(|p| match p {
                    ProductState::Category { category }
                    | ProductState::Subcategory { category, .. }
                    | ProductState::Item { category, .. } => Some(category),
                    ProductState::Scanned { .. } => None,
                }),
        );
        sorted_by_text(pending)
    }

    /// Returns one handle per pending subcategory of a category, sorted by
    /// resolved text
    pub fn get_pending_subcategories(&self, category_ref: &H) -> Result<Vec<H>, TrackerError> {
        let category_name = category_ref.resolve_text()?;
        let pending = distinct_by_name(
            self.products
                .iter()
                .filter(|p| p.in_category(&category_name))
                .filter_map(|p| match p {
                    ProductState::Subcategory { subcategory, .. }
                    | ProductState::Item { subcategory, .. } => Some(subcategory),
                    _ => None,
                }),
        );
        sorted_by_text(pending)
    }

    /// Returns the pending item handles of a subcategory, sorted by resolved
    /// text
    pub fn get_pending_products(
        &self,
        category_ref: &H,
        subcategory_ref: &H,
    ) -> Result<Vec<H>, TrackerError> {
        let category_name = category_ref.resolve_text()?;
        let subcategory_name = subcategory_ref.resolve_text()?;
        let pending = distinct_by_name(
            self.products
                .iter()
                .filter(|p| p.in_subcategory(&category_name, &subcategory_name))
                .filter_map(|p| match p {
                    ProductState::Item { item, .. } => Some(item),
                    _ => None,
                }),
        );
        sorted_by_text(pending)
    }

    /// Attaches a marker to the first pending item matching the handles' text
    ///
    /// Returns `Ok(true)` if an entry was retired. No matching entry is not an
    /// error, which makes repeated notifications harmless. An entry whose
    /// identity was already captured elsewhere is retired without adding a
    /// second marker for that identity to the snapshot.
    pub fn mark_scanned(
        &mut self,
        category_ref: &H,
        subcategory_ref: &H,
        item_ref: &H,
        marker: ScannedMarker,
    ) -> Result<bool, TrackerError> {
        let category_name = category_ref.resolve_text()?;
        let subcategory_name = subcategory_ref.resolve_text()?;
        let item_name = item_ref.resolve_text()?;

        let Some(index) = self.products.iter().position(|p| {
            matches!(p, ProductState::Item { .. })
                && p.in_subcategory(&category_name, &subcategory_name)
                && p.item_name() == Some(item_name.as_str())
        }) else {
            tracing::debug!(
                "No pending item for {} / {} / {}, ignoring",
                category_name,
                subcategory_name,
                item_name
            );
            return Ok(false);
        };

        if self.is_captured(&marker.identity) {
            tracing::debug!(
                "Identity {} already captured, retiring {} without a new snapshot entry",
                marker.identity,
                item_name
            );
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.products[index] = ProductState::Scanned {
            category: category_name,
            subcategory: subcategory_name,
            item: item_name,
            marker,
            seq,
        };
        tracing::debug!("Scanned: {:?}", self.products[index].key());

        Ok(true)
    }

    /// Returns true if a marker for this identity has been captured
    pub fn is_captured(&self, identity: &Identity) -> bool {
        self.products
            .iter()
            .filter_map(|p| p.marker())
            .any(|m| &m.identity == identity)
    }

    /// Returns true once the traversal has completed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Marks the traversal as complete
    pub fn set_finished(&mut self) {
        self.finished = true;
    }

    /// Returns all captured markers in capture order, one per identity
    pub fn get_scanned_products(&self) -> Vec<ScannedMarker> {
        let mut scanned: Vec<(u64, &ScannedMarker)> = self
            .products
            .iter()
            .filter_map(|p| match p {
                ProductState::Scanned { marker, seq, .. } => Some((*seq, marker)),
                _ => None,
            })
            .collect();
        scanned.sort_by_key(|(seq, _)| *seq);

        let mut seen = HashSet::new();
        scanned
            .into_iter()
            .filter(|(_, m)| seen.insert(m.identity.clone()))
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Number of distinct identities captured so far
    pub fn scanned_count(&self) -> usize {
        self.get_scanned_products().len()
    }

    /// Number of entries still waiting to be visited
    pub fn pending_count(&self) -> usize {
        self.products.iter().filter(|p| p.is_pending()).count()
    }

    /// Keys of all pending entries
    pub fn pending_keys(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self
            .products
            .iter()
            .filter(|p| p.is_pending())
            .map(|p| p.key())
            .collect();
        keys.sort();
        keys
    }
}

/// Resolves a fresh batch into a text → handle map
fn resolve_batch<H: NodeHandle>(refs: &[H]) -> Result<HashMap<String, H>, StaleHandle> {
    let mut fresh = HashMap::with_capacity(refs.len());
    for handle in refs {
        fresh.entry(handle.resolve_text()?).or_insert_with(|| handle.clone());
    }
    Ok(fresh)
}

/// Resolves a batch in order, keeping the first handle for each text
fn resolve_distinct<H: NodeHandle>(refs: &[H]) -> Result<Vec<(String, H)>, StaleHandle> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(refs.len());
    for handle in refs {
        let name = handle.resolve_text()?;
        if seen.insert(name.clone()) {
            resolved.push((name, handle.clone()));
        }
    }
    Ok(resolved)
}

/// Keeps the first bound handle for each display name
fn distinct_by_name<'a, H: NodeHandle + 'a>(
    nodes: impl Iterator<Item = &'a BoundNode<H>>,
) -> Vec<&'a H> {
    let mut seen = HashSet::new();
    nodes
        .filter(|node| seen.insert(node.name.as_str()))
        .map(|node| &node.handle)
        .collect()
}

/// Resolves every handle and sorts by the resolved text
fn sorted_by_text<H: NodeHandle>(handles: Vec<&H>) -> Result<Vec<H>, TrackerError> {
    let mut resolved = handles
        .into_iter()
        .map(|h| Ok((h.resolve_text()?, h.clone())))
        .collect::<Result<Vec<_>, StaleHandle>>()?;
    resolved.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(resolved.into_iter().map(|(_, h)| h).collect())
}

/// Dispatch state definitions for the fetch-then-submit pipeline
///
/// Every identity starts pending and ends in exactly one terminal state. The
/// attempt ceiling is applied lazily: an entry that has used up its attempts is
/// promoted to failed the next time the pending set is read.
use crate::identity::Identity;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Default per-identity attempt ceiling
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delivery status of a single identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchStatus {
    /// Waiting for (another) attempt
    Pending,

    // ===== Terminal States =====
    /// Fetched and acknowledged by the remote store
    Success,

    /// Gave up after reaching the attempt ceiling
    Failed,
}

impl DispatchStatus {
    /// Returns true if no further attempts will be made
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// One identity's progress through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    pub identity: Identity,
    pub status: DispatchStatus,
    pub attempts: u32,
}

/// Entry counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    pub pending: usize,
    pub success: usize,
    pub failed: usize,
}

impl DispatchCounts {
    pub fn total(&self) -> usize {
        self.pending + self.success + self.failed
    }
}

/// Tracks per-identity status and attempt counts
#[derive(Debug, Clone)]
pub struct DispatchStateTracker {
    /// Entries in seed order
    entries: Vec<DispatchEntry>,

    /// Identity → position in `entries`
    index: HashMap<Identity, usize>,

    max_attempts: u32,
}

impl DispatchStateTracker {
    /// Seeds every identity as pending with zero attempts
    ///
    /// Duplicate identities collapse to the first occurrence.
    pub fn new(identities: impl IntoIterator<Item = Identity>) -> Self {
        Self::with_max_attempts(identities, DEFAULT_MAX_ATTEMPTS)
    }

    /// Same as [`DispatchStateTracker::new`] with a custom attempt ceiling
    pub fn with_max_attempts(identities: impl IntoIterator<Item = Identity>, max_attempts: u32) -> Self {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for identity in identities {
            if index.contains_key(&identity) {
                continue;
            }
            index.insert(identity.clone(), entries.len());
            entries.push(DispatchEntry {
                identity,
                status: DispatchStatus::Pending,
                attempts: 0,
            });
        }

        Self {
            entries,
            index,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Promotes exhausted entries to failed, then returns what is still pending
    pub fn get_pending(&mut self) -> Vec<DispatchEntry> {
        let max_attempts = self.max_attempts;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.status == DispatchStatus::Pending && e.attempts >= max_attempts)
        {
            entry.status = DispatchStatus::Failed;
            tracing::warn!(
                "Giving up on {} after {} attempts",
                entry.identity,
                entry.attempts
            );
        }

        self.with_status(DispatchStatus::Pending)
    }

    pub fn get_success(&self) -> Vec<DispatchEntry> {
        self.with_status(DispatchStatus::Success)
    }

    pub fn get_failed(&self) -> Vec<DispatchEntry> {
        self.with_status(DispatchStatus::Failed)
    }

    /// Applies the outcome of one batch
    ///
    /// # Arguments
    ///
    /// * `batch` - The entries that were attempted
    /// * `succeeded` - Identities the remote store acknowledged
    pub fn record_batch_outcome(&mut self, batch: &[DispatchEntry], succeeded: &HashSet<Identity>) {
        for attempted in batch {
            let Some(&position) = self.index.get(&attempted.identity) else {
                tracing::warn!("Outcome for unknown identity {}", attempted.identity);
                continue;
            };
            let entry = &mut self.entries[position];
            if entry.status.is_terminal() {
                continue;
            }

            if succeeded.contains(&entry.identity) {
                entry.status = DispatchStatus::Success;
            } else {
                entry.attempts += 1;
                tracing::debug!(
                    "Attempt {} failed for {}",
                    entry.attempts,
                    entry.identity
                );
            }
        }
    }

    /// Counts entries per status without promoting exhausted ones
    pub fn counts(&self) -> DispatchCounts {
        let mut counts = DispatchCounts::default();
        for entry in &self.entries {
            match entry.status {
                DispatchStatus::Pending => counts.pending += 1,
                DispatchStatus::Success => counts.success += 1,
                DispatchStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// All entries in seed order
    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn with_status(&self, status: DispatchStatus) -> Vec<DispatchEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == status)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<Identity> {
        raw.iter().map(|s| Identity::parse(s).unwrap()).collect()
    }

    fn succeeded(raw: &[&str]) -> HashSet<Identity> {
        ids(raw).into_iter().collect()
    }

    fn identities(entries: &[DispatchEntry]) -> Vec<String> {
        entries.iter().map(|e| e.identity.to_string()).collect()
    }

    #[test]
    fn test_status_db_string_roundtrip() {
        for status in [
            DispatchStatus::Pending,
            DispatchStatus::Success,
            DispatchStatus::Failed,
        ] {
            assert_eq!(
                DispatchStatus::from_db_string(status.to_db_string()),
                Some(status)
            );
        }
        assert_eq!(DispatchStatus::from_db_string("unknown"), None);
        assert!(!DispatchStatus::Pending.is_terminal());
        assert!(DispatchStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_collapses_duplicates() {
        let mut tracker = DispatchStateTracker::new(ids(&["1", "2", "1", "3"]));

        assert_eq!(tracker.len(), 3);
        assert_eq!(identities(&tracker.get_pending()), vec!["1", "2", "3"]);
        assert!(tracker.get_pending().iter().all(|e| e.attempts == 0));
    }

    #[test]
    fn test_empty_tracker_has_nothing_pending() {
        let mut tracker = DispatchStateTracker::new(Vec::new());
        assert!(tracker.is_empty());
        assert!(tracker.get_pending().is_empty());
    }

    #[test]
    fn test_success_is_terminal() {
        let mut tracker = DispatchStateTracker::new(ids(&["1", "2"]));
        let batch = tracker.get_pending();

        tracker.record_batch_outcome(&batch, &succeeded(&["1"]));
        // A later failure report for a terminal entry is ignored
        tracker.record_batch_outcome(&batch, &HashSet::new());

        assert_eq!(identities(&tracker.get_success()), vec!["1"]);
        let pending = tracker.get_pending();
        assert_eq!(identities(&pending), vec!["2"]);
        assert_eq!(pending[0].attempts, 2);
    }

    #[test]
    fn test_failure_is_promoted_lazily() {
        let mut tracker = DispatchStateTracker::new(ids(&["7"]));

        for _ in 0..3 {
            let batch = tracker.get_pending();
            assert_eq!(batch.len(), 1);
            tracker.record_batch_outcome(&batch, &HashSet::new());
        }

        // Still pending until the next poll observes the ceiling
        assert!(tracker.get_failed().is_empty());
        assert_eq!(tracker.counts().pending, 1);

        assert!(tracker.get_pending().is_empty());
        let failed = tracker.get_failed();
        assert_eq!(identities(&failed), vec!["7"]);
        assert_eq!(failed[0].attempts, 3);
    }

    #[test]
    fn test_success_on_last_attempt() {
        let mut tracker = DispatchStateTracker::new(ids(&["7"]));

        for _ in 0..2 {
            let batch = tracker.get_pending();
            tracker.record_batch_outcome(&batch, &HashSet::new());
        }
        let batch = tracker.get_pending();
        tracker.record_batch_outcome(&batch, &succeeded(&["7"]));

        assert!(tracker.get_pending().is_empty());
        assert!(tracker.get_failed().is_empty());
        assert_eq!(tracker.get_success()[0].attempts, 2);
    }

    #[test]
    fn test_custom_max_attempts() {
        let mut tracker = DispatchStateTracker::with_max_attempts(ids(&["1"]), 1);
        let batch = tracker.get_pending();
        tracker.record_batch_outcome(&batch, &HashSet::new());

        assert!(tracker.get_pending().is_empty());
        assert_eq!(tracker.get_failed().len(), 1);
    }

    #[test]
    fn test_zero_max_attempts_is_clamped() {
        let tracker = DispatchStateTracker::with_max_attempts(ids(&["1"]), 0);
        assert_eq!(tracker.max_attempts(), 1);
    }

    /// Pending, success and failed are disjoint and together cover the seed
    fn assert_partition(tracker: &DispatchStateTracker, seed: &HashSet<Identity>) {
        let pending: HashSet<Identity> = tracker
            .entries()
            .iter()
            .filter(|e| e.status == DispatchStatus::Pending)
            .map(|e| e.identity.clone())
            .collect();
        let success: HashSet<Identity> =
            tracker.get_success().into_iter().map(|e| e.identity).collect();
        let failed: HashSet<Identity> =
            tracker.get_failed().into_iter().map(|e| e.identity).collect();

        assert!(pending.is_disjoint(&success));
        assert!(pending.is_disjoint(&failed));
        assert!(success.is_disjoint(&failed));

        let union: HashSet<Identity> = pending
            .iter()
            .chain(success.iter())
            .chain(failed.iter())
            .cloned()
            .collect();
        assert_eq!(&union, seed);
    }

    #[test]
    fn test_terminal_sets_partition_the_seed() {
        let seed = ids(&["1", "2", "3", "4", "5"]);
        let seed_set: HashSet<Identity> = seed.iter().cloned().collect();
        let mut tracker = DispatchStateTracker::new(seed);
        assert_partition(&tracker, &seed_set);

        // Each round acknowledges a different subset, in batches of two
        let rounds = [vec!["2"], vec!["4", "5"], vec![]];
        let mut round = 0;
        loop {
            let pending = tracker.get_pending();
            assert_partition(&tracker, &seed_set);
            if pending.is_empty() {
                break;
            }

            let acked = succeeded(rounds.get(round).map(Vec::as_slice).unwrap_or(&[]));
            for batch in pending.chunks(2) {
                tracker.record_batch_outcome(batch, &acked);
                assert_partition(&tracker, &seed_set);
            }
            round += 1;
        }

        let counts = tracker.counts();
        assert_eq!(counts.success, 3);
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.total(), 5);
        assert_eq!(identities(&tracker.get_failed()), vec!["1", "3"]);
        assert!(tracker.get_failed().iter().all(|e| e.attempts == 3));
    }
}

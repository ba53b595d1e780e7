//! Program-state fingerprints per scheduling point.
//!
//! Each scheduling point hashes the live entity views (enabled and waiting
//! flags, pending operation and target, the send a pending receive consumes)
//! with the deterministic hasher. A fingerprint seen before in the same run
//! counts as a revisited state.

use crate::strategy::OperationView;
use crate::util::{DetHasher, DetHashMap};
use std::hash::{Hash, Hasher};

/// Fingerprints seen during one run.
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    seen: DetHashMap<u64, u64>,
    revisits: u64,
}

impl StateCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint of the given views.
    #[must_use]
    pub fn fingerprint(ops: &[OperationView]) -> u64 {
        let mut hasher = DetHasher::default();
        for op in ops {
            op.id.hash(&mut hasher);
            op.is_enabled.hash(&mut hasher);
            op.is_waiting_to_receive.hash(&mut hasher);
            op.next_operation.hash(&mut hasher);
            op.target_kind.hash(&mut hasher);
            op.target_id.hash(&mut hasher);
            op.matching_send_index.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Records a state; returns `true` when it had been seen before.
    pub fn capture(&mut self, ops: &[OperationView]) -> bool {
        let hits = self.seen.entry(Self::fingerprint(ops)).or_insert(0);
        *hits += 1;
        let revisited = *hits > 1;
        if revisited {
            self.revisits += 1;
        }
        revisited
    }

    /// Distinct states captured.
    #[must_use]
    pub fn distinct_states(&self) -> usize {
        self.seen.len()
    }

    /// Captures that hit an already seen state.
    #[must_use]
    pub const fn revisited_states(&self) -> u64 {
        self.revisits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::views;

    #[test]
    fn repeated_state_counts_as_revisit() {
        let mut cache = StateCache::new();
        let a = views(&[(1, true), (2, false)]);
        let b = views(&[(1, false), (2, true)]);
        assert!(!cache.capture(&a));
        assert!(!cache.capture(&b));
        assert!(cache.capture(&a));
        assert_eq!(cache.distinct_states(), 2);
        assert_eq!(cache.revisited_states(), 1);
    }

    #[test]
    fn names_do_not_affect_fingerprint() {
        let a = views(&[(1, true)]);
        let mut b = a.clone();
        b[0].name = "renamed".into();
        assert_eq!(StateCache::fingerprint(&a), StateCache::fingerprint(&b));
    }
}

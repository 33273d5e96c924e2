//! In-memory summary of "which bundles along which chains this node has observed".
//!
//! A pure summary, loaded at open time by scanning
//! `chain-infos`, never itself the authority on acceptance. `LmdbStore` consults
//! `chain-infos` directly for the acceptance rule; the tracker exists to answer
//! gossip-style "what do you have" queries without a table scan.

use std::collections::HashMap;

use crate::bundle_info::BundleInfo;

/// A producer's append-only log, identified by `(medallion, chain_start)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Chain {
    pub medallion: i64,
    pub chain_start: i64,
}

impl Chain {
    pub fn new(medallion: i64, chain_start: i64) -> Chain {
        Chain { medallion, chain_start }
    }
}

/// Tracks the highest [`BundleInfo`] seen per [`Chain`].
#[derive(Debug, Default, Clone)]
pub struct ChainTracker {
    heads: HashMap<Chain, BundleInfo>,
}

impl ChainTracker {
    pub fn new() -> ChainTracker {
        ChainTracker { heads: HashMap::new() }
    }

    /// Records `info` as the new head for its chain, regardless of what was there before.
    /// Callers are expected to have already checked `info` actually advances the chain.
    pub fn mark_as_having(&mut self, info: BundleInfo) {
        self.heads.insert(info.chain(), info);
    }

    /// The highest info this tracker has recorded for `chain`, if any.
    pub fn get(&self, chain: &Chain) -> Option<&BundleInfo> {
        self.heads.get(chain)
    }

    /// True iff `info` is already implied by what this tracker has recorded for its chain —
    /// i.e. the chain's head timestamp is at least `info.timestamp`.
    pub fn has_seen(&self, info: &BundleInfo) -> bool {
        match self.heads.get(&info.chain()) {
            Some(head) => head.timestamp >= info.timestamp,
            None => false,
        }
    }

    /// Iterates the tracked chains and their head infos, for gossip exchange.
    pub fn iter(&self) -> impl Iterator<Item = (&Chain, &BundleInfo)> {
        self.heads.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(timestamp: i64, medallion: i64, chain_start: i64, prior_time: i64) -> BundleInfo {
        BundleInfo { timestamp, medallion, chain_start, prior_time, hash: 0, comment: None }
    }

    #[test]
    fn tracks_head_per_chain() {
        let mut tracker = ChainTracker::new();
        assert!(!tracker.has_seen(&info(100, 7, 100, 0)));

        tracker.mark_as_having(info(100, 7, 100, 0));
        assert!(tracker.has_seen(&info(100, 7, 100, 0)));
        assert!(!tracker.has_seen(&info(200, 7, 100, 100)));

        tracker.mark_as_having(info(200, 7, 100, 100));
        assert!(tracker.has_seen(&info(200, 7, 100, 100)));
        assert_eq!(tracker.get(&Chain::new(7, 100)).unwrap().timestamp, 200);
    }

    #[test]
    fn independent_chains() {
        let mut tracker = ChainTracker::new();
        tracker.mark_as_having(info(100, 7, 100, 0));
        tracker.mark_as_having(info(150, 8, 150, 0));
        assert_eq!(tracker.iter().count(), 2);
    }
}

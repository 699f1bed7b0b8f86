// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::PartialBeacon;
use byteorder::{BigEndian, ByteOrder};
use std::collections::{HashMap, VecDeque};

/// Per-signer bound on buckets a single index may keep alive. A confused or
/// hostile peer can submit partials for arbitrarily many `(round, prev_sig)`
/// combinations; without the quota cache memory is unbounded. The quota is
/// keyed by signer index rather than source address because only indices
/// authenticate via the threshold scheme.
pub const MAX_PARTIALS_PER_NODE: usize = 100;

/// Key of a partial-signature bucket: `BE(round) || prev_sig`.
pub type RoundId = Vec<u8>;

pub fn round_id(round: u64, previous_sig: &[u8]) -> RoundId {
    let mut id = vec![0; 8];
    BigEndian::write_u64(&mut id[..8], round);
    id.extend_from_slice(previous_sig);
    id
}

/// Partials collected for one `(round, prev_sig)` combination. A signer
/// index occurs at most once; `prev_sig` is fixed for the bucket's lifetime.
#[derive(Debug)]
pub struct RoundCache {
    round: u64,
    previous_sig: Vec<u8>,
    id: RoundId,
    sigs: HashMap<u32, Vec<u8>>,
}

impl RoundCache {
    fn new(round: u64, previous_sig: Vec<u8>) -> Self {
        let id = round_id(round, &previous_sig);
        Self {
            round,
            previous_sig,
            id,
            sigs: HashMap::new(),
        }
    }

    /// Inserts a partial, returning false if this signer already contributed.
    fn append(&mut self, index: u32, partial_sig: Vec<u8>) -> bool {
        if self.sigs.contains_key(&index) {
            return false;
        }
        self.sigs.insert(index, partial_sig);
        true
    }

    fn flush_index(&mut self, index: u32) {
        self.sigs.remove(&index);
    }

    fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn previous_sig(&self) -> &[u8] {
        &self.previous_sig
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    /// The collected partial signatures, in no particular order.
    pub fn partials(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.sigs.values()
    }
}

/// Cache of partial signatures keyed by `(round, prev_sig)`, with a
/// per-signer eviction queue bounding memory against floods.
///
/// Owned exclusively by the aggregator loop; no locking.
#[derive(Debug, Default)]
pub struct PartialCache {
    rounds: HashMap<RoundId, RoundCache>,
    rcvd: HashMap<u32, VecDeque<RoundId>>,
}

impl PartialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a partial. When the signer's quota is exhausted and the partial
    /// would create a new bucket, the signer's oldest bucket entry is evicted
    /// first. Duplicate `(bucket, signer)` pairs are ignored.
    pub fn append(&mut self, partial: &PartialBeacon) {
        let Ok(index) = partial.signer_index() else {
            // unparsable partials never get past verification; nothing to track
            return;
        };
        let id = round_id(partial.round(), partial.previous_sig());

        if !self.rounds.contains_key(&id) {
            let queue = self.rcvd.entry(index).or_default();
            if queue.len() >= MAX_PARTIALS_PER_NODE {
                // this signer has too many live buckets - take the oldest off
                if let Some(evicted) = queue.pop_front() {
                    if let Some(bucket) = self.rounds.get_mut(&evicted) {
                        bucket.flush_index(index);
                        if bucket.is_empty() {
                            self.rounds.remove(&evicted);
                        }
                    }
                }
            }
            self.rounds.insert(
                id.clone(),
                RoundCache::new(partial.round(), partial.previous_sig().to_vec()),
            );
        }

        let bucket = self.rounds.get_mut(&id).expect("bucket inserted above");
        if !bucket.append(index, partial.partial_sig().to_vec()) {
            return;
        }
        self.rcvd.entry(index).or_default().push_back(id);
    }

    /// Bucket for `(round, prev_sig)` if it survived quota eviction.
    pub fn get_round_cache(&self, round: u64, previous_sig: &[u8]) -> Option<&RoundCache> {
        self.rounds.get(&round_id(round, previous_sig))
    }

    /// Drop every bucket with `round <= up_to` and the per-signer entries
    /// pointing at them.
    pub fn flush_rounds(&mut self, up_to: u64) {
        let flushed: Vec<RoundId> = self
            .rounds
            .iter()
            .filter(|(_, bucket)| bucket.round <= up_to)
            .map(|(id, _)| id.clone())
            .collect();
        for id in flushed {
            let Some(bucket) = self.rounds.remove(&id) else {
                continue;
            };
            for index in bucket.sigs.keys() {
                if let Some(queue) = self.rcvd.get_mut(index) {
                    queue.retain(|tracked| tracked != &bucket.id);
                }
            }
        }
        self.rcvd.retain(|_, queue| !queue.is_empty());
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::TestGroup;
    use lantern_crypto::sign_partial;

    fn partial(setup: &TestGroup, signer: u32, round: u64, prev: &[u8]) -> PartialBeacon {
        let msg = setup.group.scheme.digest_beacon(round, prev);
        let sig = sign_partial(setup.shares[signer as usize].secret(), signer, &msg);
        PartialBeacon::new(round, prev.to_vec(), sig)
    }

    #[test]
    fn duplicate_signer_is_ignored() {
        let setup = TestGroup::new(3, 2);
        let mut cache = PartialCache::new();
        let p = partial(&setup, 1, 5, &[7u8; 96]);
        cache.append(&p);
        cache.append(&p);
        let bucket = cache.get_round_cache(5, &[7u8; 96]).unwrap();
        assert_eq!(bucket.len(), 1);
        assert_eq!(cache.rcvd.get(&1).unwrap().len(), 1);
    }

    #[test]
    fn buckets_split_by_previous_sig() {
        let setup = TestGroup::new(3, 2);
        let mut cache = PartialCache::new();
        cache.append(&partial(&setup, 0, 5, &[1u8; 96]));
        cache.append(&partial(&setup, 1, 5, &[2u8; 96]));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_round_cache(5, &[1u8; 96]).unwrap().len(), 1);
        assert_eq!(cache.get_round_cache(5, &[2u8; 96]).unwrap().len(), 1);
    }

    // One signer floods distinct (round, prev_sig) combinations for the same
    // round: the cache keeps exactly the quota, oldest ids evicted.
    #[test]
    fn per_signer_flood_is_bounded() {
        let setup = TestGroup::new(3, 2);
        let mut cache = PartialCache::new();

        let flood = MAX_PARTIALS_PER_NODE + 10;
        let mut prevs = Vec::new();
        for i in 0..flood {
            let mut prev = vec![0u8; 96];
            prev[..8].copy_from_slice(&(i as u64).to_be_bytes());
            cache.append(&partial(&setup, 2, 42, &prev));
            prevs.push(prev);
        }

        assert_eq!(cache.len(), MAX_PARTIALS_PER_NODE);
        assert_eq!(cache.rcvd.get(&2).unwrap().len(), MAX_PARTIALS_PER_NODE);
        // the ten oldest buckets are gone
        for prev in prevs.iter().take(10) {
            assert!(cache.get_round_cache(42, prev).is_none());
        }
        for prev in prevs.iter().skip(10) {
            assert!(cache.get_round_cache(42, prev).is_some());
        }
    }

    // Flushing an already-stored round leaves future buckets untouched;
    // flushing past them empties the cache entirely.
    #[test]
    fn flush_only_drops_rounds_at_or_below() {
        let setup = TestGroup::new(25, 13);
        let mut cache = PartialCache::new();

        // rounds 11..=30, one partial each from signers 2..=21
        for (i, round) in (11u64..=30).enumerate() {
            let signer = (i + 2) as u32;
            cache.append(&partial(&setup, signer, round, &[0u8; 96]));
        }
        assert_eq!(cache.len(), 20);

        cache.flush_rounds(10);
        assert_eq!(cache.len(), 20);
        assert_eq!(cache.rcvd.get(&2).map(|queue| queue.len()), Some(1));

        cache.flush_rounds(30);
        assert!(cache.is_empty());
        assert!(cache.rcvd.is_empty());
    }

    #[test]
    fn eviction_drops_bucket_emptied_by_quota() {
        let setup = TestGroup::new(3, 2);
        let mut cache = PartialCache::new();

        // fill signer 0's quota with solo buckets
        for round in 0..MAX_PARTIALS_PER_NODE as u64 {
            cache.append(&partial(&setup, 0, round + 1, &[0u8; 96]));
        }
        assert_eq!(cache.len(), MAX_PARTIALS_PER_NODE);

        // one more new bucket evicts the signer's oldest, which held only
        // that signer and therefore disappears
        cache.append(&partial(&setup, 0, 1000, &[0u8; 96]));
        assert_eq!(cache.len(), MAX_PARTIALS_PER_NODE);
        assert!(cache.get_round_cache(1, &[0u8; 96]).is_none());
        assert!(cache.get_round_cache(1000, &[0u8; 96]).is_some());
    }
}

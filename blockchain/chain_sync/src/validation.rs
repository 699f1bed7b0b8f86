// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Error;
use lantern_beacon::Group;
use lantern_chain::{BeaconStore, ChainStore};
use lantern_db::Store;
use log::warn;

/// Verify the stored chain from round 1 up to `min(up_to, last)`.
///
/// Returns every round whose beacon is absent or fails verification against
/// the distributed public key. `progress` is invoked at rate-limited
/// intervals with `(checked_round, total)`.
pub fn check_past_beacons<DB, F>(
    store: &ChainStore<DB>,
    group: &Group,
    up_to: u64,
    mut progress: F,
) -> Result<Vec<u64>, Error>
where
    DB: Store + Send + Sync,
    F: FnMut(u64, u64),
{
    let last = store.last()?.round();
    let up_to = up_to.min(last);
    let public = group.public_key.public_key();
    let checkpoint = (up_to / 100).max(1);

    let mut faulty = Vec::new();
    let mut expected = 1u64;
    for res in store.cursor_from(1)? {
        let beacon = res?;
        if beacon.round() > up_to {
            break;
        }
        // cursor gaps are missing rounds
        while expected < beacon.round() {
            faulty.push(expected);
            expected += 1;
        }
        let msg = group
            .scheme
            .digest_beacon(beacon.round(), beacon.previous_sig());
        if lantern_crypto::verify_signature(&public, &msg, beacon.signature()).is_err() {
            warn!("beacon at round {} fails verification", beacon.round());
            faulty.push(beacon.round());
        }
        if beacon.round() % checkpoint == 0 {
            progress(beacon.round(), up_to);
        }
        expected = beacon.round() + 1;
    }
    while expected <= up_to {
        faulty.push(expected);
        expected += 1;
    }
    Ok(faulty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_beacon::mock::TestGroup;
    use lantern_beacon::{Beacon, ChainInfo};
    use lantern_clock::FakeClock;
    use lantern_db::MemoryDB;
    use std::sync::Arc;

    fn store_with_chain(setup: &TestGroup, up_to: u64) -> ChainStore<MemoryDB> {
        let info = ChainInfo::from_group(&setup.group);
        let clock = Arc::new(FakeClock::new(setup.group.genesis_time));
        let store = ChainStore::open(Arc::new(MemoryDB::default()), &info, clock).unwrap();
        for beacon in setup.chain_to(up_to).into_iter().skip(1) {
            store.put(beacon).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn clean_chain_has_no_faults() {
        let setup = TestGroup::new(3, 2);
        let store = store_with_chain(&setup, 8);
        let mut calls = 0;
        let faulty =
            check_past_beacons(&store, &setup.group, 8, |_, _| calls += 1).unwrap();
        assert!(faulty.is_empty());
        assert!(calls > 0);
    }

    #[tokio::test]
    async fn detects_corrupt_and_missing_rounds() {
        let setup = TestGroup::new(3, 2);
        let store = store_with_chain(&setup, 8);

        // corrupt round 3 in place, remove round 6 entirely
        let good = store.get(3).unwrap();
        let corrupt = Beacon::new(3, good.previous_sig().to_vec(), vec![5u8; 96]);
        store.insecure().put(corrupt).unwrap();
        store.del(6).unwrap();

        let faulty = check_past_beacons(&store, &setup.group, 8, |_, _| {}).unwrap();
        assert_eq!(faulty, vec![3, 6]);
    }

    #[tokio::test]
    async fn up_to_is_clamped_to_last() {
        let setup = TestGroup::new(3, 2);
        let store = store_with_chain(&setup, 4);
        let faulty = check_past_beacons(&store, &setup.group, 100, |_, _| {}).unwrap();
        assert!(faulty.is_empty());
    }
}

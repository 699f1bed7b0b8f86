// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Deterministic group fixtures used in tests across the workspace. The
//! trusted dealer stands in for the distributed key setup, which is outside
//! the core.

use crate::{Beacon, Group, GroupNode, Share, Vault};
use lantern_crypto::{self as crypto, SchemeId, SecretKeySet};
use rand::thread_rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

pub const MOCK_GENESIS_TIME: u64 = 1_600_000_000;
pub const MOCK_PERIOD: Duration = Duration::from_secs(2);

/// A dealer-generated group with every share, able to produce valid chains
/// without running any node.
pub struct TestGroup {
    pub group: Arc<Group>,
    pub shares: Vec<Share>,
    key_set: SecretKeySet,
}

impl TestGroup {
    pub fn new(n: usize, threshold: u16) -> Self {
        Self::with_scheme(n, threshold, SchemeId::Chained)
    }

    pub fn with_scheme(n: usize, threshold: u16, scheme: SchemeId) -> Self {
        Self::generate(n, threshold, scheme, MOCK_PERIOD, MOCK_GENESIS_TIME)
    }

    /// A group for a beacon id other than the default one.
    pub fn named(beacon_id: &str, n: usize, threshold: u16) -> Self {
        Self::build(
            beacon_id,
            n,
            threshold,
            SchemeId::Chained,
            MOCK_PERIOD,
            MOCK_GENESIS_TIME,
        )
    }

    pub fn generate(
        n: usize,
        threshold: u16,
        scheme: SchemeId,
        period: Duration,
        genesis_time: u64,
    ) -> Self {
        Self::build("default", n, threshold, scheme, period, genesis_time)
    }

    fn build(
        beacon_id: &str,
        n: usize,
        threshold: u16,
        scheme: SchemeId,
        period: Duration,
        genesis_time: u64,
    ) -> Self {
        let key_set = SecretKeySet::random(threshold as usize - 1, &mut thread_rng());
        let shares: Vec<Share> = (0..n)
            .map(|i| Share::new(i as u32, key_set.secret_key_share(i)))
            .collect();
        let nodes: Vec<GroupNode> = (0..n)
            .map(|i| GroupNode {
                index: i as u32,
                address: format!("node-{}:8080", i),
                tls: false,
            })
            .collect();
        let beacon_id = beacon_id.to_owned();
        let genesis_seed = Sha256::digest(beacon_id.as_bytes()).to_vec();
        let group = Arc::new(Group {
            beacon_id,
            nodes,
            threshold,
            period,
            genesis_time,
            transition_time: genesis_time,
            catchup_period: Duration::from_secs(1),
            genesis_seed,
            scheme,
            public_key: key_set.public_keys(),
        });
        Self {
            group,
            shares,
            key_set,
        }
    }

    /// A fresh copy of node `i`'s share.
    pub fn share(&self, i: u32) -> Share {
        Share::new(i, self.key_set.secret_key_share(i as usize))
    }

    /// A vault as node `i` would hold it.
    pub fn vault(&self, i: u32) -> Vault {
        Vault::new(self.share(i), Arc::clone(&self.group))
    }

    /// Full threshold signature over the message of `round`, as the network
    /// would produce it.
    pub fn sign_round(&self, round: u64, previous_sig: &[u8]) -> Vec<u8> {
        let msg = self.group.scheme.digest_beacon(round, previous_sig);
        let partials: Vec<Vec<u8>> = (0..self.group.threshold as u32)
            .map(|i| crypto::sign_partial(self.shares[i as usize].secret(), i, &msg))
            .collect();
        crypto::recover(&self.group.public_key, partials.iter())
            .expect("dealer shares always recover")
            .to_bytes()
            .to_vec()
    }

    /// A valid chain from genesis up to and including `up_to`.
    pub fn chain_to(&self, up_to: u64) -> Vec<Beacon> {
        let mut chain = vec![Beacon::genesis(&self.group.genesis_seed)];
        for round in 1..=up_to {
            let prev = chain.last().expect("genesis pushed above").signature();
            let prev = prev.to_vec();
            let sig = self.sign_round(round, &prev);
            let stored_prev = if self.group.scheme.is_chained() {
                prev
            } else {
                Vec::new()
            };
            chain.push(Beacon::new(round, stored_prev, sig));
        }
        chain
    }
}

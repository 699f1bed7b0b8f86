// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lantern_crypto::{PublicKeySet, SchemeId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One participant of the group. The index identifies the signer's share;
/// indices are dense in `[0, n)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNode {
    pub index: u32,
    pub address: String,
    pub tls: bool,
}

/// A snapshot of the working group of a beacon network, produced by the
/// distributed key setup and immutable until the next transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Canonical beacon id this group serves.
    pub beacon_id: String,
    /// Participants, ordered by share index.
    pub nodes: Vec<GroupNode>,
    /// Number of partials required to recover a round signature.
    pub threshold: u16,
    /// Time between entries.
    #[serde(with = "crate::serde_secs")]
    pub period: Duration,
    /// Genesis time of the network.
    pub genesis_time: u64,
    /// Time at which this group takes over from the previous one.
    pub transition_time: u64,
    /// Grace period before re-broadcasting on top of a late beacon.
    #[serde(with = "crate::serde_secs")]
    pub catchup_period: Duration,
    /// Genesis seed of the network.
    #[serde(with = "hex::serde")]
    pub genesis_seed: Vec<u8>,
    /// How round messages are derived.
    pub scheme: SchemeId,
    /// Public commitments of the distributed key; share `i` verifies against
    /// `public_key.public_key_share(i)`.
    pub public_key: PublicKeySet,
}

impl Group {
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: u32) -> Option<&GroupNode> {
        self.nodes.iter().find(|n| n.index == index)
    }

    pub fn node_by_address(&self, address: &str) -> Option<&GroupNode> {
        self.nodes.iter().find(|n| n.address == address)
    }

    pub fn contains_index(&self, index: u32) -> bool {
        (index as usize) < self.nodes.len()
    }

    /// Addresses of every node except `own`.
    pub fn peer_addresses(&self, own: &str) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.address != own)
            .map(|n| n.address.clone())
            .collect()
    }

    pub fn threshold_count(&self) -> usize {
        self.threshold as usize
    }

    pub fn validate(&self) -> Result<(), String> {
        let n = self.nodes.len();
        if self.threshold < minimum_threshold(n) {
            return Err("invalid threshold".to_owned());
        }
        if self.genesis_time == 0 {
            return Err("genesis time is zero".to_owned());
        }
        if self.period.as_secs() == 0 {
            return Err("period time is zero".to_owned());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.index as usize != i {
                return Err(format!("node indices are not dense at {}", i));
            }
        }
        if self.public_key.threshold() + 1 != self.threshold as usize {
            return Err("distributed key does not match the group threshold".to_owned());
        }
        Ok(())
    }
}

#[inline]
pub fn minimum_threshold(n: usize) -> u16 {
    //	return int(math.Floor(float64(n)/2.0) + 1)
    ((n as f64 / 2.0).floor() + 1.0) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::TestGroup;

    #[test]
    fn minimum_threshold_is_majority() {
        assert_eq!(minimum_threshold(3), 2);
        assert_eq!(minimum_threshold(4), 3);
        assert_eq!(minimum_threshold(5), 3);
    }

    #[test]
    fn generated_group_validates() {
        let setup = TestGroup::new(4, 3);
        assert_eq!(setup.group.validate(), Ok(()));
        assert_eq!(setup.group.size(), 4);
        assert!(setup.group.contains_index(3));
        assert!(!setup.group.contains_index(4));
    }

    #[test]
    fn peer_addresses_skip_own() {
        let setup = TestGroup::new(3, 2);
        let own = setup.group.nodes[0].address.clone();
        let peers = setup.group.peer_addresses(&own);
        assert_eq!(peers.len(), 2);
        assert!(!peers.contains(&own));
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lantern_beacon::{Beacon, PartialBeacon};
use serde::{Deserialize, Serialize};

/// Version triple carried in packet metadata, for operator diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Envelope data on every packet. The beacon id discriminates chains when a
/// process multiplexes several of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub beacon_id: String,
    pub node_version: NodeVersion,
}

impl Metadata {
    pub fn for_beacon(beacon_id: impl Into<String>) -> Self {
        Self {
            beacon_id: beacon_id.into(),
            node_version: NodeVersion {
                major: 0,
                minor: 2,
                patch: 0,
            },
        }
    }
}

/// A partial signature in flight between two nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBeaconPacket {
    pub round: u64,
    #[serde(with = "serde_bytes")]
    pub previous_sig: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub partial_sig: Vec<u8>,
    pub metadata: Metadata,
}

impl PartialBeaconPacket {
    pub fn new(partial: &PartialBeacon, beacon_id: &str) -> Self {
        Self {
            round: partial.round(),
            previous_sig: partial.previous_sig().to_vec(),
            partial_sig: partial.partial_sig().to_vec(),
            metadata: Metadata::for_beacon(beacon_id),
        }
    }

    pub fn into_partial(self) -> PartialBeacon {
        PartialBeacon::new(self.round, self.previous_sig, self.partial_sig)
    }
}

/// A full beacon in flight, as served by sync streams.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconPacket {
    pub round: u64,
    #[serde(with = "serde_bytes")]
    pub previous_sig: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    pub metadata: Metadata,
}

impl BeaconPacket {
    pub fn new(beacon: &Beacon, beacon_id: &str) -> Self {
        Self {
            round: beacon.round(),
            previous_sig: beacon.previous_sig().to_vec(),
            signature: beacon.signature().to_vec(),
            metadata: Metadata::for_beacon(beacon_id),
        }
    }

    pub fn into_beacon(self) -> Beacon {
        Beacon::new(self.round, self.previous_sig, self.signature)
    }
}

/// Opens a sync stream. `from_round = 0` asks the server to send its last
/// beacon and then follow live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub from_round: u64,
    pub metadata: Metadata,
}

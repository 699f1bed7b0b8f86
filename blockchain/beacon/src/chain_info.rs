// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Group;
use byteorder::{BigEndian, ByteOrder};
use lantern_crypto::{PublicKeySet, SchemeId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Contains all the public info about a beacon chain. Derived from the group
/// at setup and never mutated by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    #[serde(with = "crate::serde_secs")]
    pub period: Duration,
    pub genesis_time: u64,
    #[serde(with = "hex::serde")]
    pub genesis_seed: Vec<u8>,
    pub scheme: SchemeId,
    pub public_key: PublicKeySet,
    pub id: String,
}

impl ChainInfo {
    pub fn from_group(group: &Group) -> Self {
        Self {
            period: group.period,
            genesis_time: group.genesis_time,
            genesis_seed: group.genesis_seed.clone(),
            scheme: group.scheme,
            public_key: group.public_key.clone(),
            id: group.beacon_id.clone(),
        }
    }

    /// Canonical chain identifier, used to discriminate chains in logs and
    /// stream metadata.
    pub fn hash(&self) -> Vec<u8> {
        let mut header = [0; 16];
        BigEndian::write_u64(&mut header[..8], self.period.as_secs());
        BigEndian::write_u64(&mut header[8..], self.genesis_time);
        let mut buf = header.to_vec();
        buf.extend_from_slice(&self.genesis_seed);
        buf.extend_from_slice(self.scheme.as_str().as_bytes());
        buf.extend_from_slice(self.id.as_bytes());
        Sha256::digest(&buf).to_vec()
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One entry of the randomness chain: a round number and the threshold
/// signature produced for it. Entries are immutable once stored; only an
/// explicit resync may replace one.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    round: u64,
    #[serde(with = "serde_bytes")]
    previous_sig: Vec<u8>,
    #[serde(with = "serde_bytes")]
    signature: Vec<u8>,
}

impl Beacon {
    pub fn new(round: u64, previous_sig: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            round,
            previous_sig,
            signature,
        }
    }

    /// The genesis entry: round 0, signed by nobody, carrying the chain seed.
    pub fn genesis(seed: &[u8]) -> Self {
        Self {
            round: 0,
            previous_sig: Vec::new(),
            signature: seed.to_vec(),
        }
    }

    /// Returns the round number of this entry.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Signature of the previous entry; empty at genesis and on unchained
    /// schemes.
    pub fn previous_sig(&self) -> &[u8] {
        &self.previous_sig
    }

    /// The threshold signature over this round's message.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn is_genesis(&self) -> bool {
        self.round == 0
    }

    /// The public random value of this round, `H(signature)`.
    pub fn randomness(&self) -> Vec<u8> {
        Sha256::digest(&self.signature).to_vec()
    }

    /// Drops the previous-signature link. Unchained chains store entries
    /// without it.
    pub fn clear_previous_sig(&mut self) {
        self.previous_sig.clear();
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lantern_crypto::{self as crypto, Error as CryptoError};
use serde::{Deserialize, Serialize};

/// A single node's contribution to one round: a BLS signature share over the
/// round's message. The signer index is embedded in `partial_sig`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBeacon {
    round: u64,
    #[serde(with = "serde_bytes")]
    previous_sig: Vec<u8>,
    #[serde(with = "serde_bytes")]
    partial_sig: Vec<u8>,
}

impl PartialBeacon {
    pub fn new(round: u64, previous_sig: Vec<u8>, partial_sig: Vec<u8>) -> Self {
        Self {
            round,
            previous_sig,
            partial_sig,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn previous_sig(&self) -> &[u8] {
        &self.previous_sig
    }

    pub fn partial_sig(&self) -> &[u8] {
        &self.partial_sig
    }

    /// Index of the share that produced this partial.
    pub fn signer_index(&self) -> Result<u32, CryptoError> {
        crypto::signer_index(&self.partial_sig)
    }
}

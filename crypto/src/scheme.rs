// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Error;
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Scheme id of chains whose beacons sign over the previous signature.
pub const CHAINED_SCHEME_ID: &str = "pedersen-bls-chained";
/// Scheme id of chains whose beacons sign over the round number alone.
pub const UNCHAINED_SCHEME_ID: &str = "pedersen-bls-unchained";

/// How the message of a round is derived, fixed per beacon id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SchemeId {
    #[default]
    Chained,
    Unchained,
}

impl SchemeId {
    pub fn is_chained(self) -> bool {
        matches!(self, SchemeId::Chained)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemeId::Chained => CHAINED_SCHEME_ID,
            SchemeId::Unchained => UNCHAINED_SCHEME_ID,
        }
    }

    /// Message signed for `round`.
    ///
    /// Chained: `H(prev_sig || round_be)`. Unchained: `H(round_be)`.
    pub fn digest_beacon(self, round: u64, previous_sig: &[u8]) -> Vec<u8> {
        let mut msg: Vec<u8> = Vec::with_capacity(previous_sig.len() + 8);
        if self.is_chained() {
            msg.extend_from_slice(previous_sig);
        }
        let mut buf = [0; 8];
        BigEndian::write_u64(&mut buf, round);
        msg.extend_from_slice(&buf);
        Sha256::digest(&msg).to_vec()
    }
}

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            CHAINED_SCHEME_ID => Ok(SchemeId::Chained),
            UNCHAINED_SCHEME_ID => Ok(SchemeId::Unchained),
            other => Err(Error::UnknownScheme(other.to_owned())),
        }
    }
}

impl Serialize for SchemeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SchemeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        let id: String = Deserialize::deserialize(deserializer)?;
        SchemeId::from_str(&id).map_err(serde::de::Error::custom)
    }
}

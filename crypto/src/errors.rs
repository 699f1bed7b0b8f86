// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

/// Crypto error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A partial signature did not verify against its signer's key share.
    #[error("Invalid partial signature")]
    InvalidPartial,
    /// A recovered signature did not verify against the distributed public key.
    #[error("Invalid recovered signature")]
    InvalidRecovered,
    /// The signer index embedded in a partial is not part of the group.
    #[error("Signer index {0} is not part of the group")]
    BadIndex(u32),
    /// Threshold recovery could not produce a signature.
    #[error("Threshold recovery failed: {0}")]
    RecoveryFailed(String),
    /// A partial signature is too short to carry an index and a share.
    #[error("Partial signature truncated ({0} bytes)")]
    TruncatedPartial(usize),
    /// Signature bytes are not a valid curve point encoding.
    #[error("Malformed signature bytes: {0}")]
    MalformedSignature(String),
    /// Unknown scheme identifier in configuration or group data.
    #[error("Unknown scheme id: {0}")]
    UnknownScheme(String),
}

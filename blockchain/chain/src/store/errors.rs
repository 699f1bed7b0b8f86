// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lantern_db::Error as DbErr;
use thiserror::Error;

/// Chain store error
#[derive(Debug, Error)]
pub enum Error {
    /// A put would create a gap or rewind the chain.
    #[error("Invalid round inserted: last stored {last}, new {new}")]
    InvalidRound { last: u64, new: u64 },
    /// Chained mode only: the previous signature does not link to the last
    /// stored beacon.
    #[error("Previous signature does not link to the chain at round {round}")]
    PrevSigMismatch { round: u64 },
    /// A different beacon is already stored for this round.
    #[error("Conflicting beacon already stored for round {round}")]
    DuplicateDifferent { round: u64 },
    /// A byte-identical beacon is already stored for this round. Absorbed
    /// into success by the outermost layer; retried puts are idempotent.
    #[error("Beacon already stored for round {round}")]
    AlreadyStored { round: u64 },
    /// Round is not on the chain.
    #[error("No beacon stored for round {round}")]
    NotFound { round: u64 },
    /// The genesis beacon on disk disagrees with the configured seed.
    #[error("Genesis beacon on disk does not match the configured chain")]
    GenesisMismatch,
    /// Error originating from the key-value store.
    #[error(transparent)]
    KeyValueStore(#[from] DbErr),
    /// Error originating from encoding arbitrary data.
    #[error("Error originating from encoding: {0}")]
    Encoding(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_cbor::Error> for Error {
    fn from(e: serde_cbor::Error) -> Error {
        Error::Encoding(e.to_string())
    }
}

impl Error {
    /// True for the benign outcome of retrying an already-stored round.
    pub fn is_already_stored(&self) -> bool {
        matches!(self, Error::AlreadyStored { .. })
    }
}

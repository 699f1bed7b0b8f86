// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lantern_chain::Error as StoreErr;
use lantern_crypto::Error as CryptoErr;
use lantern_net::Error as NetErr;
use thiserror::Error;

/// Beacon engine error
#[derive(Debug, Error)]
pub enum Error {
    /// A packet arrived for a chain this node does not serve.
    #[error("Packet for beacon id {got:?}, this node serves {want:?}")]
    WrongBeaconId { got: String, want: String },
    /// Partial more than one round ahead of the wall clock.
    #[error("Partial for round {round} is out of round (next round is {next})")]
    OutOfRound { round: u64, next: u64 },
    /// The embedded signer index is not part of the current group.
    #[error("Signer index {0} is not in the current group")]
    UnknownSigner(u32),
    /// Server-side: asked for rounds that are not on the chain yet.
    #[error("Cannot serve rounds from {from}: last stored round is {last}")]
    NotEnoughBeacons { from: u64, last: u64 },
    /// Client-side: every candidate peer failed or ran dry.
    #[error("All peers failed to provide the requested rounds")]
    AllPeersFailed,
    /// A sync request carried no usable peer.
    #[error("No peers available to sync from")]
    NoSyncPeers,
    /// `start` was called after genesis; the caller should use catchup.
    #[error("Started after genesis time {genesis} (now {now}), use catchup")]
    StartedAfterGenesis { genesis: u64, now: u64 },
    #[error("Handler already started")]
    AlreadyStarted,
    /// The handler is not serving requests (not started, or transitioning).
    #[error("Handler is not running")]
    NotRunning,
    #[error("Handler stopped")]
    Stopped,
    /// The group snapshot failed validation.
    #[error("Invalid group: {0}")]
    InvalidGroup(String),
    /// Error indicating a chain store error.
    #[error(transparent)]
    Store(#[from] StoreErr),
    /// Error originating from the threshold scheme.
    #[error(transparent)]
    Crypto(#[from] CryptoErr),
    /// Error originating from the peer transport.
    #[error(transparent)]
    Net(#[from] NetErr),
}

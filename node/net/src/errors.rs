// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

/// Transport error
#[derive(Debug, Error)]
pub enum Error {
    /// No route to the given address.
    #[error("Peer {0} is unreachable")]
    Unreachable(String),
    /// The remote rejected the request at the protocol level.
    #[error("Peer rejected request: {0}")]
    Rejected(String),
    /// The underlying stream or channel closed mid-request.
    #[error("Connection closed")]
    ConnectionClosed,
    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

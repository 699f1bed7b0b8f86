// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{BeaconPacket, Error, PartialBeaconPacket, SyncRequest};
use async_trait::async_trait;

/// A sync stream: beacons arrive in order until the sender drops the
/// channel, which the receiver observes as a disconnect.
pub type BeaconStream = flume::Receiver<BeaconPacket>;

/// Client side of the peer protocol, implemented by the concrete transport.
/// The core only ever talks to peers through this trait.
#[async_trait]
pub trait BeaconTransport: Send + Sync + 'static {
    /// Deliver one partial signature to a peer. Fire-and-forget semantics;
    /// failures are surfaced but never fatal.
    async fn partial_beacon(&self, addr: &str, packet: PartialBeaconPacket) -> Result<(), Error>;

    /// Open a sync stream against a peer.
    async fn sync_chain(&self, addr: &str, request: SyncRequest) -> Result<BeaconStream, Error>;
}

/// Server side of the peer protocol, implemented by the node handler and
/// registered with the concrete transport.
#[async_trait]
pub trait BeaconService: Send + Sync + 'static {
    /// A peer delivered one partial signature.
    async fn partial_beacon(&self, from: &str, packet: PartialBeaconPacket) -> Result<(), Error>;

    /// A peer opened a sync stream; serve beacons into `out` until it
    /// disconnects. Returning closes the stream.
    async fn sync_chain(
        &self,
        from: &str,
        request: SyncRequest,
        out: flume::Sender<BeaconPacket>,
    ) -> Result<(), Error>;
}

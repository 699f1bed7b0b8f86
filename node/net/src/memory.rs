// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{
    BeaconPacket, BeaconService, BeaconStream, BeaconTransport, Error, PartialBeaconPacket,
    SyncRequest,
};
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Buffered packets per in-process sync stream.
const STREAM_BUFFER: usize = 16;

/// An in-process transport routing packets between registered services by
/// address. Used by the test harness and local multi-beacon setups; dropping
/// a node from the registry simulates a network partition.
#[derive(Default, Clone)]
pub struct MemoryRouter {
    nodes: Arc<RwLock<HashMap<String, Arc<dyn BeaconService>>>>,
}

impl MemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, addr: impl Into<String>, service: Arc<dyn BeaconService>) {
        self.nodes.write().insert(addr.into(), service);
    }

    /// Remove a node from the routing table; packets to it fail until it is
    /// registered again.
    pub fn unregister(&self, addr: &str) -> bool {
        self.nodes.write().remove(addr).is_some()
    }

    /// The transport handle a node at `addr` uses to reach its peers.
    pub fn endpoint(&self, addr: impl Into<String>) -> MemoryTransport {
        MemoryTransport {
            local_addr: addr.into(),
            router: self.clone(),
        }
    }

    fn service(&self, addr: &str) -> Result<Arc<dyn BeaconService>, Error> {
        self.nodes
            .read()
            .get(addr)
            .cloned()
            .ok_or_else(|| Error::Unreachable(addr.to_owned()))
    }
}

/// One node's view of a [MemoryRouter].
#[derive(Clone)]
pub struct MemoryTransport {
    local_addr: String,
    router: MemoryRouter,
}

impl MemoryTransport {
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }
}

#[async_trait]
impl BeaconTransport for MemoryTransport {
    async fn partial_beacon(&self, addr: &str, packet: PartialBeaconPacket) -> Result<(), Error> {
        let service = self.router.service(addr)?;
        service.partial_beacon(&self.local_addr, packet).await
    }

    async fn sync_chain(&self, addr: &str, request: SyncRequest) -> Result<BeaconStream, Error> {
        let service = self.router.service(addr)?;
        let (tx, rx) = flume::bounded(STREAM_BUFFER);
        let from = self.local_addr.clone();
        tokio::spawn(async move {
            if let Err(e) = service.sync_chain(&from, request, tx).await {
                debug!("sync stream for {} ended: {}", from, e);
            }
        });
        Ok(rx)
    }
}

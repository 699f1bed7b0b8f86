// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Handler;
use async_trait::async_trait;
use lantern_db::Store;
use lantern_net::{BeaconPacket, BeaconService, Error as NetError, PartialBeaconPacket, SyncRequest};
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One process can serve several chains at once; this registry routes
/// inbound peer traffic to the handler serving the packet's beacon id and
/// is what gets registered with the transport.
#[derive(Default)]
pub struct BeaconProcess<DB> {
    beacons: RwLock<HashMap<String, Arc<Handler<DB>>>>,
}

impl<DB: Store + Send + Sync + 'static> BeaconProcess<DB> {
    pub fn new() -> Self {
        Self {
            beacons: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler under its beacon id, replacing any previous one.
    pub fn add_beacon(&self, handler: Arc<Handler<DB>>) {
        self.beacons
            .write()
            .insert(handler.beacon_id().to_owned(), handler);
    }

    pub fn beacon(&self, beacon_id: &str) -> Option<Arc<Handler<DB>>> {
        self.beacons.read().get(beacon_id).cloned()
    }

    pub fn beacon_ids(&self) -> Vec<String> {
        self.beacons.read().keys().cloned().collect()
    }

    /// Stop and drop the handler for `beacon_id`.
    pub fn remove_beacon(&self, beacon_id: &str) -> bool {
        match self.beacons.write().remove(beacon_id) {
            Some(handler) => {
                handler.stop();
                true
            }
            None => false,
        }
    }

    /// Stop every handler; the registry stays usable for re-registration.
    pub fn stop_all(&self) {
        for handler in self.beacons.write().drain().map(|(_, h)| h) {
            handler.stop();
        }
    }

    fn dispatch(&self, beacon_id: &str) -> Result<Arc<Handler<DB>>, NetError> {
        self.beacon(beacon_id).ok_or_else(|| {
            debug!("no handler registered for beacon id {:?}", beacon_id);
            NetError::Rejected(format!("unknown beacon id {:?}", beacon_id))
        })
    }
}

#[async_trait]
impl<DB: Store + Send + Sync + 'static> BeaconService for BeaconProcess<DB> {
    async fn partial_beacon(&self, from: &str, packet: PartialBeaconPacket) -> Result<(), NetError> {
        let handler = self.dispatch(&packet.metadata.beacon_id)?;
        handler.partial_beacon(from, packet).await
    }

    async fn sync_chain(
        &self,
        from: &str,
        request: SyncRequest,
        out: flume::Sender<BeaconPacket>,
    ) -> Result<(), NetError> {
        let handler = self.dispatch(&request.metadata.beacon_id)?;
        handler.sync_chain(from, request, out).await
    }
}

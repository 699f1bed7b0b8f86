// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::SyncSender;
use lantern_beacon::{Beacon, Vault};
use lantern_chain::{BeaconStore, ChainStore};
use lantern_clock::RoundInfo;
use lantern_db::Store;
use log::{debug, error, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Owns the chain store for writes on the aggregation path. Consumes
/// aggregated beacons and ticks, appends what links to the chain, requests
/// a sync whenever a gap shows up, and publishes appended beacons for fast
/// catch-up.
pub(crate) struct ChainLoop<DB> {
    store: Arc<ChainStore<DB>>,
    vault: Arc<Vault>,
    own_addr: String,
    chained: bool,
    aggregated_rx: flume::Receiver<Beacon>,
    ticks_rx: flume::Receiver<RoundInfo>,
    sync: SyncSender,
    catchup_tx: flume::Sender<Beacon>,
    done: flume::Receiver<()>,
}

impl<DB: Store + Send + Sync + 'static> ChainLoop<DB> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<ChainStore<DB>>,
        vault: Arc<Vault>,
        own_addr: String,
        aggregated_rx: flume::Receiver<Beacon>,
        ticks_rx: flume::Receiver<RoundInfo>,
        sync: SyncSender,
        catchup_tx: flume::Sender<Beacon>,
        done: flume::Receiver<()>,
    ) -> Self {
        let chained = vault.scheme().is_chained();
        Self {
            store,
            vault,
            own_addr,
            chained,
            aggregated_rx,
            ticks_rx,
            sync,
            catchup_tx,
            done,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    aggregated = self.aggregated_rx.recv_async() => match aggregated {
                        Ok(beacon) => self.on_aggregated(beacon),
                        Err(_) => break,
                    },
                    tick = self.ticks_rx.recv_async() => match tick {
                        Ok(tick) => self.on_tick(tick),
                        Err(_) => break,
                    },
                    _ = self.done.recv_async() => break,
                }
            }
            debug!("chain loop stopped");
        })
    }

    fn appendable(&self, last: &Beacon, beacon: &Beacon) -> bool {
        beacon.round() == last.round() + 1
            && (!self.chained || last.signature() == beacon.previous_sig())
    }

    fn on_aggregated(&self, beacon: Beacon) {
        let last = match self.store.last() {
            Ok(last) => last,
            Err(e) => {
                error!("loading last beacon: {}", e);
                return;
            }
        };
        if self.appendable(&last, &beacon) {
            match self.store.put(beacon.clone()) {
                Ok(()) => {
                    // fast catch-up signal, dropped when the buffer is full
                    let _ = self.catchup_tx.try_send(beacon);
                }
                // the round will come back through sync from peers
                Err(e) => warn!("storing aggregated round {}: {}", beacon.round(), e),
            }
        } else if beacon.round() > last.round() + 1 {
            debug!(
                "aggregated round {} is ahead of chain at {}, requesting sync",
                beacon.round(),
                last.round()
            );
            self.request_sync(beacon.round());
        } else {
            debug!(
                "dropping aggregated round {} behind chain at {}",
                beacon.round(),
                last.round()
            );
        }
    }

    fn on_tick(&self, tick: RoundInfo) {
        let last = match self.store.last() {
            Ok(last) => last,
            Err(e) => {
                error!("loading last beacon: {}", e);
                return;
            }
        };
        if last.round() + 1 < tick.round {
            debug!(
                "chain at {} while ticker reached {}, requesting sync",
                last.round(),
                tick.round
            );
            self.request_sync(tick.round);
        }
    }

    fn request_sync(&self, up_to: u64) {
        let peers = self.vault.group().peer_addresses(&self.own_addr);
        self.sync.request_sync(0, up_to, peers);
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{metrics, Error};
use lantern_beacon::Vault;
use lantern_chain::{BeaconStore, ChainStore};
use lantern_clock::Clock;
use lantern_db::Store;
use lantern_net::{BeaconTransport, Metadata, SyncRequest};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A sync task is considered healthy while it stored a round within
/// `FACTOR x period`; an ordinary request arriving meanwhile is ignored.
pub const FACTOR: u32 = 2;

/// Pause between the two attempts of a forced resync.
pub const MAX_SYNC_WAIT: Duration = Duration::from_secs(2);

const REQUEST_QUEUE: usize = 16;

/// A request to fetch rounds from peers. `from = 0` continues from the last
/// stored round; a non-zero `from` forces a resync that overwrites from
/// exactly that round through the insecure store.
#[derive(Clone, Debug)]
pub struct SyncRequestMsg {
    pub from: u64,
    pub up_to: u64,
    pub peers: Vec<String>,
}

impl SyncRequestMsg {
    fn is_resync(&self) -> bool {
        self.from > 0
    }
}

/// Handle used by the chain loop and the handler to submit sync requests.
#[derive(Clone)]
pub struct SyncSender(flume::Sender<SyncRequestMsg>);

impl SyncSender {
    pub fn request_sync(&self, from: u64, up_to: u64, peers: Vec<String>) {
        let msg = SyncRequestMsg { from, up_to, peers };
        if self.0.try_send(msg).is_err() {
            debug!("sync request queue full, dropping request to {}", up_to);
        }
    }
}

/// Everything a sync task needs; cheap to clone into spawned tasks.
pub(crate) struct SyncWorker<DB> {
    pub store: Arc<ChainStore<DB>>,
    pub vault: Arc<Vault>,
    pub transport: Arc<dyn BeaconTransport>,
    pub clock: Arc<dyn Clock>,
    pub own_addr: String,
}

impl<DB> Clone for SyncWorker<DB> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            vault: Arc::clone(&self.vault),
            transport: Arc::clone(&self.transport),
            clock: Arc::clone(&self.clock),
            own_addr: self.own_addr.clone(),
        }
    }
}

impl<DB: Store + Send + Sync + 'static> SyncWorker<DB> {
    /// Run one sync request to completion, retrying a forced resync once
    /// after an all-peers failure.
    pub(crate) async fn run(
        &self,
        req: &SyncRequestMsg,
        cancel: &flume::Receiver<()>,
        progress: &AtomicU64,
    ) -> Result<(), Error> {
        let attempts = if req.is_resync() { 2 } else { 1 };
        let mut last_err = Error::AllPeersFailed;
        for attempt in 0..attempts {
            if attempt > 0 {
                warn!("resync to {} failed on all peers, retrying once", req.up_to);
                self.clock.sleep(MAX_SYNC_WAIT).await;
            }
            match self.sync_once(req, cancel, progress).await {
                Ok(()) => {
                    info!("sync up to round {} finished", req.up_to);
                    return Ok(());
                }
                Err(Error::Stopped) => return Err(Error::Stopped),
                Err(e) => last_err = e,
            }
        }
        metrics::SYNC_FAILURE_TOTAL.inc();
        Err(last_err)
    }

    async fn sync_once(
        &self,
        req: &SyncRequestMsg,
        cancel: &flume::Receiver<()>,
        progress: &AtomicU64,
    ) -> Result<(), Error> {
        let mut peers: Vec<&String> = req
            .peers
            .iter()
            .filter(|addr| **addr != self.own_addr)
            .collect();
        if peers.is_empty() {
            return Err(Error::NoSyncPeers);
        }
        peers.shuffle(&mut rand::thread_rng());

        for peer in peers {
            match self.sync_from_peer(peer, req, cancel, progress).await {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(
                    "stream from {} ended before round {}, trying next peer",
                    peer, req.up_to
                ),
                Err(Error::Stopped) => return Err(Error::Stopped),
                Err(e) => debug!("sync with peer {} failed: {}", peer, e),
            }
        }
        Err(Error::AllPeersFailed)
    }

    /// Returns `Ok(true)` once the target round is stored, `Ok(false)` when
    /// the peer's stream ended early.
    async fn sync_from_peer(
        &self,
        peer: &str,
        req: &SyncRequestMsg,
        cancel: &flume::Receiver<()>,
        progress: &AtomicU64,
    ) -> Result<bool, Error> {
        let group = self.vault.group();
        let from = if req.is_resync() {
            req.from
        } else {
            self.store.last()?.round() + 1
        };
        debug!("requesting rounds {}.. from {}", from, peer);
        let stream = self
            .transport
            .sync_chain(
                peer,
                SyncRequest {
                    from_round: from,
                    metadata: Metadata::for_beacon(&group.beacon_id),
                },
            )
            .await?;

        let public = group.public_key.public_key();
        loop {
            let packet = tokio::select! {
                res = stream.recv_async() => match res {
                    Ok(packet) => packet,
                    Err(_) => return Ok(false),
                },
                // the manager dropped the cancel sender: superseded or stopping
                _ = cancel.recv_async() => return Err(Error::Stopped),
            };
            if packet.metadata.beacon_id != group.beacon_id {
                return Err(Error::WrongBeaconId {
                    got: packet.metadata.beacon_id,
                    want: group.beacon_id.clone(),
                });
            }
            let msg = group
                .scheme
                .digest_beacon(packet.round, &packet.previous_sig);
            lantern_crypto::verify_signature(&public, &msg, &packet.signature)?;

            let round = packet.round;
            let beacon = packet.into_beacon();
            if req.is_resync() {
                self.store.insecure().put(beacon)?;
            } else {
                self.store.put(beacon)?;
            }
            progress.store(self.clock.now_millis(), Ordering::Relaxed);
            if req.up_to > 0 && round >= req.up_to {
                return Ok(true);
            }
        }
    }

    /// Forced overwrite of a single round, used by chain correction.
    pub(crate) async fn resync_round(&self, round: u64, peers: &[String]) -> Result<(), Error> {
        let req = SyncRequestMsg {
            from: round,
            up_to: round,
            peers: peers.to_vec(),
        };
        // no external cancellation: keep a sender alive for the duration
        let (_cancel_tx, cancel_rx) = flume::bounded(1);
        let progress = AtomicU64::new(self.clock.now_millis());
        self.run(&req, &cancel_rx, &progress).await
    }
}

struct SyncTask {
    handle: JoinHandle<()>,
    // dropping this cancels the task
    _cancel: flume::Sender<()>,
    target: u64,
    progress: Arc<AtomicU64>,
}

/// Client-side sync manager. One sync task at a time; new requests are
/// coalesced, a healthy task is never superseded by an ordinary request with
/// a lower or equal target.
pub(crate) struct SyncManager<DB> {
    worker: SyncWorker<DB>,
    requests_rx: flume::Receiver<SyncRequestMsg>,
    done: flume::Receiver<()>,
}

impl<DB: Store + Send + Sync + 'static> SyncManager<DB> {
    pub(crate) fn new(
        worker: SyncWorker<DB>,
        done: flume::Receiver<()>,
    ) -> (Self, SyncSender) {
        let (tx, requests_rx) = flume::bounded(REQUEST_QUEUE);
        (
            Self {
                worker,
                requests_rx,
                done,
            },
            SyncSender(tx),
        )
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut current: Option<SyncTask> = None;
            loop {
                tokio::select! {
                    req = self.requests_rx.recv_async() => match req {
                        Ok(req) => self.handle_request(req, &mut current),
                        Err(_) => break,
                    },
                    _ = self.done.recv_async() => break,
                }
            }
            if let Some(task) = current {
                task.handle.abort();
            }
            debug!("sync manager stopped");
        })
    }

    fn handle_request(&self, req: SyncRequestMsg, current: &mut Option<SyncTask>) {
        let last = match self.worker.store.last() {
            Ok(b) => b,
            Err(e) => {
                warn!("cannot load last beacon for sync request: {}", e);
                return;
            }
        };
        if req.up_to > 0 && last.round() >= req.up_to {
            debug!(
                "dropping sync request to {}: already at {}",
                req.up_to,
                last.round()
            );
            return;
        }

        if let Some(task) = current.as_ref() {
            if !task.handle.is_finished() {
                if !req.is_resync() {
                    let elapsed = self
                        .worker
                        .clock
                        .now_millis()
                        .saturating_sub(task.progress.load(Ordering::Relaxed));
                    let window =
                        FACTOR as u128 * self.worker.vault.group().period.as_millis();
                    if (elapsed as u128) < window && req.up_to <= task.target {
                        debug!("sync task to {} is healthy, ignoring request", task.target);
                        return;
                    }
                }
                debug!("superseding running sync task");
                task.handle.abort();
            }
        }

        let progress = Arc::new(AtomicU64::new(self.worker.clock.now_millis()));
        let (cancel_tx, cancel_rx) = flume::bounded(1);
        let worker = self.worker.clone();
        let target = req.up_to;
        let task_progress = Arc::clone(&progress);
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.run(&req, &cancel_rx, &task_progress).await {
                warn!("sync task to {} failed: {}", req.up_to, e);
            }
        });
        *current = Some(SyncTask {
            handle,
            _cancel: cancel_tx,
            target,
            progress,
        });
    }
}

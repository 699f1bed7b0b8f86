// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{BeaconCursor, BeaconStore, Error};
use lantern_beacon::Beacon;
use log::warn;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// Bound of each callback's work queue; a subscriber that falls further
/// behind starts missing beacons rather than stalling the chain.
pub const CALLBACK_WORKER_QUEUE: usize = 100;

/// Observer invoked with `(Some(beacon), false)` for each stored beacon and
/// exactly once with `(None, true)` when its subscription closes.
pub type StoreCallback = Box<dyn Fn(Option<&Beacon>, bool) + Send + Sync + 'static>;

struct CallbackWorker {
    tx: flume::Sender<Beacon>,
}

/// Outermost layer: fans every successfully stored beacon out to registered
/// callbacks, each drained in FIFO order by its own worker task. An observer
/// therefore only ever sees beacons that are already durable, once per
/// registration, in strictly increasing round order.
pub struct CallbackStore<S> {
    inner: S,
    callbacks: Arc<RwLock<HashMap<String, CallbackWorker>>>,
}

impl<S: BeaconStore> CallbackStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            callbacks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `callback` under `id`, spawning its worker. Registering
    /// under an existing id closes the previous worker with a
    /// `(None, true)` event first.
    pub fn add_callback(&self, id: impl Into<String>, callback: StoreCallback) {
        let (tx, rx) = flume::bounded::<Beacon>(CALLBACK_WORKER_QUEUE);
        tokio::spawn(async move {
            loop {
                match rx.recv_async().await {
                    Ok(beacon) => callback(Some(&beacon), false),
                    // channel closed: subscription removed or store shut down
                    Err(_) => {
                        callback(None, true);
                        break;
                    }
                }
            }
        });
        // dropping a replaced worker's sender ends it with a closed event
        self.callbacks.write().insert(id.into(), CallbackWorker { tx });
    }

    /// Drop the subscription under `id`; its worker drains and receives one
    /// final closed event.
    pub fn remove_callback(&self, id: &str) {
        self.callbacks.write().remove(id);
    }
}

impl<S: BeaconStore> BeaconStore for CallbackStore<S> {
    fn put(&self, beacon: Beacon) -> Result<(), Error> {
        match self.inner.put(beacon.clone()) {
            Ok(()) => {
                if beacon.round() != 0 {
                    for (id, worker) in self.callbacks.read().iter() {
                        if worker.tx.try_send(beacon.clone()).is_err() {
                            warn!(
                                "callback {} queue full, dropping beacon {}",
                                id,
                                beacon.round()
                            );
                        }
                    }
                }
                Ok(())
            }
            // idempotent retry of a stored round succeeds without fan-out
            Err(e) if e.is_already_stored() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn get(&self, round: u64) -> Result<Beacon, Error> {
        self.inner.get(round)
    }

    fn last(&self) -> Result<Beacon, Error> {
        self.inner.last()
    }

    fn len(&self) -> Result<u64, Error> {
        self.inner.len()
    }

    fn cursor_from(&self, round: u64) -> Result<BeaconCursor<'_>, Error> {
        self.inner.cursor_from(round)
    }

    fn del(&self, round: u64) -> Result<(), Error> {
        self.inner.del(round)
    }

    fn save_to(&self, writer: &mut dyn Write) -> Result<(), Error> {
        self.inner.save_to(writer)
    }

    fn close(&self) -> Result<(), Error> {
        // one stop signal for every live worker
        self.callbacks.write().clear();
        self.inner.close()
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lantern_beacon::{Beacon, PartialBeacon, PartialCache, Vault};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Rounds ahead of the last stored beacon for which partials are cached.
/// Anything further out is dropped; it will be re-broadcast once the chain
/// catches up.
pub const PARTIAL_CACHE_STORE_LIMIT: u64 = 3;

/// Consumes partials and recovers the full threshold signature once enough
/// of them agree on `(round, prev_sig)`. Single-threaded; the cache is owned
/// here and nowhere else.
pub(crate) struct Aggregator {
    vault: Arc<Vault>,
    cache: PartialCache,
    last: Beacon,
    partials_rx: flume::Receiver<(PartialBeacon, String)>,
    stored_rx: flume::Receiver<Beacon>,
    aggregated_tx: flume::Sender<Beacon>,
    done: flume::Receiver<()>,
}

impl Aggregator {
    pub(crate) fn new(
        vault: Arc<Vault>,
        last: Beacon,
        partials_rx: flume::Receiver<(PartialBeacon, String)>,
        stored_rx: flume::Receiver<Beacon>,
        aggregated_tx: flume::Sender<Beacon>,
        done: flume::Receiver<()>,
    ) -> Self {
        Self {
            vault,
            cache: PartialCache::new(),
            last,
            partials_rx,
            stored_rx,
            aggregated_tx,
            done,
        }
    }

    pub(crate) fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let stored_rx = self.stored_rx.clone();
            let partials_rx = self.partials_rx.clone();
            let done = self.done.clone();
            loop {
                tokio::select! {
                    stored = stored_rx.recv_async() => match stored {
                        Ok(beacon) => {
                            self.cache.flush_rounds(beacon.round());
                            self.last = beacon;
                        }
                        Err(_) => break,
                    },
                    partial = partials_rx.recv_async() => match partial {
                        Ok((partial, src)) => self.process_partial(partial, &src).await,
                        Err(_) => break,
                    },
                    _ = done.recv_async() => break,
                }
            }
            debug!("aggregator loop stopped");
        })
    }

    async fn process_partial(&mut self, partial: PartialBeacon, src: &str) {
        let last_round = self.last.round();
        let round = partial.round();
        if round <= last_round || round > last_round + 1 + PARTIAL_CACHE_STORE_LIMIT {
            debug!(
                "ignoring partial from {} for round {}: last stored round is {}",
                src, round, last_round
            );
            return;
        }
        self.cache.append(&partial);

        let Some(bucket) = self
            .cache
            .get_round_cache(partial.round(), partial.previous_sig())
        else {
            debug!("partial bucket for round {} was evicted by quota", round);
            return;
        };
        let threshold = self.vault.threshold();
        if bucket.len() < threshold {
            trace!(
                "round {} has {}/{} partials",
                round,
                bucket.len(),
                threshold
            );
            return;
        }

        let msg = self
            .vault
            .digest_beacon(bucket.round(), bucket.previous_sig());
        let signature = match self.vault.recover(bucket.partials()) {
            Ok(sig) => sig.to_bytes().to_vec(),
            Err(e) => {
                // the set may still hold forgeries from the past; a later
                // honest partial will make recovery succeed
                debug!("recovery for round {} failed: {}", round, e);
                return;
            }
        };
        if let Err(e) = self.vault.verify_recovered(&msg, &signature) {
            warn!("recovered signature for round {} is invalid: {}", round, e);
            return;
        }

        let previous_sig = bucket.previous_sig().to_vec();
        self.cache.flush_rounds(round);
        info!("aggregated beacon for round {}", round);
        let beacon = Beacon::new(round, previous_sig, signature);
        if self.aggregated_tx.send_async(beacon).await.is_err() {
            debug!("chain loop is gone, dropping aggregated round {}", round);
        }
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Error;
use lantern_beacon::Beacon;
use lantern_chain::{BeaconStore, ChainStore, CALLBACK_WORKER_QUEUE};
use lantern_db::Store;
use lantern_net::{BeaconPacket, Error as NetError, SyncRequest};
use log::debug;

enum LiveEvent {
    Stored(Beacon),
    Closed,
}

struct CallbackGuard<'a, DB: Store + Send + Sync> {
    store: &'a ChainStore<DB>,
    id: String,
}

impl<DB: Store + Send + Sync> Drop for CallbackGuard<'_, DB> {
    fn drop(&mut self) {
        self.store.remove_callback(&self.id);
    }
}

/// Server side of the sync protocol: authoritative replay of the chain.
///
/// Streams the requested historic rounds into `out` and then follows live,
/// forwarding each newly stored beacon, until the peer goes away or the
/// store shuts down. The live callback is registered before the cursor walk
/// and duplicates are suppressed with a monotone watermark, so the peer can
/// catch up on history and follow live without ever observing a gap.
pub async fn sync_chain<DB: Store + Send + Sync>(
    store: &ChainStore<DB>,
    beacon_id: &str,
    from_addr: &str,
    request: SyncRequest,
    out: flume::Sender<BeaconPacket>,
) -> Result<(), Error> {
    if request.metadata.beacon_id != beacon_id {
        return Err(Error::WrongBeaconId {
            got: request.metadata.beacon_id,
            want: beacon_id.to_owned(),
        });
    }
    let last = store.last()?;
    if last.round() < request.from_round {
        return Err(Error::NotEnoughBeacons {
            from: request.from_round,
            last: last.round(),
        });
    }
    debug!(
        "serving sync stream for {} from round {}",
        from_addr, request.from_round
    );

    let (live_tx, live_rx) = flume::bounded(CALLBACK_WORKER_QUEUE);
    let callback_id = format!("sync-{}", from_addr);
    store.add_callback(
        callback_id.clone(),
        Box::new(move |beacon, closed| {
            let event = if closed {
                LiveEvent::Closed
            } else {
                match beacon {
                    Some(b) => LiveEvent::Stored(b.clone()),
                    None => return,
                }
            };
            let _ = live_tx.try_send(event);
        }),
    );
    let _guard = CallbackGuard {
        store,
        id: callback_id,
    };

    let mut last_sent = 0u64;
    if request.from_round > 0 {
        for res in store.cursor_from(request.from_round)? {
            let beacon = res?;
            send(&out, BeaconPacket::new(&beacon, beacon_id)).await?;
            last_sent = beacon.round();
        }
    } else {
        // from 0 means: send the chain head, then follow live
        send(&out, BeaconPacket::new(&last, beacon_id)).await?;
        last_sent = last.round();
    }

    loop {
        match live_rx.recv_async().await {
            Ok(LiveEvent::Stored(beacon)) => {
                // the cursor walk already covered everything up to last_sent
                if beacon.round() <= last_sent {
                    continue;
                }
                send(&out, BeaconPacket::new(&beacon, beacon_id)).await?;
                last_sent = beacon.round();
            }
            Ok(LiveEvent::Closed) | Err(_) => {
                debug!("sync stream for {} closed", from_addr);
                return Ok(());
            }
        }
    }
}

async fn send(out: &flume::Sender<BeaconPacket>, packet: BeaconPacket) -> Result<(), Error> {
    out.send_async(packet)
        .await
        .map_err(|_| Error::Net(NetError::ConnectionClosed))
}

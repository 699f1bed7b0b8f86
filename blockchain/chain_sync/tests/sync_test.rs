// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use async_trait::async_trait;
use lantern_beacon::mock::TestGroup;
use lantern_beacon::{Beacon, ChainInfo};
use lantern_chain::{BeaconStore, ChainStore};
use lantern_chain_sync::{sync_chain, Error, Handler};
use lantern_clock::{Clock, FakeClock};
use lantern_db::MemoryDB;
use lantern_net::{
    BeaconPacket, BeaconService, Error as NetError, MemoryRouter, Metadata, PartialBeaconPacket,
    SyncRequest,
};
use std::sync::Arc;
use std::time::Duration;

fn open_store(setup: &TestGroup) -> Arc<ChainStore<MemoryDB>> {
    let info = ChainInfo::from_group(&setup.group);
    let clock = Arc::new(FakeClock::new(setup.group.genesis_time));
    Arc::new(ChainStore::open(Arc::new(MemoryDB::default()), &info, clock).unwrap())
}

async fn recv(rx: &flume::Receiver<BeaconPacket>) -> BeaconPacket {
    tokio::time::timeout(Duration::from_secs(5), rx.recv_async())
        .await
        .expect("timed out waiting for sync packet")
        .expect("sync stream closed unexpectedly")
}

// A peer requesting from round 1 receives the full history in order, then
// every subsequent beacon live, with no gap and no duplicate at the
// boundary.
#[tokio::test(flavor = "multi_thread")]
async fn sync_streams_history_then_live() {
    let setup = TestGroup::new(3, 2);
    let store = open_store(&setup);
    let chain = setup.chain_to(11);
    for beacon in chain.iter().take(10).skip(1) {
        store.put(beacon.clone()).unwrap();
    }

    let (out_tx, out_rx) = flume::bounded(16);
    let server = Arc::clone(&store);
    let task = tokio::spawn(async move {
        sync_chain(
            &server,
            "default",
            "peer-b",
            SyncRequest {
                from_round: 1,
                metadata: Metadata::for_beacon("default"),
            },
            out_tx,
        )
        .await
    });

    for expected in 1..=9u64 {
        let packet = recv(&out_rx).await;
        assert_eq!(packet.round, expected);
        assert_eq!(packet.metadata.beacon_id, "default");
        assert_eq!(packet.clone().into_beacon(), chain[expected as usize]);
    }

    // a beacon stored while the peer is connected arrives live
    store.put(chain[10].clone()).unwrap();
    assert_eq!(recv(&out_rx).await.round, 10);

    // nothing else to send: the stream blocks for round 11
    assert!(
        tokio::time::timeout(Duration::from_millis(300), out_rx.recv_async())
            .await
            .is_err()
    );

    // peer goes away; the next stored beacon unblocks and ends the stream
    drop(out_rx);
    store.put(chain[11].clone()).unwrap();
    let res = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(
        matches!(res, Err(Error::Net(_))),
        "stream must end once the peer disconnects"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_from_zero_sends_head_then_follows() {
    let setup = TestGroup::new(3, 2);
    let store = open_store(&setup);
    let chain = setup.chain_to(4);
    for beacon in chain.iter().take(4).skip(1) {
        store.put(beacon.clone()).unwrap();
    }

    let (out_tx, out_rx) = flume::bounded(16);
    let server = Arc::clone(&store);
    tokio::spawn(async move {
        sync_chain(
            &server,
            "default",
            "peer-b",
            SyncRequest {
                from_round: 0,
                metadata: Metadata::for_beacon("default"),
            },
            out_tx,
        )
        .await
    });

    assert_eq!(recv(&out_rx).await.round, 3);
    store.put(chain[4].clone()).unwrap();
    assert_eq!(recv(&out_rx).await.round, 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_ahead_of_chain_is_refused() {
    let setup = TestGroup::new(3, 2);
    let store = open_store(&setup);
    for beacon in setup.chain_to(3).into_iter().skip(1) {
        store.put(beacon).unwrap();
    }

    let (out_tx, _out_rx) = flume::bounded(16);
    let res = sync_chain(
        &store,
        "default",
        "peer-b",
        SyncRequest {
            from_round: 50,
            metadata: Metadata::for_beacon("default"),
        },
        out_tx,
    )
    .await;
    assert!(matches!(
        res,
        Err(Error::NotEnoughBeacons { from: 50, last: 3 })
    ));
}

/// Serves a plain chain store over the sync protocol, standing in for a
/// full remote node.
struct StoreService {
    store: Arc<ChainStore<MemoryDB>>,
    beacon_id: String,
}

#[async_trait]
impl BeaconService for StoreService {
    async fn partial_beacon(
        &self,
        _from: &str,
        _packet: PartialBeaconPacket,
    ) -> Result<(), NetError> {
        Ok(())
    }

    async fn sync_chain(
        &self,
        from: &str,
        request: SyncRequest,
        out: flume::Sender<BeaconPacket>,
    ) -> Result<(), NetError> {
        sync_chain(&self.store, &self.beacon_id, from, request, out)
            .await
            .map_err(|e| NetError::Rejected(e.to_string()))
    }
}

// A corrupt round is reported by chain validation, then replaced through
// the insecure resync path with the verified copy from a peer, leaving its
// neighbors untouched.
#[tokio::test(flavor = "multi_thread")]
async fn resync_overwrites_faulty_round() {
    let setup = TestGroup::new(3, 2);
    let chain = setup.chain_to(8);

    // remote peer with the good chain
    let remote = open_store(&setup);
    for beacon in chain.iter().skip(1) {
        remote.put(beacon.clone()).unwrap();
    }
    let router = MemoryRouter::new();
    router.register(
        "node-1:8080",
        Arc::new(StoreService {
            store: remote,
            beacon_id: setup.group.beacon_id.clone(),
        }),
    );

    // local node whose round 5 got corrupted on disk
    let clock = Arc::new(FakeClock::new(setup.group.genesis_time));
    let addr = setup.group.nodes[0].address.clone();
    let handler = Handler::new(
        Arc::new(MemoryDB::default()),
        Arc::clone(&setup.group),
        setup.share(0),
        Arc::new(router.endpoint(addr.clone())),
        clock as Arc<dyn Clock>,
        addr,
    )
    .unwrap();
    let store = handler.chain_store();
    for beacon in chain.iter().skip(1) {
        store.put(beacon.clone()).unwrap();
    }
    let corrupt = Beacon::new(5, chain[5].previous_sig().to_vec(), vec![9u8; 96]);
    store.insecure().put(corrupt).unwrap();

    let faulty = handler.check_past_beacons(8, |_, _| {}).unwrap();
    assert_eq!(faulty, vec![5]);

    handler
        .correct_past_beacons(&faulty, &["node-1:8080".to_owned()])
        .await
        .unwrap();

    assert_eq!(store.get(5).unwrap(), chain[5]);
    assert_eq!(store.get(4).unwrap(), chain[4]);
    assert_eq!(store.get(6).unwrap(), chain[6]);
    assert_eq!(store.last().unwrap().round(), 8);
    assert!(handler.check_past_beacons(8, |_, _| {}).unwrap().is_empty());
}

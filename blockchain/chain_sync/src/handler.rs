// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::aggregator::Aggregator;
use crate::chain_loop::ChainLoop;
use crate::manager::{SyncManager, SyncSender, SyncWorker};
use crate::{metrics, provider, validation, Error};
use async_trait::async_trait;
use lantern_beacon::{Beacon, ChainInfo, Group, PartialBeacon, Share, Vault};
use lantern_chain::{BeaconStore, ChainStore};
use lantern_clock::{time, Clock, RoundInfo, RoundTicker, TICKER_BACKLOG};
use lantern_db::Store;
use lantern_net::{
    BeaconPacket, BeaconService, BeaconTransport, Error as NetError, PartialBeaconPacket,
    SyncRequest,
};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Buffered inbound partials between the handler and the aggregator.
pub(crate) const PARTIAL_CHANNEL_BUFFER: usize = 10;
/// Buffered aggregated beacons between the aggregator and the chain loop.
pub(crate) const AGGREGATED_BEACON_BUFFER: usize = 100;
/// Buffered no-sync append events driving catch-up re-broadcasts.
pub const MAX_CATCHUP_BUFFER: usize = 1000;

#[derive(Default)]
struct LifecycleFlags {
    started: bool,
    running: bool,
    serving: bool,
    stopped: bool,
}

/// The node façade for one beacon id: receives partials from peers,
/// broadcasts our own partial each tick, wires the ticker, the aggregator,
/// the chain loop and the sync manager together, and exposes the
/// start/catchup/transition/stop lifecycle.
pub struct Handler<DB> {
    vault: Arc<Vault>,
    store: Arc<ChainStore<DB>>,
    transport: Arc<dyn BeaconTransport>,
    clock: Arc<dyn Clock>,
    ticker: RoundTicker,
    own_addr: String,
    beacon_id: String,
    period: Duration,
    genesis_time: u64,
    catchup_period: Duration,
    partials_tx: flume::Sender<(PartialBeacon, String)>,
    ticks_to_chain: flume::Sender<RoundInfo>,
    catchup_rx: flume::Receiver<Beacon>,
    sync: SyncSender,
    state: Mutex<LifecycleFlags>,
    done_tx: Mutex<Option<flume::Sender<()>>>,
    done_rx: flume::Receiver<()>,
}

impl<DB: Store + Send + Sync + 'static> Handler<DB> {
    /// Build the full per-beacon engine and spawn its long-lived loops. The
    /// loops idle on their channels until `start`, `catchup` or `transition`
    /// subscribes to the ticker.
    ///
    /// Failing to load the last stored beacon is the one fatal error of the
    /// core: it means the store is corrupt beyond the node's ability to
    /// help itself.
    pub fn new(
        db: Arc<DB>,
        group: Arc<Group>,
        share: Share,
        transport: Arc<dyn BeaconTransport>,
        clock: Arc<dyn Clock>,
        own_addr: String,
    ) -> Result<Arc<Self>, Error> {
        group.validate().map_err(Error::InvalidGroup)?;
        let info = ChainInfo::from_group(&group);
        let store = Arc::new(ChainStore::open(db, &info, Arc::clone(&clock))?);
        let last = store.last()?;
        let vault = Arc::new(Vault::new(share, Arc::clone(&group)));

        metrics::GROUP_SIZE
            .with_label_values(&[&group.beacon_id])
            .set(group.size() as u64);
        metrics::GROUP_THRESHOLD
            .with_label_values(&[&group.beacon_id])
            .set(group.threshold as u64);

        let (partials_tx, partials_rx) = flume::bounded(PARTIAL_CHANNEL_BUFFER);
        let (stored_tx, stored_rx) = flume::bounded(AGGREGATED_BEACON_BUFFER);
        let (aggregated_tx, aggregated_rx) = flume::bounded(AGGREGATED_BEACON_BUFFER);
        let (ticks_to_chain, ticks_chain_rx) = flume::bounded(TICKER_BACKLOG);
        let (catchup_tx, catchup_rx) = flume::bounded(MAX_CATCHUP_BUFFER);
        let (done_tx, done_rx) = flume::bounded(1);

        // the aggregator flushes its cache on every durably stored round
        store.add_callback(
            "aggregator",
            Box::new(move |beacon, _closed| {
                if let Some(b) = beacon {
                    let _ = stored_tx.try_send(b.clone());
                }
            }),
        );

        Aggregator::new(
            Arc::clone(&vault),
            last,
            partials_rx,
            stored_rx,
            aggregated_tx,
            done_rx.clone(),
        )
        .spawn();

        let worker = SyncWorker {
            store: Arc::clone(&store),
            vault: Arc::clone(&vault),
            transport: Arc::clone(&transport),
            clock: Arc::clone(&clock),
            own_addr: own_addr.clone(),
        };
        let (manager, sync) = SyncManager::new(worker, done_rx.clone());
        manager.spawn();

        ChainLoop::new(
            Arc::clone(&store),
            Arc::clone(&vault),
            own_addr.clone(),
            aggregated_rx,
            ticks_chain_rx,
            sync.clone(),
            catchup_tx,
            done_rx.clone(),
        )
        .spawn();

        let ticker = RoundTicker::new(Arc::clone(&clock), group.period, group.genesis_time);

        Ok(Arc::new(Self {
            vault,
            store,
            transport,
            clock,
            ticker,
            own_addr,
            beacon_id: group.beacon_id.clone(),
            period: group.period,
            genesis_time: group.genesis_time,
            catchup_period: group.catchup_period,
            partials_tx,
            ticks_to_chain,
            catchup_rx,
            sync,
            state: Mutex::new(LifecycleFlags::default()),
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
        }))
    }

    /// The chain store serving this beacon id.
    pub fn chain_store(&self) -> Arc<ChainStore<DB>> {
        Arc::clone(&self.store)
    }

    pub fn beacon_id(&self) -> &str {
        &self.beacon_id
    }

    pub fn vault(&self) -> Arc<Vault> {
        Arc::clone(&self.vault)
    }

    /// Begin participating at genesis. Rejects a start after genesis time;
    /// late nodes must use [Handler::catchup] instead.
    pub fn start(self: &Arc<Self>) -> Result<(), Error> {
        let now = self.clock.now();
        if now > self.genesis_time {
            return Err(Error::StartedAfterGenesis {
                genesis: self.genesis_time,
                now,
            });
        }
        self.mark_started()?;
        info!("beacon {} waiting for genesis", self.beacon_id);
        let ticks = self.ticker.channel_at(self.genesis_time);
        self.spawn_run_loop(ticks);
        Ok(())
    }

    /// Begin participating on a chain that is already running: subscribe to
    /// ticks immediately and sync the backlog from peers.
    pub fn catchup(self: &Arc<Self>) -> Result<(), Error> {
        self.mark_started()?;
        let ticks = self.ticker.channel_at(self.clock.now());
        self.spawn_run_loop(ticks);

        let current = self.ticker.current_round();
        if current > 0 {
            let peers = self.vault.group().peer_addresses(&self.own_addr);
            self.sync.request_sync(0, current, peers);
        }
        Ok(())
    }

    /// Join at an epoch transition: sync the pre-transition history from
    /// the previous group's peers, and swap the vault to the new group and
    /// share once the last pre-transition round is stored.
    pub fn transition(
        self: &Arc<Self>,
        prev_group: Arc<Group>,
        new_group: Arc<Group>,
        new_share: Share,
    ) -> Result<(), Error> {
        new_group.validate().map_err(Error::InvalidGroup)?;
        self.mark_started()?;

        let transition_time = new_group.transition_time;
        let transition_round = time::current_round(transition_time, self.period, self.genesis_time);
        let target = transition_round.saturating_sub(1);

        if self.store.last()?.round() >= target {
            info!("chain already at transition round, swapping vault");
            self.swap_group(new_group, new_share);
        } else {
            let handler = Arc::clone(self);
            let pending = Mutex::new(Some((new_group, new_share)));
            self.store.add_callback(
                "transition",
                Box::new(move |beacon, _closed| {
                    let Some(b) = beacon else { return };
                    if b.round() >= target {
                        if let Some((group, share)) = pending.lock().take() {
                            handler.swap_group(group, share);
                        }
                    }
                }),
            );
            let peers = prev_group.peer_addresses(&self.own_addr);
            self.sync.request_sync(0, target, peers);
        }

        let ticks = self.ticker.channel_at(transition_time);
        self.spawn_run_loop(ticks);
        Ok(())
    }

    fn swap_group(&self, group: Arc<Group>, share: Share) {
        info!(
            "transition: swapping to group of {} nodes for {}",
            group.size(),
            self.beacon_id
        );
        metrics::GROUP_SIZE
            .with_label_values(&[&self.beacon_id])
            .set(group.size() as u64);
        metrics::GROUP_THRESHOLD
            .with_label_values(&[&self.beacon_id])
            .set(group.threshold as u64);
        self.vault.set_info(group, share);
    }

    /// Stop everything: ticker, aggregator, chain loop, sync manager, and
    /// the chain store with its callback workers. Idempotent.
    pub fn stop(&self) {
        {
            let mut flags = self.state.lock();
            if flags.stopped {
                return;
            }
            flags.stopped = true;
            flags.serving = false;
        }
        self.done_tx.lock().take();
        self.ticker.stop();
        if let Err(e) = self.store.close() {
            error!("closing chain store: {}", e);
        }
        info!("beacon {} stopped", self.beacon_id);
    }

    /// Stop once the wall clock reaches `stop_time`.
    pub async fn stop_at(&self, stop_time: u64) {
        let now = self.clock.now();
        if stop_time > now {
            self.clock.sleep(Duration::from_secs(stop_time - now)).await;
        }
        self.stop();
    }

    /// Validate the stored chain up to `up_to`; see
    /// [validation::check_past_beacons].
    pub fn check_past_beacons<F: FnMut(u64, u64)>(
        &self,
        up_to: u64,
        progress: F,
    ) -> Result<Vec<u64>, Error> {
        validation::check_past_beacons(&self.store, &self.vault.group(), up_to, progress)
    }

    /// Overwrite each faulty round with a verified copy fetched from
    /// `peers`, one forced resync per round.
    pub async fn correct_past_beacons(
        &self,
        faulty: &[u64],
        peers: &[String],
    ) -> Result<(), Error> {
        let worker = SyncWorker {
            store: Arc::clone(&self.store),
            vault: Arc::clone(&self.vault),
            transport: Arc::clone(&self.transport),
            clock: Arc::clone(&self.clock),
            own_addr: self.own_addr.clone(),
        };
        for &round in faulty {
            worker.resync_round(round, peers).await?;
        }
        Ok(())
    }

    /// Validate and ingest one partial signature from a peer.
    pub async fn process_partial_beacon(
        &self,
        from: &str,
        packet: PartialBeaconPacket,
    ) -> Result<(), Error> {
        {
            let flags = self.state.lock();
            if flags.stopped {
                return Err(Error::Stopped);
            }
            if !flags.serving {
                return Err(Error::NotRunning);
            }
        }
        if packet.metadata.beacon_id != self.beacon_id {
            return Err(Error::WrongBeaconId {
                got: packet.metadata.beacon_id,
                want: self.beacon_id.clone(),
            });
        }
        // one round of slack for clock drift between peers
        let (next_round, _) = time::next_round(self.clock.now(), self.period, self.genesis_time);
        if packet.round > next_round {
            debug!(
                "rejecting partial from {} for future round {} (next is {})",
                from, packet.round, next_round
            );
            return Err(Error::OutOfRound {
                round: packet.round,
                next: next_round,
            });
        }

        let partial = packet.into_partial();
        let msg = self
            .vault
            .digest_beacon(partial.round(), partial.previous_sig());
        let index = partial.signer_index()?;
        let group = self.vault.group();
        if !group.contains_index(index) {
            return Err(Error::UnknownSigner(index));
        }
        if index == self.vault.index() {
            info!("received our own partial back from {}, ignoring", from);
            return Ok(());
        }
        self.vault.verify_partial(&msg, partial.partial_sig())?;

        self.partials_tx
            .send_async((partial, from.to_owned()))
            .await
            .map_err(|_| Error::Stopped)
    }

    fn mark_started(&self) -> Result<(), Error> {
        let mut flags = self.state.lock();
        if flags.stopped {
            return Err(Error::Stopped);
        }
        if flags.started {
            return Err(Error::AlreadyStarted);
        }
        flags.started = true;
        flags.serving = true;
        Ok(())
    }

    fn spawn_run_loop(self: &Arc<Self>, ticks: flume::Receiver<RoundInfo>) {
        let handler = Arc::clone(self);
        tokio::spawn(async move { handler.run(ticks).await });
    }

    async fn run(self: Arc<Self>, ticks: flume::Receiver<RoundInfo>) {
        self.state.lock().running = true;
        info!("beacon loop for {} started", self.beacon_id);
        loop {
            tokio::select! {
                tick = ticks.recv_async() => match tick {
                    Ok(tick) => self.on_tick(tick).await,
                    // ticker stopped
                    Err(_) => break,
                },
                late = self.catchup_rx.recv_async() => match late {
                    Ok(beacon) => self.on_catchup(beacon),
                    Err(_) => break,
                },
                _ = self.done_rx.recv_async() => break,
            }
        }
        self.state.lock().running = false;
        debug!("beacon loop for {} stopped", self.beacon_id);
    }

    async fn on_tick(&self, tick: RoundInfo) {
        let last = match self.store.last() {
            Ok(last) => last,
            Err(e) => {
                error!("loading last beacon on tick: {}", e);
                return;
            }
        };
        self.broadcast_next_partial(tick, &last).await;
        // the chain loop performs the gap check and requests syncs
        let _ = self.ticks_to_chain.try_send(tick);
    }

    /// A beacon was appended outside of sync while the ticker is already
    /// past it: the network just recovered. Wait out the catch-up grace
    /// period and re-broadcast the next partial on top of it.
    fn on_catchup(self: &Arc<Self>, beacon: Beacon) {
        if beacon.round() >= self.ticker.current_round() {
            return;
        }
        let handler = Arc::clone(self);
        tokio::spawn(async move {
            handler.clock.sleep(handler.catchup_period).await;
            let round = handler.ticker.current_round();
            let tick = RoundInfo {
                round,
                time: time::time_of_round(handler.period, handler.genesis_time, round),
            };
            handler.broadcast_next_partial(tick, &beacon).await;
        });
    }

    async fn broadcast_next_partial(&self, current: RoundInfo, upon: &Beacon) {
        let (round, previous_sig) = if current.round == upon.round() {
            // we already stored the round of this tick; clocks can be less
            // than a period apart, so re-broadcast over the stored round
            (current.round, upon.previous_sig().to_vec())
        } else {
            (upon.round() + 1, upon.signature().to_vec())
        };

        let msg = self.vault.digest_beacon(round, &previous_sig);
        let partial_sig = self.vault.sign_partial(&msg);
        let partial = PartialBeacon::new(round, previous_sig, partial_sig);
        debug!("{} broadcasting partial for round {}", self.own_addr, round);

        // our own partial goes straight to the aggregator
        if self
            .partials_tx
            .send_async((partial.clone(), self.own_addr.clone()))
            .await
            .is_err()
        {
            return;
        }

        let packet = PartialBeaconPacket::new(&partial, &self.beacon_id);
        for peer in self.vault.group().peer_addresses(&self.own_addr) {
            let transport = Arc::clone(&self.transport);
            let packet = packet.clone();
            tokio::spawn(async move {
                if let Err(e) = transport.partial_beacon(&peer, packet).await {
                    debug!("sending partial to {}: {}", peer, e);
                }
            });
        }
    }
}

#[async_trait]
impl<DB: Store + Send + Sync + 'static> BeaconService for Handler<DB> {
    async fn partial_beacon(&self, from: &str, packet: PartialBeaconPacket) -> Result<(), NetError> {
        self.process_partial_beacon(from, packet)
            .await
            .map_err(|e| NetError::Rejected(e.to_string()))
    }

    async fn sync_chain(
        &self,
        from: &str,
        request: SyncRequest,
        out: flume::Sender<BeaconPacket>,
    ) -> Result<(), NetError> {
        provider::sync_chain(&self.store, &self.beacon_id, from, request, out)
            .await
            .map_err(|e| NetError::Rejected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_beacon::mock::TestGroup;
    use lantern_clock::FakeClock;
    use lantern_crypto::sign_partial;
    use lantern_db::MemoryDB;
    use lantern_net::{MemoryRouter, Metadata};

    fn started_handler(
        setup: &TestGroup,
        index: u32,
    ) -> (Arc<Handler<MemoryDB>>, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(setup.group.genesis_time - 1));
        let router = MemoryRouter::new();
        let addr = setup.group.nodes[index as usize].address.clone();
        let handler = Handler::new(
            Arc::new(MemoryDB::default()),
            Arc::clone(&setup.group),
            setup.share(index),
            Arc::new(router.endpoint(addr.clone())),
            clock.clone() as Arc<dyn Clock>,
            addr,
        )
        .unwrap();
        handler.start().unwrap();
        (handler, clock)
    }

    fn packet(setup: &TestGroup, signer: u32, round: u64, prev: &[u8]) -> PartialBeaconPacket {
        let msg = setup.group.scheme.digest_beacon(round, prev);
        let sig = sign_partial(setup.shares[signer as usize].secret(), signer, &msg);
        let partial = PartialBeacon::new(round, prev.to_vec(), sig);
        PartialBeaconPacket::new(&partial, &setup.group.beacon_id)
    }

    #[tokio::test]
    async fn accepts_valid_partial() {
        let setup = TestGroup::new(3, 2);
        let (handler, clock) = started_handler(&setup, 0);
        clock.advance(Duration::from_secs(1));

        let seed = setup.group.genesis_seed.clone();
        handler
            .process_partial_beacon("node-1:8080", packet(&setup, 1, 1, &seed))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_wrong_beacon_id() {
        let setup = TestGroup::new(3, 2);
        let (handler, clock) = started_handler(&setup, 0);
        clock.advance(Duration::from_secs(1));

        let mut pkt = packet(&setup, 1, 1, &setup.group.genesis_seed);
        pkt.metadata = Metadata::for_beacon("other");
        assert!(matches!(
            handler.process_partial_beacon("node-1:8080", pkt).await,
            Err(Error::WrongBeaconId { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_partial_too_far_ahead() {
        let setup = TestGroup::new(3, 2);
        let (handler, clock) = started_handler(&setup, 0);
        clock.advance(Duration::from_secs(1));

        // at genesis the next round is 2; round 3 is out of round
        assert!(matches!(
            handler
                .process_partial_beacon("node-1:8080", packet(&setup, 1, 3, &[0u8; 96]))
                .await,
            Err(Error::OutOfRound { round: 3, .. })
        ));
    }

    #[tokio::test]
    async fn rejects_unknown_signer() {
        let setup = TestGroup::new(3, 2);
        let (handler, clock) = started_handler(&setup, 0);
        clock.advance(Duration::from_secs(1));

        let outside = TestGroup::new(6, 4);
        let msg = setup
            .group
            .scheme
            .digest_beacon(1, &setup.group.genesis_seed);
        let sig = sign_partial(outside.shares[5].secret(), 5, &msg);
        let partial = PartialBeacon::new(1, setup.group.genesis_seed.clone(), sig);
        let pkt = PartialBeaconPacket::new(&partial, &setup.group.beacon_id);
        assert!(matches!(
            handler.process_partial_beacon("node-1:8080", pkt).await,
            Err(Error::UnknownSigner(5))
        ));
    }

    #[tokio::test]
    async fn ignores_own_partial() {
        let setup = TestGroup::new(3, 2);
        let (handler, clock) = started_handler(&setup, 0);
        clock.advance(Duration::from_secs(1));

        // a valid packet claiming our own index is logged and dropped
        handler
            .process_partial_beacon(
                "node-1:8080",
                packet(&setup, 0, 1, &setup.group.genesis_seed),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_invalid_signature() {
        let setup = TestGroup::new(3, 2);
        let (handler, clock) = started_handler(&setup, 0);
        clock.advance(Duration::from_secs(1));

        // signed over the wrong message
        let mut pkt = packet(&setup, 1, 1, &[9u8; 96]);
        pkt.previous_sig = setup.group.genesis_seed.clone();
        assert!(matches!(
            handler.process_partial_beacon("node-1:8080", pkt).await,
            Err(Error::Crypto(lantern_crypto::Error::InvalidPartial))
        ));
    }

    #[tokio::test]
    async fn start_after_genesis_is_rejected() {
        let setup = TestGroup::new(3, 2);
        let clock = Arc::new(FakeClock::new(setup.group.genesis_time + 10));
        let router = MemoryRouter::new();
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
        assert!(matches!(
            handler.start(),
            Err(Error::StartedAfterGenesis { .. })
        ));
        // catchup is the way in for late nodes
        handler.catchup().unwrap();
        assert!(matches!(handler.catchup(), Err(Error::AlreadyStarted)));
    }

    #[tokio::test]
    async fn transition_swaps_vault_once_target_round_is_stored() {
        let setup = TestGroup::new(3, 2);
        let clock = Arc::new(FakeClock::new(setup.group.genesis_time - 1));
        let router = MemoryRouter::new();
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
        let chain = setup.chain_to(2);
        handler.chain_store().put(chain[1].clone()).unwrap();

        // resharing produced a larger group taking over at round 3
        let next = TestGroup::new(5, 3);
        let mut regrouped = (*next.group).clone();
        regrouped.transition_time = setup.group.genesis_time + 4;
        handler
            .transition(
                Arc::clone(&setup.group),
                Arc::new(regrouped),
                next.share(4),
            )
            .unwrap();
        assert_eq!(handler.vault().group().size(), 3);

        // storing the last pre-transition round triggers the swap
        handler.chain_store().put(chain[2].clone()).unwrap();
        for _ in 0..100 {
            if handler.vault().group().size() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(handler.vault().group().size(), 5);
        assert_eq!(handler.vault().index(), 4);
    }

    #[tokio::test]
    async fn transition_with_full_history_swaps_immediately() {
        let setup = TestGroup::new(3, 2);
        let clock = Arc::new(FakeClock::new(setup.group.genesis_time - 1));
        let router = MemoryRouter::new();
        let addr = setup.group.nodes[1].address.clone();
        let handler = Handler::new(
            Arc::new(MemoryDB::default()),
            Arc::clone(&setup.group),
            setup.share(1),
            Arc::new(router.endpoint(addr.clone())),
            clock as Arc<dyn Clock>,
            addr,
        )
        .unwrap();
        for beacon in setup.chain_to(2).into_iter().skip(1) {
            handler.chain_store().put(beacon).unwrap();
        }

        let next = TestGroup::new(4, 3);
        let mut regrouped = (*next.group).clone();
        regrouped.transition_time = setup.group.genesis_time + 4;
        handler
            .transition(
                Arc::clone(&setup.group),
                Arc::new(regrouped),
                next.share(2),
            )
            .unwrap();
        assert_eq!(handler.vault().group().size(), 4);
        assert_eq!(handler.vault().index(), 2);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_final() {
        let setup = TestGroup::new(3, 2);
        let (handler, clock) = started_handler(&setup, 0);
        clock.advance(Duration::from_secs(1));

        handler.stop();
        handler.stop();
        assert!(matches!(
            handler
                .process_partial_beacon(
                    "node-1:8080",
                    packet(&setup, 1, 1, &setup.group.genesis_seed)
                )
                .await,
            Err(Error::Stopped)
        ));
    }
}

// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lantern_beacon::mock::TestGroup;
use lantern_chain::BeaconStore;
use lantern_chain_sync::Handler;
use lantern_clock::{Clock, FakeClock};
use lantern_db::MemoryDB;
use lantern_net::MemoryRouter;
use std::sync::Arc;
use std::time::Duration;

pub struct TestNode {
    pub handler: Arc<Handler<MemoryDB>>,
    pub addr: String,
    pub events: flume::Receiver<u64>,
}

impl TestNode {
    pub fn last_round(&self) -> u64 {
        self.handler.chain_store().last().unwrap().round()
    }
}

/// An in-process beacon network on a fake clock, one handler per group node.
pub struct TestNet {
    pub setup: TestGroup,
    pub router: MemoryRouter,
    pub clock: Arc<FakeClock>,
    pub nodes: Vec<TestNode>,
}

impl TestNet {
    /// Build `n` nodes over a shared router, clock parked shortly before
    /// genesis. Each node carries a `test` store callback feeding `events`.
    pub fn new(n: usize, threshold: u16) -> Self {
        let _ = pretty_env_logger::try_init();
        let setup = TestGroup::new(n, threshold);
        let clock = Arc::new(FakeClock::new(setup.group.genesis_time - 3));
        let router = MemoryRouter::new();

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let addr = setup.group.nodes[i].address.clone();
            let handler = Handler::new(
                Arc::new(MemoryDB::default()),
                Arc::clone(&setup.group),
                setup.share(i as u32),
                Arc::new(router.endpoint(addr.clone())),
                clock.clone() as Arc<dyn Clock>,
                addr.clone(),
            )
            .unwrap();
            router.register(addr.clone(), handler.clone());

            let (events_tx, events) = flume::unbounded();
            handler.chain_store().add_callback(
                "test",
                Box::new(move |beacon, _closed| {
                    if let Some(b) = beacon {
                        let _ = events_tx.send(b.round());
                    }
                }),
            );
            nodes.push(TestNode {
                handler,
                addr,
                events,
            });
        }
        Self {
            setup,
            router,
            clock,
            nodes,
        }
    }

    pub fn start_all(&self) {
        for node in &self.nodes {
            node.handler.start().unwrap();
        }
    }

    /// Nudge the fake clock forward in sub-period steps, yielding real time
    /// to the runtime between steps, until `cond` holds.
    pub async fn advance_until(&self, what: &str, cond: impl Fn(&TestNet) -> bool) {
        for _ in 0..600 {
            if cond(self) {
                return;
            }
            self.clock.advance(Duration::from_millis(500));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out advancing the clock until: {}", what);
    }

    /// Let spawned tasks settle without moving the fake clock.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    pub fn stop_all(&self) {
        for node in &self.nodes {
            node.handler.stop();
        }
    }
}

/// Drain `events` until `round` shows up, failing on timeout.
pub async fn wait_round(node: &TestNode, round: u64) {
    loop {
        let r = tokio::time::timeout(Duration::from_secs(20), node.events.recv_async())
            .await
            .unwrap_or_else(|_| panic!("{} never stored round {}", node.addr, round))
            .expect("store callback closed");
        if r >= round {
            return;
        }
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod ticker;
pub mod time;

pub use ticker::{RoundInfo, RoundTicker, TICKER_BACKLOG};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source used by everything in the beacon core. Production code uses
/// [SystemClock]; tests drive a [FakeClock] forward on demand.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Current unix time in seconds.
    fn now(&self) -> u64;

    /// Current unix time in milliseconds.
    fn now_millis(&self) -> u64 {
        self.now() * 1000
    }

    /// Suspend the calling task for the given duration.
    async fn sleep(&self, dur: Duration);
}

/// Wall clock implementation of [Clock].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    async fn sleep(&self, dur: Duration) {
        tokio::time::sleep(dur).await;
    }
}

struct Sleeper {
    wake_at: u64,
    tx: flume::Sender<()>,
}

struct FakeState {
    now_millis: u64,
    sleepers: Vec<Sleeper>,
}

/// Manually driven [Clock] for tests. Sleeping tasks park until
/// [FakeClock::advance] moves time past their deadline.
pub struct FakeClock {
    state: Mutex<FakeState>,
}

impl FakeClock {
    pub fn new(now: u64) -> Self {
        Self {
            state: Mutex::new(FakeState {
                now_millis: now * 1000,
                sleepers: Vec::new(),
            }),
        }
    }

    /// Move the clock forward, waking every sleeper whose deadline passed.
    pub fn advance(&self, dur: Duration) {
        let woken = {
            let mut state = self.state.lock();
            state.now_millis += dur.as_millis() as u64;
            let now = state.now_millis;
            let (due, rest): (Vec<_>, Vec<_>) =
                state.sleepers.drain(..).partition(|s| s.wake_at <= now);
            state.sleepers = rest;
            due
        };
        for sleeper in woken {
            let _ = sleeper.tx.send(());
        }
    }

    /// Number of tasks currently parked in [Clock::sleep].
    pub fn sleepers(&self) -> usize {
        self.state.lock().sleepers.len()
    }

    /// Wait until at least `n` tasks are parked in [Clock::sleep]. Used by
    /// tests to avoid advancing the clock before the code under test has
    /// gone to sleep.
    pub async fn wait_for_sleepers(&self, n: usize) {
        while self.sleepers() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> u64 {
        self.state.lock().now_millis / 1000
    }

    fn now_millis(&self) -> u64 {
        self.state.lock().now_millis
    }

    async fn sleep(&self, dur: Duration) {
        if dur.is_zero() {
            return;
        }
        let rx = {
            let mut state = self.state.lock();
            let (tx, rx) = flume::bounded(1);
            let wake_at = state.now_millis + dur.as_millis() as u64;
            state.sleepers.push(Sleeper { wake_at, tx });
            rx
        };
        let _ = rx.recv_async().await;
    }
}

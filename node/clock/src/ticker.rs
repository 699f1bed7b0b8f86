// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{time, Clock};
use log::trace;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Buffered ticks a slow subscriber may lag behind before the ticker skips
/// ahead to the present round.
pub const TICKER_BACKLOG: usize = 5;

/// One tick of the beacon timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundInfo {
    pub round: u64,
    pub time: u64,
}

/// Emits one [RoundInfo] per period to every subscriber, anchored at the
/// chain genesis. Late subscribers never receive past ticks. Stopping the
/// ticker closes all subscriber channels.
pub struct RoundTicker {
    clock: Arc<dyn Clock>,
    period: Duration,
    genesis_time: u64,
    done_tx: Mutex<Option<flume::Sender<()>>>,
    done_rx: flume::Receiver<()>,
}

impl RoundTicker {
    pub fn new(clock: Arc<dyn Clock>, period: Duration, genesis_time: u64) -> Self {
        let (done_tx, done_rx) = flume::bounded(1);
        Self {
            clock,
            period,
            genesis_time,
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
        }
    }

    /// Round in effect right now.
    pub fn current_round(&self) -> u64 {
        time::current_round(self.clock.now(), self.period, self.genesis_time)
    }

    /// Subscribe to ticks beginning at the first round boundary at or after
    /// `start_time`. The returned channel closes when the ticker stops.
    pub fn channel_at(&self, start_time: u64) -> flume::Receiver<RoundInfo> {
        let (tx, rx) = flume::bounded(TICKER_BACKLOG);
        let clock = Arc::clone(&self.clock);
        let done = self.done_rx.clone();
        let period = self.period;
        let period_secs = period.as_secs();
        let genesis_time = self.genesis_time;

        let mut target = first_boundary(start_time, period_secs, genesis_time);
        tokio::spawn(async move {
            loop {
                let now = clock.now();
                if now < target {
                    tokio::select! {
                        _ = clock.sleep(Duration::from_secs(target - now)) => {}
                        // Err means the ticker was stopped
                        _ = done.recv_async() => break,
                    }
                    continue;
                }
                if now >= target + period_secs {
                    // the subscriber (or our own send) lagged more than a
                    // full period; re-anchor on the present round
                    let skipped = time::current_round(now, period, genesis_time);
                    trace!("ticker skipping ahead to round {}", skipped);
                    target = time::time_of_round(period, genesis_time, skipped);
                }
                let round = time::current_round(target, period, genesis_time);
                tokio::select! {
                    res = tx.send_async(RoundInfo {
                        round,
                        time: target,
                    }) => {
                        if res.is_err() {
                            break;
                        }
                    }
                    _ = done.recv_async() => break,
                }
                target += period_secs;
            }
        });
        rx
    }

    /// Stop the ticker, closing every subscriber channel.
    pub fn stop(&self) {
        self.done_tx.lock().take();
    }
}

impl Drop for RoundTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn first_boundary(start_time: u64, period_secs: u64, genesis_time: u64) -> u64 {
    if start_time <= genesis_time {
        return genesis_time;
    }
    let elapsed = start_time - genesis_time;
    let rem = elapsed % period_secs;
    if rem == 0 {
        start_time
    } else {
        start_time + (period_secs - rem)
    }
}

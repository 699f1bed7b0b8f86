// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{metrics, BeaconCursor, BeaconStore, Error};
use lantern_beacon::{Beacon, ChainInfo};
use lantern_clock::{time, Clock};
use log::info;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Records how late each beacon lands relative to its scheduled time, plus
/// the storage latency of the inner layers. Purely observational; no
/// behavioral effect.
pub struct DiscrepancyStore<S> {
    inner: S,
    clock: Arc<dyn Clock>,
    period: Duration,
    genesis_time: u64,
    beacon_id: String,
}

impl<S: BeaconStore> DiscrepancyStore<S> {
    pub fn new(inner: S, info: &ChainInfo, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            clock,
            period: info.period,
            genesis_time: info.genesis_time,
            beacon_id: info.id.clone(),
        }
    }
}

impl<S: BeaconStore> BeaconStore for DiscrepancyStore<S> {
    fn put(&self, beacon: Beacon) -> Result<(), Error> {
        let round = beacon.round();
        let started = self.clock.now_millis();
        self.inner.put(beacon)?;
        let now = self.clock.now_millis();

        let expected = time::time_of_round(self.period, self.genesis_time, round) * 1000;
        let discrepancy = now as i64 - expected as i64;
        let storage = (now - started) as f64;

        metrics::LAST_BEACON_ROUND
            .with_label_values(&[&self.beacon_id])
            .set(round);
        metrics::BEACON_DISCREPANCY_MS
            .with_label_values(&[&self.beacon_id])
            .set(discrepancy);
        metrics::STORAGE_TIME_MS
            .with_label_values(&[&self.beacon_id])
            .observe(storage);
        info!(
            "beacon stored: beacon_id={} round={} discrepancy_ms={}",
            self.beacon_id, round, discrepancy
        );
        Ok(())
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
        self.inner.close()
    }
}

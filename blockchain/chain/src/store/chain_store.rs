// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{
    AppendStore, BeaconCursor, BeaconStore, CallbackStore, DbStore, DiscrepancyStore, Error,
    SchemeStore, StoreCallback,
};
use lantern_beacon::{Beacon, ChainInfo};
use lantern_clock::Clock;
use lantern_db::Store;
use std::io::Write;
use std::sync::Arc;

type Stack<DB> = CallbackStore<DiscrepancyStore<SchemeStore<AppendStore<DbStore<DB>>>>>;

/// The assembled chain store stack for one beacon id.
///
/// Composed outer to inner as callback, discrepancy, scheme, append, raw KV.
/// Observers registered with [ChainStore::add_callback] only see beacons
/// that are durably stored. The raw inner handle is reachable through
/// [ChainStore::insecure] and is used exclusively by the resync path, which
/// overwrites faulty rounds and therefore must bypass the append check.
pub struct ChainStore<DB> {
    store: Stack<DB>,
    insecure: DbStore<DB>,
}

impl<DB: Store + Send + Sync> ChainStore<DB> {
    pub fn open(db: Arc<DB>, info: &ChainInfo, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let genesis = Beacon::genesis(&info.genesis_seed);
        let raw = DbStore::open(db, &genesis)?;
        let insecure = raw.clone();
        let append = AppendStore::new(raw)?;
        let scheme = SchemeStore::new(append, info.scheme);
        let discrepancy = DiscrepancyStore::new(scheme, info, clock);
        let store = CallbackStore::new(discrepancy);
        Ok(Self { store, insecure })
    }

    /// Register an observer under `id`. See [CallbackStore::add_callback].
    pub fn add_callback(&self, id: impl Into<String>, callback: StoreCallback) {
        self.store.add_callback(id, callback);
    }

    pub fn remove_callback(&self, id: &str) {
        self.store.remove_callback(id);
    }

    /// Raw store handle bypassing every chain check. Resync only.
    pub fn insecure(&self) -> &DbStore<DB> {
        &self.insecure
    }
}

impl<DB: Store + Send + Sync> BeaconStore for ChainStore<DB> {
    fn put(&self, beacon: Beacon) -> Result<(), Error> {
        self.store.put(beacon)
    }

    fn get(&self, round: u64) -> Result<Beacon, Error> {
        self.store.get(round)
    }

    fn last(&self) -> Result<Beacon, Error> {
        self.store.last()
    }

    fn len(&self) -> Result<u64, Error> {
        self.store.len()
    }

    fn cursor_from(&self, round: u64) -> Result<BeaconCursor<'_>, Error> {
        self.store.cursor_from(round)
    }

    fn del(&self, round: u64) -> Result<(), Error> {
        self.store.del(round)
    }

    fn save_to(&self, writer: &mut dyn Write) -> Result<(), Error> {
        self.store.save_to(writer)
    }

    fn close(&self) -> Result<(), Error> {
        self.store.close()
    }
}

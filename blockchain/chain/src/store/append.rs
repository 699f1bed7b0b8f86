// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{BeaconCursor, BeaconStore, Error};
use lantern_beacon::Beacon;
use parking_lot::{Mutex, RwLock};
use std::io::Write;

/// Enforces the append discipline: a stored round is always the previous
/// round plus one. Puts are serialized behind a mutex and the last beacon is
/// cached so the hot path never touches the database.
pub struct AppendStore<S> {
    inner: S,
    write_lock: Mutex<()>,
    last: RwLock<Beacon>,
}

impl<S: BeaconStore> AppendStore<S> {
    pub fn new(inner: S) -> Result<Self, Error> {
        let last = inner.last()?;
        Ok(Self {
            inner,
            write_lock: Mutex::new(()),
            last: RwLock::new(last),
        })
    }
}

impl<S: BeaconStore> BeaconStore for AppendStore<S> {
    fn put(&self, beacon: Beacon) -> Result<(), Error> {
        let _guard = self.write_lock.lock();
        let last_round = self.last.read().round();
        if beacon.round() != last_round + 1 {
            return Err(Error::InvalidRound {
                last: last_round,
                new: beacon.round(),
            });
        }
        self.inner.put(beacon.clone())?;
        *self.last.write() = beacon;
        Ok(())
    }

    fn get(&self, round: u64) -> Result<Beacon, Error> {
        self.inner.get(round)
    }

    fn last(&self) -> Result<Beacon, Error> {
        Ok(self.last.read().clone())
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

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{BeaconCursor, BeaconStore, Error};
use lantern_beacon::Beacon;
use lantern_db::Store;
use std::io::Write;
use std::sync::Arc;

/// Innermost layer: beacons as CBOR values keyed by big-endian round in a
/// raw KV store. Performs no chain validation whatsoever, which is exactly
/// why the resync path writes through it directly.
pub struct DbStore<DB> {
    db: Arc<DB>,
}

impl<DB> Clone for DbStore<DB> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

fn round_key(round: u64) -> [u8; 8] {
    round.to_be_bytes()
}

impl<DB: Store + Send + Sync> DbStore<DB> {
    /// Open the store, seeding an empty database with the genesis beacon.
    pub fn open(db: Arc<DB>, genesis: &Beacon) -> Result<Self, Error> {
        let store = Self { db };
        match store.get(0) {
            Ok(stored) => {
                if &stored != genesis {
                    return Err(Error::GenesisMismatch);
                }
            }
            Err(Error::NotFound { .. }) => store.put(genesis.clone())?,
            Err(e) => return Err(e),
        }
        Ok(store)
    }
}

impl<DB: Store + Send + Sync> BeaconStore for DbStore<DB> {
    fn put(&self, beacon: Beacon) -> Result<(), Error> {
        let bytes = serde_cbor::to_vec(&beacon)?;
        self.db.write(round_key(beacon.round()), bytes)?;
        Ok(())
    }

    fn get(&self, round: u64) -> Result<Beacon, Error> {
        match self.db.read(round_key(round))? {
            Some(bytes) => Ok(serde_cbor::from_slice(&bytes)?),
            None => Err(Error::NotFound { round }),
        }
    }

    fn last(&self) -> Result<Beacon, Error> {
        match self.db.last()? {
            Some((_, bytes)) => Ok(serde_cbor::from_slice(&bytes)?),
            None => Err(Error::NotFound { round: 0 }),
        }
    }

    fn len(&self) -> Result<u64, Error> {
        Ok(self.db.len()?)
    }

    fn cursor_from(&self, round: u64) -> Result<BeaconCursor<'_>, Error> {
        let iter = self.db.iter_from(round_key(round))?;
        Ok(Box::new(iter.map(|res| {
            let (_, bytes) = res?;
            Ok(serde_cbor::from_slice(&bytes)?)
        })))
    }

    fn del(&self, round: u64) -> Result<(), Error> {
        self.db.delete(round_key(round))?;
        Ok(())
    }

    fn save_to(&self, writer: &mut dyn Write) -> Result<(), Error> {
        for res in self.cursor()? {
            let beacon = res?;
            let bytes = serde_cbor::to_vec(&beacon)?;
            writer.write_all(&(bytes.len() as u32).to_be_bytes())?;
            writer.write_all(&bytes)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{Error, KvIter, KvPair, Store};
use crate::metrics;
pub use sled::{Config, Db, Mode};
use std::path::Path;

/// Sled instance that satisfies the [Store] interface.
///
/// This is the default persistent backend for beacon chains. One database
/// file per beacon id.
#[derive(Debug, Clone)]
pub struct SledDb {
    pub db: Db,
}

impl SledDb {
    pub fn open<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let options = Config::default()
            .path(path)
            .mode(Mode::HighThroughput)
            // 256 mb, beacon records are tiny
            .cache_capacity(1024 * 1024 * 256);
        Ok(Self {
            db: options.open()?,
        })
    }

    /// Open a db with custom configuration.
    pub fn open_with_config(config: Config) -> Result<Self, Error> {
        Ok(Self { db: config.open()? })
    }

    /// Initialize a sled in memory database. This will not persist data.
    pub fn temporary() -> Result<Self, Error> {
        let options = Config::default().temporary(true);
        Ok(Self {
            db: options.open()?,
        })
    }
}

impl Store for SledDb {
    fn write<K, V>(&self, key: K, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        metrics::RECORD_SIZE_BYTES.observe(value.as_ref().len() as f64);
        self.db.insert(key, value.as_ref())?;
        Ok(())
    }

    fn delete<K>(&self, key: K) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
    {
        self.db.remove(key)?;
        Ok(())
    }

    fn read<K>(&self, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<[u8]>,
    {
        Ok(self.db.get(key)?.map(|v| v.as_ref().into()))
    }

    fn exists<K>(&self, key: K) -> Result<bool, Error>
    where
        K: AsRef<[u8]>,
    {
        Ok(self.db.contains_key(key)?)
    }

    fn last(&self) -> Result<Option<KvPair>, Error> {
        Ok(self
            .db
            .last()?
            .map(|(k, v)| (k.as_ref().to_vec(), v.as_ref().to_vec())))
    }

    fn len(&self) -> Result<u64, Error> {
        Ok(self.db.len() as u64)
    }

    fn iter_from<K>(&self, start: K) -> Result<KvIter, Error>
    where
        K: AsRef<[u8]>,
    {
        let iter = self.db.range(start.as_ref().to_vec()..).map(|res| {
            res.map(|(k, v)| (k.as_ref().to_vec(), v.as_ref().to_vec()))
                .map_err(Error::from)
        });
        Ok(Box::new(iter))
    }

    fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{Error, KvIter, KvPair, Store};
use crate::metrics;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A thread-safe in-memory [Store] implementation backed by a `BTreeMap`.
///
/// Keys keep their bytewise order so cursors and `last` behave like the
/// on-disk backends. Mainly used in tests and for ephemeral chains.
#[derive(Debug, Default, Clone)]
pub struct MemoryDB {
    db: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl Store for MemoryDB {
    fn write<K, V>(&self, key: K, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        metrics::RECORD_SIZE_BYTES.observe(value.as_ref().len() as f64);
        self.db
            .write()
            .insert(key.as_ref().to_vec(), value.as_ref().to_vec());
        Ok(())
    }

    fn delete<K>(&self, key: K) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
    {
        self.db.write().remove(key.as_ref());
        Ok(())
    }

    fn read<K>(&self, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<[u8]>,
    {
        Ok(self.db.read().get(key.as_ref()).cloned())
    }

    fn exists<K>(&self, key: K) -> Result<bool, Error>
    where
        K: AsRef<[u8]>,
    {
        Ok(self.db.read().contains_key(key.as_ref()))
    }

    fn last(&self) -> Result<Option<KvPair>, Error> {
        Ok(self
            .db
            .read()
            .iter()
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn len(&self) -> Result<u64, Error> {
        Ok(self.db.read().len() as u64)
    }

    fn iter_from<K>(&self, start: K) -> Result<KvIter, Error>
    where
        K: AsRef<[u8]>,
    {
        let entries: Vec<KvPair> = self
            .db
            .read()
            .range(start.as_ref().to_vec()..)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }
}

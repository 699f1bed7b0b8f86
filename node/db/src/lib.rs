// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod errors;
mod memory;
mod metrics;

#[cfg(feature = "sled")]
pub mod sled;

pub use errors::Error;
pub use memory::MemoryDB;

/// Owned key-value pair returned by cursors and `last`.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Boxed ordered iterator over key-value pairs, ascending by key.
pub type KvIter = Box<dyn Iterator<Item = Result<KvPair, Error>> + Send>;

/// Store interface used as a KV store implementation.
///
/// Keys are ordered bytewise; beacon chains rely on that ordering because
/// rounds are encoded as big-endian integers.
pub trait Store {
    /// Read single value from the data store and return `None` if key doesn't exist.
    fn read<K>(&self, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<[u8]>;

    /// Write a single value to the data store.
    fn write<K, V>(&self, key: K, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>;

    /// Delete value at key.
    fn delete<K>(&self, key: K) -> Result<(), Error>
    where
        K: AsRef<[u8]>;

    /// Returns `Ok(true)` if key exists in the store.
    fn exists<K>(&self, key: K) -> Result<bool, Error>
    where
        K: AsRef<[u8]>;

    /// Returns the entry with the greatest key, or `None` when the store is empty.
    fn last(&self) -> Result<Option<KvPair>, Error>;

    /// Number of entries in the store.
    fn len(&self) -> Result<u64, Error>;

    /// Returns `Ok(true)` when the store holds no entries.
    fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Ordered cursor over all entries with `key >= start`, ascending.
    fn iter_from<K>(&self, start: K) -> Result<KvIter, Error>
    where
        K: AsRef<[u8]>;

    /// Flush any buffered writes to the backing medium.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Write slice of KV pairs.
    fn bulk_write<K, V>(&self, values: &[(K, V)]) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        values
            .iter()
            .try_for_each(|(key, value)| self.write(key, value))
    }

    /// Bulk delete keys from the data store.
    fn bulk_delete<K>(&self, keys: &[K]) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
    {
        keys.iter().try_for_each(|key| self.delete(key))
    }
}

impl<BS: Store> Store for &BS {
    fn read<K>(&self, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<[u8]>,
    {
        (*self).read(key)
    }

    fn write<K, V>(&self, key: K, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        (*self).write(key, value)
    }

    fn delete<K>(&self, key: K) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
    {
        (*self).delete(key)
    }

    fn exists<K>(&self, key: K) -> Result<bool, Error>
    where
        K: AsRef<[u8]>,
    {
        (*self).exists(key)
    }

    fn last(&self) -> Result<Option<KvPair>, Error> {
        (*self).last()
    }

    fn len(&self) -> Result<u64, Error> {
        (*self).len()
    }

    fn iter_from<K>(&self, start: K) -> Result<KvIter, Error>
    where
        K: AsRef<[u8]>,
    {
        (*self).iter_from(start)
    }

    fn flush(&self) -> Result<(), Error> {
        (*self).flush()
    }

    fn bulk_write<K, V>(&self, values: &[(K, V)]) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        (*self).bulk_write(values)
    }

    fn bulk_delete<K>(&self, keys: &[K]) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
    {
        (*self).bulk_delete(keys)
    }
}

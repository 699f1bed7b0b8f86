// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod append;
mod callback;
mod chain_store;
mod db_store;
mod discrepancy;
mod errors;
pub mod metrics;
mod scheme;

pub use self::append::*;
pub use self::callback::*;
pub use self::chain_store::*;
pub use self::db_store::*;
pub use self::discrepancy::*;
pub use self::errors::*;
pub use self::scheme::*;

use lantern_beacon::Beacon;
use std::io::Write;

/// Ordered iterator over stored beacons, ascending by round.
pub type BeaconCursor<'a> = Box<dyn Iterator<Item = Result<Beacon, Error>> + Send + 'a>;

/// Common contract implemented by every layer of the chain store stack.
///
/// Layers own their inner store and forward the operations they don't
/// specialize, forming a typed decorator chain.
pub trait BeaconStore: Send + Sync {
    /// Append a beacon to the chain.
    fn put(&self, beacon: Beacon) -> Result<(), Error>;

    /// Beacon stored for `round`.
    fn get(&self, round: u64) -> Result<Beacon, Error>;

    /// The most recently stored beacon; genesis when the chain is empty.
    fn last(&self) -> Result<Beacon, Error>;

    /// Number of stored beacons, genesis included.
    fn len(&self) -> Result<u64, Error>;

    /// Cursor over all rounds in increasing order.
    fn cursor(&self) -> Result<BeaconCursor<'_>, Error> {
        self.cursor_from(0)
    }

    /// Cursor over rounds `>= round` in increasing order.
    fn cursor_from(&self, round: u64) -> Result<BeaconCursor<'_>, Error>;

    /// Remove the beacon stored for `round`.
    fn del(&self, round: u64) -> Result<(), Error>;

    /// Stream every stored beacon to `writer` as length-prefixed CBOR
    /// records in round order, for backups.
    fn save_to(&self, writer: &mut dyn Write) -> Result<(), Error>;

    /// Release resources; flushes the backing store.
    fn close(&self) -> Result<(), Error>;
}

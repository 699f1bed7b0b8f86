// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{BeaconCursor, BeaconStore, Error};
use lantern_beacon::Beacon;
use lantern_crypto::SchemeId;
use std::io::Write;

/// Applies the scheme-dependent linking rules before the append check runs.
///
/// A retried put of a byte-identical beacon for the last stored round
/// reports [Error::AlreadyStored]; the callback layer absorbs that into
/// success without re-notifying observers. A same-round put with different
/// bytes is rejected outright. On chained schemes the previous signature
/// must link to the last beacon; on unchained schemes it is dropped before
/// storage.
pub struct SchemeStore<S> {
    inner: S,
    chained: bool,
}

impl<S: BeaconStore> SchemeStore<S> {
    pub fn new(inner: S, scheme: SchemeId) -> Self {
        Self {
            inner,
            chained: scheme.is_chained(),
        }
    }
}

impl<S: BeaconStore> BeaconStore for SchemeStore<S> {
    fn put(&self, mut beacon: Beacon) -> Result<(), Error> {
        if !self.chained {
            beacon.clear_previous_sig();
        }
        let last = self.inner.last()?;
        if beacon.round() == last.round() {
            return if beacon.signature() == last.signature()
                && beacon.previous_sig() == last.previous_sig()
            {
                Err(Error::AlreadyStored {
                    round: beacon.round(),
                })
            } else {
                Err(Error::DuplicateDifferent {
                    round: beacon.round(),
                })
            };
        }
        if self.chained
            && beacon.round() == last.round() + 1
            && beacon.previous_sig() != last.signature()
        {
            return Err(Error::PrevSigMismatch {
                round: beacon.round(),
            });
        }
        self.inner.put(beacon)
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

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod aggregator;
mod chain_loop;
mod errors;
mod handler;
mod manager;
pub mod metrics;
mod multibeacon;
mod provider;
mod validation;

pub use aggregator::PARTIAL_CACHE_STORE_LIMIT;
pub use errors::Error;
pub use handler::{Handler, MAX_CATCHUP_BUFFER};
pub use manager::{SyncRequestMsg, SyncSender, FACTOR, MAX_SYNC_WAIT};
pub use multibeacon::BeaconProcess;
pub use provider::sync_chain;
pub use validation::check_past_beacons;

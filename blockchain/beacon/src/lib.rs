// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod beacon_entries;
mod cache;
mod chain_info;
mod config;
mod group;
pub mod mock;
mod partial;
mod vault;

pub use beacon_entries::*;
pub use cache::*;
pub use chain_info::*;
pub use config::*;
pub use group::*;
pub use partial::*;
pub use vault::*;

/// Serde helper storing a `Duration` as whole seconds.
pub(crate) mod serde_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(dur: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dur.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: u64 = Deserialize::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

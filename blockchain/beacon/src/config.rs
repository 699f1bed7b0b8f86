// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context;
use lantern_crypto::SchemeId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-beacon-id configuration. The process accepts one of these per beacon
/// id and multiplexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconConfig {
    #[serde(default = "default_beacon_id")]
    pub beacon_id: String,
    /// Seconds between beacons.
    #[serde(with = "crate::serde_secs")]
    pub period: Duration,
    /// Unix time of round 1.
    pub genesis_time: u64,
    /// Hex-encoded genesis seed, the signature of round 0.
    #[serde(with = "hex::serde")]
    pub genesis_seed: Vec<u8>,
    /// Unix time at which the next group takes over; zero when no transition
    /// is scheduled.
    #[serde(default)]
    pub transition_time: u64,
    /// Seconds to wait before re-broadcasting on top of a late beacon.
    #[serde(with = "crate::serde_secs", default = "default_catchup_period")]
    pub catchup_period: Duration,
    /// Partials required per round.
    pub threshold: u16,
    #[serde(default)]
    pub scheme: SchemeId,
    /// Path of the chain database for this beacon id.
    pub db_path: PathBuf,
}

impl BeaconConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("could not read beacon config at {}", path.display()))?;
        let config: BeaconConfig = toml::from_str(&raw)
            .with_context(|| format!("could not parse beacon config at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.period.as_secs() > 0, "period must be non-zero");
        anyhow::ensure!(self.genesis_time > 0, "genesis time must be non-zero");
        anyhow::ensure!(self.threshold > 0, "threshold must be non-zero");
        anyhow::ensure!(!self.genesis_seed.is_empty(), "genesis seed is empty");
        Ok(())
    }
}

fn default_beacon_id() -> String {
    "default".to_owned()
}

fn default_catchup_period() -> Duration {
    Duration::from_secs(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let raw = r#"
            period = 30
            genesis_time = 1600000000
            genesis_seed = "deadbeef"
            threshold = 3
            db_path = "/var/lib/lantern/default"
        "#;
        let config: BeaconConfig = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.beacon_id, "default");
        assert_eq!(config.period, Duration::from_secs(30));
        assert_eq!(config.genesis_seed, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(config.scheme, SchemeId::Chained);
        assert_eq!(config.catchup_period, Duration::from_secs(1));
    }

    #[test]
    fn parses_unchained_scheme() {
        let raw = r#"
            beacon_id = "quicknet"
            period = 3
            genesis_time = 1600000000
            genesis_seed = "00ff"
            threshold = 2
            scheme = "pedersen-bls-unchained"
            db_path = "/tmp/quicknet"
        "#;
        let config: BeaconConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.scheme, SchemeId::Unchained);
        assert_eq!(config.beacon_id, "quicknet");
    }

    #[test]
    fn rejects_zero_period() {
        let raw = r#"
            period = 0
            genesis_time = 1600000000
            genesis_seed = "00"
            threshold = 2
            db_path = "/tmp/x"
        "#;
        let config: BeaconConfig = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }
}

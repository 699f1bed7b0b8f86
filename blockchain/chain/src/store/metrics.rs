// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lazy_static::lazy_static;
use prometheus::{
    core::{AtomicU64, GenericGaugeVec},
    HistogramOpts, HistogramVec, IntGaugeVec, Opts,
};

lazy_static! {
    pub static ref LAST_BEACON_ROUND: Box<GenericGaugeVec<AtomicU64>> = {
        let last_beacon_round = Box::new(
            GenericGaugeVec::<AtomicU64>::new(
                Opts::new("last_round", "Last round stored on the chain"),
                &[labels::BEACON_ID],
            )
            .expect("Defining the last_round metric must succeed"),
        );
        prometheus::default_registry()
            .register(last_beacon_round.clone())
            .expect("Registering the last_round metric with the metrics registry must succeed");
        last_beacon_round
    };
    pub static ref BEACON_DISCREPANCY_MS: Box<IntGaugeVec> = {
        let beacon_discrepancy = Box::new(
            IntGaugeVec::new(
                Opts::new(
                    "beacon_discrepancy_ms",
                    "Milliseconds between a beacon's scheduled time and the moment it was stored",
                ),
                &[labels::BEACON_ID],
            )
            .expect("Defining the beacon_discrepancy_ms metric must succeed"),
        );
        prometheus::default_registry().register(beacon_discrepancy.clone()).expect(
            "Registering the beacon_discrepancy_ms metric with the metrics registry must succeed",
        );
        beacon_discrepancy
    };
    pub static ref STORAGE_TIME_MS: Box<HistogramVec> = {
        let storage_time = Box::new(
            HistogramVec::new(
                HistogramOpts::new(
                    "storage_time_ms",
                    "Milliseconds spent writing a beacon to the chain store",
                )
                .buckets(vec![0.5, 1., 2., 5., 10., 25., 50., 100., 250., 500.]),
                &[labels::BEACON_ID],
            )
            .expect("Defining the storage_time_ms metric must succeed"),
        );
        prometheus::default_registry()
            .register(storage_time.clone())
            .expect("Registering the storage_time_ms metric with the metrics registry must succeed");
        storage_time
    };
}

pub mod labels {
    pub const BEACON_ID: &str = "beacon_id";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_defined_and_registered() {
        let _ = LAST_BEACON_ROUND.with_label_values(&["default"]);
        let _ = BEACON_DISCREPANCY_MS.with_label_values(&["default"]);
        let _ = STORAGE_TIME_MS.with_label_values(&["default"]);
    }
}

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lazy_static::lazy_static;
use prometheus::{
    core::{AtomicU64, GenericCounter, GenericGaugeVec},
    Opts,
};

lazy_static! {
    pub static ref GROUP_SIZE: Box<GenericGaugeVec<AtomicU64>> = {
        let group_size = Box::new(
            GenericGaugeVec::<AtomicU64>::new(
                Opts::new("group_size", "Number of nodes in the current group"),
                &[labels::BEACON_ID],
            )
            .expect("Defining the group_size metric must succeed"),
        );
        prometheus::default_registry()
            .register(group_size.clone())
            .expect("Registering the group_size metric with the metrics registry must succeed");
        group_size
    };
    pub static ref GROUP_THRESHOLD: Box<GenericGaugeVec<AtomicU64>> = {
        let group_threshold = Box::new(
            GenericGaugeVec::<AtomicU64>::new(
                Opts::new("threshold", "Partials required to produce a round"),
                &[labels::BEACON_ID],
            )
            .expect("Defining the threshold metric must succeed"),
        );
        prometheus::default_registry()
            .register(group_threshold.clone())
            .expect("Registering the threshold metric with the metrics registry must succeed");
        group_threshold
    };
    pub static ref SYNC_FAILURE_TOTAL: Box<GenericCounter<AtomicU64>> = {
        let sync_failure_total = Box::new(
            GenericCounter::<AtomicU64>::new(
                "sync_failure_total",
                "Total number of sync tasks that exhausted every peer",
            )
            .expect("Defining the sync_failure_total metric must succeed"),
        );
        prometheus::default_registry()
            .register(sync_failure_total.clone())
            .expect(
                "Registering the sync_failure_total metric with the metrics registry must succeed",
            );
        sync_failure_total
    };
}

pub mod labels {
    pub const BEACON_ID: &str = "beacon_id";
}

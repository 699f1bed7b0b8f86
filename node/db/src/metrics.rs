// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts};

lazy_static! {
    pub static ref RECORD_SIZE_BYTES: Box<Histogram> = {
        let record_size = Box::new(
            Histogram::with_opts(
                HistogramOpts::new("record_size_bytes", "Histogram of stored record sizes")
                    .buckets(vec![32., 64., 128., 256., 512., 1024., 2048., 4096.]),
            )
            .expect("Defining the record_size_bytes metric must succeed"),
        );

        prometheus::default_registry()
            .register(record_size.clone())
            .expect("Registering the record_size_bytes metric with the metrics registry must succeed");
        record_size
    };
}

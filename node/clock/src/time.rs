// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Round arithmetic anchored at the chain genesis. Round 0 is the genesis
//! seed; round 1 is produced at `genesis_time` and round `r` at
//! `genesis_time + (r - 1) * period`.

use std::time::Duration;

/// Returns the next upcoming round and its unix time.
///
/// Before genesis this is always `(1, genesis_time)`.
pub fn next_round(now: u64, period: Duration, genesis_time: u64) -> (u64, u64) {
    if now < genesis_time {
        return (1, genesis_time);
    }
    let period = period.as_secs();
    let from_genesis = now - genesis_time;
    // we add +1 because round 1 starts at genesis time
    let round = from_genesis / period + 1;
    (round + 1, genesis_time + round * period)
}

/// Round in effect at time `now`; 0 before genesis.
pub fn current_round(now: u64, period: Duration, genesis_time: u64) -> u64 {
    let (next, _) = next_round(now, period, genesis_time);
    next - 1
}

/// Unix time at which `round` is due. Round 0 maps to genesis.
pub fn time_of_round(period: Duration, genesis_time: u64, round: u64) -> u64 {
    if round == 0 {
        return genesis_time;
    }
    genesis_time + (round - 1) * period.as_secs()
}

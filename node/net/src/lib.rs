// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod errors;
mod memory;
mod message;
mod transport;

pub use errors::Error;
pub use memory::*;
pub use message::*;
pub use transport::*;

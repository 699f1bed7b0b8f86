// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod errors;
mod scheme;
mod tbls;

pub use errors::Error;
pub use scheme::*;
pub use tbls::*;

pub use blsttc::{
    PublicKey, PublicKeySet, PublicKeyShare, SecretKeySet, SecretKeyShare, Signature,
    SignatureShare, PK_SIZE, SIG_SIZE,
};

// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Threshold BLS partial signatures.
//!
//! A partial on the wire is the signer index as a big-endian `u16` followed
//! by the signature share bytes; the index is what the recovery step uses to
//! interpolate, so it is authenticated by the threshold scheme itself.

use crate::Error;
use blsttc::{PublicKey, PublicKeySet, SecretKeyShare, Signature, SignatureShare, SIG_SIZE};
use byteorder::{BigEndian, ByteOrder};
use std::collections::BTreeMap;

/// Bytes of the big-endian signer index prefixing a partial signature.
pub const INDEX_LEN: usize = 2;

/// Sign `msg` with a secret key share, embedding the signer index.
pub fn sign_partial(share: &SecretKeyShare, index: u32, msg: &[u8]) -> Vec<u8> {
    let sig = share.sign(msg);
    let mut out = Vec::with_capacity(INDEX_LEN + SIG_SIZE);
    let mut prefix = [0u8; INDEX_LEN];
    BigEndian::write_u16(&mut prefix, index as u16);
    out.extend_from_slice(&prefix);
    out.extend_from_slice(&sig.to_bytes());
    out
}

/// Signer index embedded in a partial signature.
pub fn signer_index(partial: &[u8]) -> Result<u32, Error> {
    if partial.len() < INDEX_LEN + SIG_SIZE {
        return Err(Error::TruncatedPartial(partial.len()));
    }
    Ok(BigEndian::read_u16(&partial[..INDEX_LEN]) as u32)
}

/// Signature share carried by a partial signature.
pub fn partial_share(partial: &[u8]) -> Result<SignatureShare, Error> {
    if partial.len() < INDEX_LEN + SIG_SIZE {
        return Err(Error::TruncatedPartial(partial.len()));
    }
    let bytes: [u8; SIG_SIZE] = partial[INDEX_LEN..INDEX_LEN + SIG_SIZE]
        .try_into()
        .expect("length checked above");
    SignatureShare::from_bytes(bytes).map_err(|e| Error::MalformedSignature(e.to_string()))
}

/// Verify a partial against the signer's public key share.
pub fn verify_partial(public: &PublicKeySet, msg: &[u8], partial: &[u8]) -> Result<(), Error> {
    let index = signer_index(partial)?;
    let share = partial_share(partial)?;
    if public.public_key_share(index as usize).verify(&share, msg) {
        Ok(())
    } else {
        Err(Error::InvalidPartial)
    }
}

/// Recover the full threshold signature from a set of partials.
///
/// Recovery needs at least `threshold` valid shares over the same message;
/// a forged share in the set makes the interpolated signature invalid, which
/// the caller detects with [verify_signature].
pub fn recover<'a, I>(public: &PublicKeySet, partials: I) -> Result<Signature, Error>
where
    I: IntoIterator<Item = &'a Vec<u8>>,
{
    let mut shares: BTreeMap<usize, SignatureShare> = BTreeMap::new();
    for partial in partials {
        let index = signer_index(partial)?;
        let share = partial_share(partial)?;
        shares.insert(index as usize, share);
    }
    public
        .combine_signatures(shares.iter().map(|(i, s)| (*i, s)))
        .map_err(|e| Error::RecoveryFailed(e.to_string()))
}

/// Verify a recovered signature against the distributed public key.
pub fn verify_signature(public: &PublicKey, msg: &[u8], sig: &[u8]) -> Result<(), Error> {
    let bytes: [u8; SIG_SIZE] = sig
        .try_into()
        .map_err(|_| Error::MalformedSignature(format!("{} bytes", sig.len())))?;
    let sig = Signature::from_bytes(bytes).map_err(|e| Error::MalformedSignature(e.to_string()))?;
    if public.verify(&sig, msg) {
        Ok(())
    } else {
        Err(Error::InvalidRecovered)
    }
}

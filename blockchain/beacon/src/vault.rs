// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Group;
use lantern_crypto::{
    self as crypto, Error as CryptoError, PublicKeySet, SchemeId, SecretKeyShare, Signature,
};
use parking_lot::RwLock;
use std::sync::Arc;

/// This node's secret scalar of the distributed key, together with its index.
/// Exclusively owned by the [Vault]; never serialized, never leaves the
/// process.
pub struct Share {
    index: u32,
    secret: SecretKeyShare,
}

impl Share {
    pub fn new(index: u32, secret: SecretKeyShare) -> Self {
        Self { index, secret }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn secret(&self) -> &SecretKeyShare {
        &self.secret
    }
}

struct VaultState {
    share: Share,
    group: Arc<Group>,
}

/// Holds the current share and group behind one lock. All signing and
/// verification goes through here so an epoch transition can swap both
/// atomically with [Vault::set_info].
pub struct Vault {
    state: RwLock<VaultState>,
}

impl Vault {
    pub fn new(share: Share, group: Arc<Group>) -> Self {
        Self {
            state: RwLock::new(VaultState { share, group }),
        }
    }

    /// Message of `round` under the current scheme.
    pub fn digest_beacon(&self, round: u64, previous_sig: &[u8]) -> Vec<u8> {
        self.state
            .read()
            .group
            .scheme
            .digest_beacon(round, previous_sig)
    }

    /// Produce our partial signature over `msg`; the embedded index equals
    /// this node's share index.
    pub fn sign_partial(&self, msg: &[u8]) -> Vec<u8> {
        let state = self.state.read();
        crypto::sign_partial(&state.share.secret, state.share.index, msg)
    }

    /// Verify a peer's partial against its public key share.
    pub fn verify_partial(&self, msg: &[u8], partial: &[u8]) -> Result<(), CryptoError> {
        let state = self.state.read();
        let index = crypto::signer_index(partial)?;
        if !state.group.contains_index(index) {
            return Err(CryptoError::BadIndex(index));
        }
        crypto::verify_partial(&state.group.public_key, msg, partial)
    }

    /// Verify a recovered signature against the distributed public key.
    pub fn verify_recovered(&self, msg: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let state = self.state.read();
        crypto::verify_signature(&state.group.public_key.public_key(), msg, signature)
    }

    /// Recover the full threshold signature from collected partials.
    pub fn recover<'a, I>(&self, partials: I) -> Result<Signature, CryptoError>
    where
        I: IntoIterator<Item = &'a Vec<u8>>,
    {
        let state = self.state.read();
        crypto::recover(&state.group.public_key, partials)
    }

    /// Atomic swap of group and share at an epoch transition.
    pub fn set_info(&self, group: Arc<Group>, share: Share) {
        let mut state = self.state.write();
        *state = VaultState { share, group };
    }

    pub fn index(&self) -> u32 {
        self.state.read().share.index
    }

    pub fn group(&self) -> Arc<Group> {
        Arc::clone(&self.state.read().group)
    }

    pub fn public(&self) -> PublicKeySet {
        self.state.read().group.public_key.clone()
    }

    pub fn scheme(&self) -> SchemeId {
        self.state.read().group.scheme
    }

    pub fn threshold(&self) -> usize {
        self.state.read().group.threshold_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::TestGroup;

    #[test]
    fn sign_and_verify_partial() {
        let setup = TestGroup::new(3, 2);
        let vault = setup.vault(1);
        let msg = vault.digest_beacon(1, setup.group.genesis_seed.as_slice());
        let partial = vault.sign_partial(&msg);
        assert_eq!(crypto::signer_index(&partial).unwrap(), 1);
        assert!(vault.verify_partial(&msg, &partial).is_ok());
    }

    #[test]
    fn rejects_index_outside_group() {
        let setup = TestGroup::new(3, 2);
        let outside = TestGroup::new(6, 4);
        let vault = setup.vault(0);
        let msg = vault.digest_beacon(1, &[]);
        let partial = crypto::sign_partial(outside.shares[5].secret(), 5, &msg);
        assert_eq!(
            vault.verify_partial(&msg, &partial),
            Err(CryptoError::BadIndex(5))
        );
    }

    #[test]
    fn recover_from_threshold_partials() {
        let setup = TestGroup::new(4, 3);
        let vault = setup.vault(0);
        let msg = vault.digest_beacon(2, &[1u8; 96]);
        let partials: Vec<Vec<u8>> = (0..3u32)
            .map(|i| crypto::sign_partial(setup.shares[i as usize].secret(), i, &msg))
            .collect();
        let sig = vault.recover(partials.iter()).unwrap();
        assert!(vault.verify_recovered(&msg, &sig.to_bytes()).is_ok());
    }

    #[test]
    fn set_info_swaps_identity() {
        let setup = TestGroup::new(3, 2);
        let next = TestGroup::new(5, 3);
        let vault = setup.vault(0);
        assert_eq!(vault.group().size(), 3);

        vault.set_info(Arc::clone(&next.group), next.share(4));
        assert_eq!(vault.index(), 4);
        assert_eq!(vault.group().size(), 5);

        // partials signed after the swap verify under the new key only
        let msg = vault.digest_beacon(9, &[]);
        let partial = vault.sign_partial(&msg);
        assert!(crypto::verify_partial(&next.group.public_key, &msg, &partial).is_ok());
        assert!(crypto::verify_partial(&setup.group.public_key, &msg, &partial).is_err());
    }
}

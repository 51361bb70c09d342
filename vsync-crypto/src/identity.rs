//! The public half of an identity: what one account hands another so it can
//! address a [`crate::primitives::SignedBox`] to it and verify its signatures.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use x25519_dalek::PublicKey as XPublicKey;

use crate::error::{CryptoError, Result};
use crate::managers::IdentityCryptoManager;

/// An identity's signing and box public keys, bundled together: recipients
/// need both to verify a [`crate::primitives::SignedBox`] and to address one
/// back, so they are always exchanged as a pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPublicKey {
    pub verifying_key: [u8; 32],
    pub box_public: [u8; 32],
}

impl IdentityPublicKey {
    pub fn of(identity_mgr: &IdentityCryptoManager) -> Self {
        Self {
            verifying_key: identity_mgr.verifying_key().to_bytes(),
            box_public: *identity_mgr.box_public().as_bytes(),
        }
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.verifying_key).map_err(|_| CryptoError::Encoding)
    }

    pub fn box_public(&self) -> XPublicKey {
        XPublicKey::from(self.box_public)
    }
}

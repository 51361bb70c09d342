//! [`SignedInvitation`]: a collection key wrapped for one specific invitee,
//! signed by the inviter's identity so the invitee can authenticate who
//! shared it.

use serde::{Deserialize, Serialize};

use crate::collection::{self, AccessLevel, EncryptedCollection};
use crate::error::Result;
use crate::identity::IdentityPublicKey;
use crate::managers::{AccountCryptoManager, IdentityCryptoManager};
use crate::primitives::{Key, SignedBox};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedInvitation {
    pub uid: String,
    pub version: u8,
    pub collection_uid: String,
    pub from_username: String,
    pub from_pubkey: IdentityPublicKey,
    pub to_username: String,
    pub to_pubkey: IdentityPublicKey,
    pub access_level: AccessLevel,
    pub signed_encryption_key: SignedBox,
    /// Forwarded unchanged from the collection — opaque until accepted and
    /// decrypted under the recovered collection key.
    pub collection_type: Vec<u8>,
}

impl SignedInvitation {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        collection: &EncryptedCollection,
        account_mgr: &AccountCryptoManager,
        identity_mgr: &IdentityCryptoManager,
        from_username: &str,
        to_username: &str,
        to_identity: &IdentityPublicKey,
        access_level: AccessLevel,
    ) -> Result<Self> {
        let signed_encryption_key = collection.seal_invitation_key(
            account_mgr,
            identity_mgr,
            &to_identity.box_public(),
            access_level,
        )?;

        Ok(Self {
            uid: crate::primitives::generate_uid(),
            version: 1,
            collection_uid: collection.uid.clone(),
            from_username: from_username.to_string(),
            from_pubkey: IdentityPublicKey::of(identity_mgr),
            to_username: to_username.to_string(),
            to_pubkey: to_identity.clone(),
            access_level,
            signed_encryption_key,
            collection_type: collection.collection_type.clone(),
        })
    }

    /// Verify the inviter's signature and recover the plaintext collection
    /// key. Callers that accept on behalf of `to_pubkey` must check it
    /// matches their own identity before calling this — a mismatch here
    /// means the invitation was addressed to someone else.
    pub fn recover_collection_key(&self, identity_mgr: &IdentityCryptoManager) -> Result<Key> {
        let raw = collection::recover_invitation_key(
            &self.from_pubkey,
            identity_mgr,
            &self.collection_uid,
            self.access_level,
            &self.signed_encryption_key,
        )?;
        Ok(zeroize::Zeroizing::new(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::IdentityCryptoManager;
    use crate::primitives::random_key;

    #[test]
    fn invite_then_accept_roundtrip() {
        let acct = AccountCryptoManager::from_account_key(random_key());
        let (_sender_priv, sender_identity) = IdentityCryptoManager::generate();
        let (_recipient_priv, recipient_identity) = IdentityCryptoManager::generate();
        let recipient_pub = IdentityPublicKey::of(&recipient_identity);

        let mut collection = EncryptedCollection::create(&acct, b"type", b"meta", b"content").unwrap();
        collection.uid = "col-1".into();

        let invite = SignedInvitation::create(
            &collection,
            &acct,
            &sender_identity,
            "alice",
            "bob",
            &recipient_pub,
            AccessLevel::ReadWrite,
        )
        .unwrap();

        let recovered = invite.recover_collection_key(&recipient_identity).unwrap();
        let expected = acct.decrypt_collection_key(&collection.collection_key).unwrap();
        assert_eq!(recovered.as_ref(), expected.as_ref());
    }

    #[test]
    fn accept_rejects_wrong_recipient_identity() {
        let acct = AccountCryptoManager::from_account_key(random_key());
        let (_sender_priv, sender_identity) = IdentityCryptoManager::generate();
        let (_recipient_priv, recipient_identity) = IdentityCryptoManager::generate();
        let (_eve_priv, eve_identity) = IdentityCryptoManager::generate();
        let recipient_pub = IdentityPublicKey::of(&recipient_identity);

        let mut collection = EncryptedCollection::create(&acct, b"type", b"meta", b"content").unwrap();
        collection.uid = "col-1".into();

        let invite = SignedInvitation::create(
            &collection,
            &acct,
            &sender_identity,
            "alice",
            "bob",
            &recipient_pub,
            AccessLevel::ReadOnly,
        )
        .unwrap();

        assert!(invite.recover_collection_key(&eve_identity).is_err());
    }
}

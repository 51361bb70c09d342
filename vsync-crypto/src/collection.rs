//! [`EncryptedCollection`]: the top-level container. Its own meta/content
//! live in a sentinel [`EncryptedCollectionItem`]; membership and type are
//! sealed separately under the collection key.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use x25519_dalek::PublicKey as XPublicKey;

use crate::error::Result;
use crate::identity::IdentityPublicKey;
use crate::item::EncryptedCollectionItem;
use crate::managers::{AccountCryptoManager, CollectionCryptoManager, IdentityCryptoManager};
use crate::primitives::{self, SignedBox};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccessLevel {
    ReadOnly = 0,
    ReadWrite = 1,
    Admin = 2,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedCollection {
    /// Server-assigned opaque identifier. Empty until the first successful
    /// upload of a newly created collection.
    pub uid: String,
    pub version: u8,
    pub access_level: AccessLevel,
    /// `collectionKey` sealed under the owning account's `accountKey` (or,
    /// for a collection joined via invitation, re-sealed there on accept).
    pub collection_key: Vec<u8>,
    /// Application-defined type tag, sealed under the collection key.
    pub collection_type: Vec<u8>,
    pub item: EncryptedCollectionItem,
    pub etag: Option<String>,
    /// Sync cursor for this collection's item/member changes.
    pub stoken: Option<String>,
    pub removed_memberships: Option<Vec<String>>,
}

impl EncryptedCollection {
    pub fn create(
        account_mgr: &AccountCryptoManager,
        collection_type: &[u8],
        meta: &[u8],
        content: &[u8],
    ) -> Result<Self> {
        let collection_key = primitives::random_key();
        let collection_key_sealed = account_mgr.encrypt_collection_key(&collection_key)?;

        let col_mgr = CollectionCryptoManager::from_key(collection_key);
        let item = EncryptedCollectionItem::create_sentinel(&col_mgr, meta, content)?;
        let collection_type_sealed = col_mgr.encrypt("ColType", collection_type)?;

        Ok(Self {
            uid: String::new(),
            version: 1,
            access_level: AccessLevel::Admin,
            collection_key: collection_key_sealed,
            collection_type: collection_type_sealed,
            item,
            etag: None,
            stoken: None,
            removed_memberships: None,
        })
    }

    pub fn crypto_manager(&self, account_mgr: &AccountCryptoManager) -> Result<CollectionCryptoManager> {
        let key = account_mgr.decrypt_collection_key(&self.collection_key)?;
        Ok(CollectionCryptoManager::from_key(key))
    }

    pub fn decrypt_collection_type(&self, col_mgr: &CollectionCryptoManager) -> Result<Vec<u8>> {
        col_mgr.decrypt("ColType", &self.collection_type)
    }

    pub fn set_meta(&mut self, col_mgr: &CollectionCryptoManager, meta: &[u8]) -> Result<()> {
        self.item.set_meta(col_mgr, meta)
    }

    pub fn set_content(&mut self, col_mgr: &CollectionCryptoManager, content: &[u8]) -> Result<()> {
        self.item.set_content(col_mgr, content)
    }

    pub fn verify(&self, col_mgr: &CollectionCryptoManager) -> Result<()> {
        self.item.verify(col_mgr)
    }

    pub fn is_unsaved(&self) -> bool {
        self.uid.is_empty() || self.item.is_unsaved()
    }

    pub fn mark_saved(&mut self, uid: String, etag: String) {
        self.uid = uid;
        self.etag = Some(etag);
        self.item.mark_saved();
    }

    /// Re-derive a fresh random collection key and re-seal it. Callers must
    /// then re-seal every member's and invitee's wrapped copy of the key —
    /// this only rotates the owner's own copy.
    pub fn rotate_key(&mut self, account_mgr: &AccountCryptoManager) -> Result<()> {
        let new_key = primitives::random_key();
        self.collection_key = account_mgr.encrypt_collection_key(&new_key)?;
        Ok(())
    }

    /// Seal the collection key for `to_pubkey`, signed by `identity_mgr`, to
    /// be carried inside a [`crate::invitation::SignedInvitation`].
    pub fn seal_invitation_key(
        &self,
        account_mgr: &AccountCryptoManager,
        identity_mgr: &IdentityCryptoManager,
        to_pubkey: &XPublicKey,
        access_level: AccessLevel,
    ) -> Result<SignedBox> {
        let key = account_mgr.decrypt_collection_key(&self.collection_key)?;
        let ad = invitation_ad(&self.uid, access_level);
        identity_mgr.seal_signed(to_pubkey, key.as_ref(), &ad)
    }
}

pub(crate) fn invitation_ad(collection_uid: &str, access_level: AccessLevel) -> Vec<u8> {
    let mut buf = Vec::with_capacity(b"Invite".len() + collection_uid.len() + 1);
    buf.extend_from_slice(b"Invite");
    buf.extend_from_slice(collection_uid.as_bytes());
    buf.push(access_level as u8);
    buf
}

pub(crate) fn recover_invitation_key(
    from: &IdentityPublicKey,
    identity_mgr: &IdentityCryptoManager,
    collection_uid: &str,
    access_level: AccessLevel,
    sealed: &SignedBox,
) -> Result<[u8; 32]> {
    let from_verify: VerifyingKey = from.verifying_key()?;
    let from_box_pub = from.box_public();
    let ad = invitation_ad(collection_uid, access_level);
    let key = identity_mgr.open_verified(&from_verify, &from_box_pub, sealed, &ad)?;
    key.as_slice()
        .try_into()
        .map_err(|_| crate::error::CryptoError::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::random_key;

    fn account_mgr() -> AccountCryptoManager {
        AccountCryptoManager::from_account_key(random_key())
    }

    #[test]
    fn create_then_verify() {
        let acct = account_mgr();
        let col = EncryptedCollection::create(&acct, b"addressbook", b"meta", b"content").unwrap();
        let mgr = col.crypto_manager(&acct).unwrap();
        col.verify(&mgr).unwrap();
        assert_eq!(col.decrypt_collection_type(&mgr).unwrap(), b"addressbook");
    }

    #[test]
    fn rotate_key_changes_sealed_bytes_but_mgr_decrypts() {
        let acct = account_mgr();
        let mut col = EncryptedCollection::create(&acct, b"type", b"meta", b"content").unwrap();
        let before = col.collection_key.clone();
        col.rotate_key(&acct).unwrap();
        assert_ne!(before, col.collection_key);
        // New collection_mgr reflects the new key; old item content no
        // longer decrypts under it since it was sealed with the old key.
        let new_mgr = col.crypto_manager(&acct).unwrap();
        assert!(col.verify(&new_mgr).is_err());
    }

    #[test]
    fn is_unsaved_until_marked() {
        let acct = account_mgr();
        let mut col = EncryptedCollection::create(&acct, b"type", b"meta", b"content").unwrap();
        assert!(col.is_unsaved());
        let revision_uid = col.item.content.uid.clone();
        col.mark_saved("server-uid".into(), revision_uid);
        assert!(!col.is_unsaved());
    }
}

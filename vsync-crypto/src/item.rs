//! [`EncryptedCollectionItem`]: one item inside a collection, with its own
//! optional per-item key and its current [`EncryptedRevision`].

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::managers::{CollectionCryptoManager, CollectionItemCryptoManager};
use crate::primitives::{self, Key};
use crate::revision::EncryptedRevision;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedCollectionItem {
    pub uid: String,
    pub version: u8,
    /// `item_key` sealed under the collection key. `None` means the item
    /// has no dedicated key and is encrypted directly with the collection
    /// key — used for a collection's own sentinel item.
    pub encryption_key: Option<Vec<u8>>,
    pub content: EncryptedRevision,
    /// Set once the server has accepted a revision of this item.
    pub etag: Option<String>,
    /// The etag the sync engine last confirmed uploaded successfully.
    pub last_etag: Option<String>,
}

impl EncryptedCollectionItem {
    pub fn create(col_mgr: &CollectionCryptoManager, meta: &[u8], content: &[u8]) -> Result<Self> {
        let item_key = primitives::random_key();
        let encryption_key = Some(col_mgr.encrypt_item_key(&item_key)?);
        let item_mgr = col_mgr.item_manager(item_key);
        let revision = EncryptedRevision::create(&item_mgr, meta, content, false)?;

        Ok(Self {
            uid: primitives::generate_uid(),
            version: 1,
            encryption_key,
            content: revision,
            etag: None,
            last_etag: None,
        })
    }

    /// Build a collection's sentinel item, which is always encrypted
    /// directly under the collection key.
    pub fn create_sentinel(col_mgr: &CollectionCryptoManager, meta: &[u8], content: &[u8]) -> Result<Self> {
        let item_mgr = col_mgr.item_manager_direct();
        let revision = EncryptedRevision::create(&item_mgr, meta, content, false)?;
        Ok(Self {
            uid: String::new(),
            version: 1,
            encryption_key: None,
            content: revision,
            etag: None,
            last_etag: None,
        })
    }

    pub fn item_manager(&self, col_mgr: &CollectionCryptoManager) -> Result<CollectionItemCryptoManager> {
        match &self.encryption_key {
            Some(sealed) => {
                let key: Key = col_mgr.decrypt_item_key(sealed)?;
                Ok(col_mgr.item_manager(key))
            }
            None => Ok(col_mgr.item_manager_direct()),
        }
    }

    pub fn set_meta(&mut self, col_mgr: &CollectionCryptoManager, meta: &[u8]) -> Result<()> {
        let item_mgr = self.item_manager(col_mgr)?;
        let content = self.content.decrypt_content(&item_mgr)?;
        self.content = EncryptedRevision::create_incremental(&item_mgr, meta, &content, false, &self.content)?;
        self.etag = Some(self.content.uid.clone());
        Ok(())
    }

    pub fn set_content(&mut self, col_mgr: &CollectionCryptoManager, content: &[u8]) -> Result<()> {
        let item_mgr = self.item_manager(col_mgr)?;
        let meta = self.content.decrypt_meta(&item_mgr)?;
        self.content = EncryptedRevision::create_incremental(&item_mgr, &meta, content, false, &self.content)?;
        self.etag = Some(self.content.uid.clone());
        Ok(())
    }

    pub fn delete(&mut self, col_mgr: &CollectionCryptoManager) -> Result<()> {
        let item_mgr = self.item_manager(col_mgr)?;
        let meta = self.content.decrypt_meta(&item_mgr)?;
        self.content = EncryptedRevision::create_incremental(&item_mgr, &meta, &[], true, &self.content)?;
        self.etag = Some(self.content.uid.clone());
        Ok(())
    }

    pub fn verify(&self, col_mgr: &CollectionCryptoManager) -> Result<()> {
        let item_mgr = self.item_manager(col_mgr)?;
        self.content.verify(&item_mgr)
    }

    /// True if there are local changes that have not been confirmed saved
    /// (via [`Self::mark_saved`]) since the last successful upload.
    pub fn is_unsaved(&self) -> bool {
        match &self.etag {
            None => true,
            Some(etag) => self.last_etag.as_deref() != Some(etag.as_str()),
        }
    }

    pub fn mark_saved(&mut self) {
        self.etag = Some(self.content.uid.clone());
        self.last_etag = self.etag.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::random_key;

    fn col_mgr() -> CollectionCryptoManager {
        CollectionCryptoManager::from_key(random_key())
    }

    #[test]
    fn create_then_edit_content_preserves_meta() {
        let col = col_mgr();
        let mut item = EncryptedCollectionItem::create(&col, b"meta-v1", b"content-v1").unwrap();
        item.verify(&col).unwrap();

        item.set_content(&col, b"content-v2").unwrap();
        item.verify(&col).unwrap();

        let mgr = item.item_manager(&col).unwrap();
        assert_eq!(item.content.decrypt_meta(&mgr).unwrap(), b"meta-v1");
        assert_eq!(item.content.decrypt_content(&mgr).unwrap(), b"content-v2");
    }

    #[test]
    fn sentinel_item_has_no_dedicated_key() {
        let col = col_mgr();
        let item = EncryptedCollectionItem::create_sentinel(&col, b"meta", b"content").unwrap();
        assert!(item.encryption_key.is_none());
        item.verify(&col).unwrap();
    }

    #[test]
    fn delete_then_verify() {
        let col = col_mgr();
        let mut item = EncryptedCollectionItem::create(&col, b"meta", b"content").unwrap();
        item.delete(&col).unwrap();
        assert!(item.content.deleted);
        item.verify(&col).unwrap();
    }

    #[test]
    fn unsaved_tracking() {
        let col = col_mgr();
        let mut item = EncryptedCollectionItem::create(&col, b"meta", b"content").unwrap();
        assert!(item.is_unsaved());
        item.mark_saved();
        assert!(!item.is_unsaved());
        item.set_content(&col, b"more").unwrap();
        assert!(item.is_unsaved());
    }
}

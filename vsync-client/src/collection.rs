//! [`CollectionManager`] creates/fetches/lists collections; [`Collection`]
//! wraps one collection's encrypted envelope with its unlocked crypto
//! manager for meta/content access.

use std::sync::Arc;

use tracing::instrument;
use vsync_crypto::managers::{AccountCryptoManager, CollectionCryptoManager};
use vsync_crypto::EncryptedCollection;

use crate::error::Result;
use crate::item::CollectionItemManager;
use crate::transport::{ItemUpload, Transport, UploadMode};

pub struct CollectionManager {
    transport: Arc<dyn Transport>,
    token: String,
    account_mgr: AccountCryptoManager,
}

impl CollectionManager {
    pub(crate) fn new(transport: Arc<dyn Transport>, token: String, account_mgr: AccountCryptoManager) -> Self {
        Self { transport, token, account_mgr }
    }

    #[instrument(skip(self, meta, content))]
    pub fn create(&self, collection_type: &[u8], meta: &[u8], content: &[u8]) -> Result<Collection> {
        let encrypted = EncryptedCollection::create(&self.account_mgr, collection_type, meta, content)?;
        let col_mgr = encrypted.crypto_manager(&self.account_mgr)?;
        Ok(Collection::new(encrypted, col_mgr))
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, uid: &str) -> Result<Collection> {
        let encrypted = self.transport.collection_fetch(&self.token, uid).await?;
        let col_mgr = encrypted.crypto_manager(&self.account_mgr)?;
        encrypted.verify(&col_mgr)?;
        Ok(Collection::new(encrypted, col_mgr))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, stoken: Option<&str>) -> Result<Vec<Collection>> {
        let page = self.transport.collection_list(&self.token, stoken).await?;
        page.data
            .into_iter()
            .map(|encrypted| {
                let col_mgr = encrypted.crypto_manager(&self.account_mgr)?;
                encrypted.verify(&col_mgr)?;
                Ok(Collection::new(encrypted, col_mgr))
            })
            .collect()
    }

    #[instrument(skip(self, collection))]
    pub async fn upload(&self, collection: &mut Collection, mode: UploadMode) -> Result<()> {
        if collection.encrypted.uid.is_empty() {
            let created = self.transport.collection_create(&self.token, &collection.encrypted).await?;
            let etag = created.item.content.uid.clone();
            collection.encrypted.mark_saved(created.uid, etag);
            collection.encrypted.stoken = created.stoken;
        } else {
            let upload = ItemUpload {
                item: collection.encrypted.item.clone(),
                expected_etag: collection.encrypted.item.last_etag.clone(),
            };
            self.transport.collection_upload(&self.token, &collection.encrypted.uid, upload, mode).await?;
            let etag = collection.encrypted.item.content.uid.clone();
            collection.encrypted.item.mark_saved();
            collection.encrypted.etag = Some(etag);
        }
        Ok(())
    }

    /// Atomically upload a collection alongside a batch of its item
    /// changes — the server accepts or rejects the whole set together.
    #[instrument(skip(self, collection, item_mgr))]
    pub async fn transaction(&self, collection: &mut Collection, item_mgr: &CollectionItemManager) -> Result<()> {
        self.upload(collection, UploadMode::Transaction).await?;
        item_mgr.flush(UploadMode::Transaction).await
    }

    pub fn item_manager(&self, collection: &Collection) -> CollectionItemManager {
        CollectionItemManager::new(
            self.transport.clone(),
            self.token.clone(),
            collection.encrypted.uid.clone(),
            collection.col_mgr.clone(),
        )
    }

    pub fn member_manager(&self, collection: &Collection) -> crate::member::CollectionMemberManager {
        crate::member::CollectionMemberManager::new(self.transport.clone(), self.token.clone(), collection.encrypted.uid.clone())
    }
}

pub struct Collection {
    encrypted: EncryptedCollection,
    col_mgr: CollectionCryptoManager,
}

impl Collection {
    fn new(encrypted: EncryptedCollection, col_mgr: CollectionCryptoManager) -> Self {
        Self { encrypted, col_mgr }
    }

    pub fn uid(&self) -> &str {
        &self.encrypted.uid
    }

    pub fn access_level(&self) -> vsync_crypto::AccessLevel {
        self.encrypted.access_level
    }

    pub fn collection_type(&self) -> Result<Vec<u8>> {
        Ok(self.encrypted.decrypt_collection_type(&self.col_mgr)?)
    }

    pub fn meta(&self) -> Result<Vec<u8>> {
        let item_mgr = self.encrypted.item.item_manager(&self.col_mgr)?;
        Ok(self.encrypted.item.content.decrypt_meta(&item_mgr)?)
    }

    pub fn content(&self) -> Result<Vec<u8>> {
        let item_mgr = self.encrypted.item.item_manager(&self.col_mgr)?;
        Ok(self.encrypted.item.content.decrypt_content(&item_mgr)?)
    }

    pub fn set_meta(&mut self, meta: &[u8]) -> Result<()> {
        self.encrypted.set_meta(&self.col_mgr, meta)?;
        Ok(())
    }

    pub fn set_content(&mut self, content: &[u8]) -> Result<()> {
        self.encrypted.set_content(&self.col_mgr, content)?;
        Ok(())
    }

    pub fn is_unsaved(&self) -> bool {
        self.encrypted.is_unsaved()
    }

    /// Generate and re-seal a fresh collection key, invalidating every
    /// outstanding invitation and member wrap of the old key. Not automatic
    /// — callers invoke this explicitly, e.g. after removing a member.
    pub fn rotate_key(&mut self, account_mgr: &vsync_crypto::managers::AccountCryptoManager) -> Result<()> {
        self.encrypted.rotate_key(account_mgr)?;
        self.col_mgr = self.encrypted.crypto_manager(account_mgr)?;
        Ok(())
    }

    pub fn stoken(&self) -> Option<&str> {
        self.encrypted.stoken.as_deref()
    }

    pub fn as_encrypted(&self) -> &EncryptedCollection {
        &self.encrypted
    }
}

//! [`CollectionItemManager`] creates/fetches/lists/syncs items within one
//! collection; [`Item`] tracks where a single item sits in the sync
//! lifecycle.

use std::sync::{Arc, Mutex};

use tracing::instrument;
use vsync_crypto::managers::CollectionCryptoManager;
use vsync_crypto::EncryptedCollectionItem;

use crate::error::Result;
use crate::transport::{ItemUpload, Page, Transport, UploadMode};

/// Where an item sits relative to the server, mirroring the sync engine's
/// item lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    /// Created locally, never uploaded.
    New,
    /// Matches the last-synced server state.
    Clean,
    /// Modified locally since the last successful upload.
    Dirty,
    /// Marked deleted locally, not yet confirmed by the server.
    Deleted,
    /// The server reports this item is deleted — the local copy may still
    /// hold its last-known content for undo/history purposes.
    Gone,
}

pub struct Item {
    pub(crate) encrypted: EncryptedCollectionItem,
    state: ItemState,
}

impl Item {
    fn new(encrypted: EncryptedCollectionItem, state: ItemState) -> Self {
        Self { encrypted, state }
    }

    pub fn uid(&self) -> &str {
        &self.encrypted.uid
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn is_deleted(&self) -> bool {
        self.encrypted.content.deleted
    }

    pub fn as_encrypted(&self) -> &EncryptedCollectionItem {
        &self.encrypted
    }

    pub fn as_encrypted_mut(&mut self) -> &mut EncryptedCollectionItem {
        &mut self.encrypted
    }
}

pub struct CollectionItemManager {
    transport: Arc<dyn Transport>,
    token: String,
    collection_uid: String,
    col_mgr: CollectionCryptoManager,
    pending: Mutex<Vec<ItemUpload>>,
}

impl CollectionItemManager {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        token: String,
        collection_uid: String,
        col_mgr: CollectionCryptoManager,
    ) -> Self {
        Self { transport, token, collection_uid, col_mgr, pending: Mutex::new(Vec::new()) }
    }

    pub fn create(&self, meta: &[u8], content: &[u8]) -> Result<Item> {
        let encrypted = EncryptedCollectionItem::create(&self.col_mgr, meta, content)?;
        Ok(Item::new(encrypted, ItemState::New))
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, uid: &str) -> Result<Item> {
        let encrypted = self.transport.item_fetch(&self.token, &self.collection_uid, uid).await?;
        encrypted.verify(&self.col_mgr)?;
        Ok(Item::new(encrypted, ItemState::Clean))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, stoken: Option<&str>) -> Result<(Vec<Item>, Option<String>)> {
        let page = self.transport.item_list(&self.token, &self.collection_uid, stoken).await?;
        self.items_from_page(page)
    }

    #[instrument(skip(self))]
    pub async fn fetch_updates(&self, stoken: Option<&str>) -> Result<(Vec<Item>, Option<String>)> {
        let page = self.transport.item_fetch_updates(&self.token, &self.collection_uid, stoken).await?;
        self.items_from_page(page)
    }

    fn items_from_page(&self, page: Page<EncryptedCollectionItem>) -> Result<(Vec<Item>, Option<String>)> {
        let mut items = Vec::with_capacity(page.data.len());
        for encrypted in page.data {
            if encrypted.content.deleted {
                items.push(Item::new(encrypted, ItemState::Gone));
            } else {
                encrypted.verify(&self.col_mgr)?;
                items.push(Item::new(encrypted, ItemState::Clean));
            }
        }
        Ok((items, page.stoken))
    }

    pub fn meta(&self, item: &Item) -> Result<Vec<u8>> {
        let mgr = item.encrypted.item_manager(&self.col_mgr)?;
        Ok(item.encrypted.content.decrypt_meta(&mgr)?)
    }

    pub fn content(&self, item: &Item) -> Result<Vec<u8>> {
        let mgr = item.encrypted.item_manager(&self.col_mgr)?;
        Ok(item.encrypted.content.decrypt_content(&mgr)?)
    }

    pub fn set_meta(&self, item: &mut Item, meta: &[u8]) -> Result<()> {
        item.encrypted.set_meta(&self.col_mgr, meta)?;
        item.state = ItemState::Dirty;
        Ok(())
    }

    pub fn set_content(&self, item: &mut Item, content: &[u8]) -> Result<()> {
        item.encrypted.set_content(&self.col_mgr, content)?;
        item.state = ItemState::Dirty;
        Ok(())
    }

    pub fn delete(&self, item: &mut Item) -> Result<()> {
        item.encrypted.delete(&self.col_mgr)?;
        item.state = ItemState::Deleted;
        Ok(())
    }

    /// Queue `item` for the next [`Self::flush`] — used by
    /// `CollectionManager::transaction` to bundle item changes with a
    /// collection upload in one atomic call.
    pub fn stage(&self, item: &Item) {
        let mut pending = self.pending.lock().unwrap();
        pending.push(ItemUpload { item: item.encrypted.clone(), expected_etag: item.encrypted.last_etag.clone() });
    }

    pub(crate) async fn flush(&self, mode: UploadMode) -> Result<()> {
        let pending = {
            let mut guard = self.pending.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        if pending.is_empty() {
            return Ok(());
        }
        self.transport.item_batch(&self.token, &self.collection_uid, pending, mode).await
    }

    #[instrument(skip(self, items))]
    pub async fn batch(&self, items: &mut [Item]) -> Result<()> {
        self.upload_many(items, UploadMode::Batch).await
    }

    #[instrument(skip(self, items))]
    pub async fn transaction(&self, items: &mut [Item]) -> Result<()> {
        self.upload_many(items, UploadMode::Transaction).await
    }

    async fn upload_many(&self, items: &mut [Item], mode: UploadMode) -> Result<()> {
        let uploads: Vec<ItemUpload> = items
            .iter()
            .map(|item| ItemUpload { item: item.encrypted.clone(), expected_etag: item.encrypted.last_etag.clone() })
            .collect();
        self.transport.item_batch(&self.token, &self.collection_uid, uploads, mode).await?;
        for item in items.iter_mut() {
            item.encrypted.mark_saved();
            item.state = if item.encrypted.content.deleted { ItemState::Gone } else { ItemState::Clean };
        }
        Ok(())
    }

    pub async fn upload_chunks(&self, item: &Item) -> Result<()> {
        for (uid, content) in item.encrypted.content.chunks_to_upload() {
            self.transport
                .chunk_upload(&self.token, &self.collection_uid, &item.encrypted.uid, uid, content)
                .await?;
        }
        Ok(())
    }

    pub async fn download_chunk(&self, item_uid: &str, chunk_uid: &str) -> Result<Vec<u8>> {
        self.transport.chunk_download(&self.token, &self.collection_uid, item_uid, chunk_uid).await
    }

    #[instrument(skip(self))]
    pub async fn revisions(&self, item_uid: &str, cursor: Option<&str>) -> Result<Vec<Item>> {
        let page = self.transport.item_revisions(&self.token, &self.collection_uid, item_uid, cursor).await?;
        page.data
            .into_iter()
            .map(|encrypted| {
                encrypted.verify(&self.col_mgr)?;
                Ok(Item::new(encrypted, ItemState::Clean))
            })
            .collect()
    }
}

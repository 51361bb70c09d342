//! [`EncryptedRevision`]: an item's content at a point in time, split into
//! content-defined chunks and bound together by a MAC-derived `uid`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::canon;
use crate::chunking;
use crate::error::{CryptoError, Result};
use crate::managers::CollectionItemCryptoManager;

/// One piece of an item's content. `content` is `None` once the sync layer
/// has confirmed the server already holds this ciphertext (by `uid`) and
/// elided it from a subsequent upload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub uid: String,
    pub content: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedRevision {
    pub uid: String,
    pub meta: Vec<u8>,
    pub chunks: Vec<Chunk>,
    pub deleted: bool,
}

impl EncryptedRevision {
    /// Seal `meta` and `content` as a brand new revision.
    pub fn create(
        item_mgr: &CollectionItemCryptoManager,
        meta: &[u8],
        content: &[u8],
        deleted: bool,
    ) -> Result<Self> {
        Self::build(item_mgr, meta, content, deleted, None)
    }

    /// Seal `meta` and `content` as a revision following `previous`, reusing
    /// the ciphertext of any chunk whose content is unchanged so the sync
    /// layer doesn't have to re-upload it.
    pub fn create_incremental(
        item_mgr: &CollectionItemCryptoManager,
        meta: &[u8],
        content: &[u8],
        deleted: bool,
        previous: &EncryptedRevision,
    ) -> Result<Self> {
        Self::build(item_mgr, meta, content, deleted, Some(previous))
    }

    fn build(
        item_mgr: &CollectionItemCryptoManager,
        meta: &[u8],
        content: &[u8],
        deleted: bool,
        previous: Option<&EncryptedRevision>,
    ) -> Result<Self> {
        let meta_sealed = item_mgr.encrypt_meta(meta)?;
        let prev_by_uid: HashMap<&str, &Chunk> = previous
            .map(|p| p.chunks.iter().map(|c| (c.uid.as_str(), c)).collect())
            .unwrap_or_default();

        let mut chunks = Vec::new();
        for piece in chunking::chunk_content(content) {
            let sealed = item_mgr.encrypt_chunk(piece)?;
            let uid = item_mgr.chunk_uid(&sealed);
            if prev_by_uid.contains_key(uid.as_str()) {
                chunks.push(Chunk { uid, content: None });
            } else {
                chunks.push(Chunk { uid, content: Some(sealed) });
            }
        }

        let chunk_uids: Vec<String> = chunks.iter().map(|c| c.uid.clone()).collect();
        let canonical = canon::canonical_revision(&meta_sealed, &chunk_uids, deleted);
        let uid = item_mgr.revision_uid(&canonical);

        Ok(Self { uid, meta: meta_sealed, chunks, deleted })
    }

    pub fn verify(&self, item_mgr: &CollectionItemCryptoManager) -> Result<()> {
        let chunk_uids: Vec<String> = self.chunks.iter().map(|c| c.uid.clone()).collect();
        let canonical = canon::canonical_revision(&self.meta, &chunk_uids, self.deleted);
        item_mgr.verify_revision_uid(&canonical, &self.uid)
    }

    pub fn decrypt_meta(&self, item_mgr: &CollectionItemCryptoManager) -> Result<Vec<u8>> {
        item_mgr.decrypt_meta(&self.meta)
    }

    /// Reassemble the full content. Every chunk must carry its ciphertext —
    /// the caller downloads any placeholder chunks by `uid` first.
    pub fn decrypt_content(&self, item_mgr: &CollectionItemCryptoManager) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for chunk in &self.chunks {
            let ciphertext = chunk.content.as_ref().ok_or(CryptoError::Encoding)?;
            if item_mgr.chunk_uid(ciphertext) != chunk.uid {
                return Err(CryptoError::Integrity);
            }
            out.extend_from_slice(&item_mgr.decrypt_chunk(ciphertext)?);
        }
        Ok(out)
    }

    /// `uid`s of chunks whose ciphertext is present and should be uploaded.
    pub fn chunks_to_upload(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.chunks
            .iter()
            .filter_map(|c| c.content.as_deref().map(|content| (c.uid.as_str(), content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::random_key;

    fn item_mgr() -> CollectionItemCryptoManager {
        crate::managers::CollectionCryptoManager::from_key(random_key()).item_manager_direct()
    }

    #[test]
    fn create_then_verify_roundtrip() {
        let mgr = item_mgr();
        let rev = EncryptedRevision::create(&mgr, b"meta", b"hello world", false).unwrap();
        rev.verify(&mgr).unwrap();
        assert_eq!(rev.decrypt_meta(&mgr).unwrap(), b"meta");
        assert_eq!(rev.decrypt_content(&mgr).unwrap(), b"hello world");
    }

    #[test]
    fn tampered_chunk_fails_verification() {
        let mgr = item_mgr();
        let mut rev = EncryptedRevision::create(&mgr, b"meta", b"hello world", false).unwrap();
        rev.chunks[0].uid.push('x');
        assert!(rev.verify(&mgr).is_err());
    }

    #[test]
    fn incremental_reuses_unchanged_chunks() {
        let mgr = item_mgr();
        let content = vec![9u8; 5 * chunking::MAX_CHUNK_SIZE];
        let first = EncryptedRevision::create(&mgr, b"meta", &content, false).unwrap();

        let mut appended = content.clone();
        appended.extend_from_slice(b"tail");
        let second = EncryptedRevision::create_incremental(&mgr, b"meta", &appended, false, &first).unwrap();

        let reused = second.chunks.iter().filter(|c| c.content.is_none()).count();
        assert!(reused > 0, "expected at least one reused chunk");
        second.verify(&mgr).unwrap();
    }

    #[test]
    fn delete_marks_revision_deleted() {
        let mgr = item_mgr();
        let first = EncryptedRevision::create(&mgr, b"meta", b"content", false).unwrap();
        let deleted = EncryptedRevision::create_incremental(&mgr, b"meta", b"", true, &first).unwrap();
        assert!(deleted.deleted);
        deleted.verify(&mgr).unwrap();
    }
}

//! The `Transport` trait: every network-shaped operation the sync engine
//! needs, kept as a trait so the rest of the crate never touches HTTP
//! directly. Production code wires this to a real server; tests use
//! [`InMemoryTransport`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vsync_crypto::{AccessLevel, EncryptedCollection, EncryptedCollectionItem, IdentityPublicKey, SignedInvitation};

use crate::error::{Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginChallenge {
    pub challenge: Vec<u8>,
    pub salt: Vec<u8>,
    pub version: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub salt: Vec<u8>,
    pub login_pubkey: Vec<u8>,
    /// `MainCryptoManager`-sealed `accountKey || identityPrivateKey` bundle.
    pub main_content: Vec<u8>,
    pub identity_pubkey: IdentityPublicKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub salt: Vec<u8>,
    pub main_content: Vec<u8>,
    pub identity_pubkey: IdentityPublicKey,
}

/// A page of list-style results, carrying the cursor to resume from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub done: bool,
    pub stoken: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadMode {
    /// Gated per-item by each item's known `etag` — partial success allowed
    /// across the items in the batch.
    Batch,
    /// Additionally gated by the collection's `stoken` — all-or-nothing.
    Transaction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemUpload {
    pub item: EncryptedCollectionItem,
    /// `etag` the client believes is current server-side for this item, or
    /// `None` for a brand new item.
    pub expected_etag: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberInfo {
    pub username: String,
    pub access_level: AccessLevel,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn signup(&self, req: SignupRequest) -> Result<String>;
    async fn login_challenge(&self, username: &str) -> Result<LoginChallenge>;
    async fn login(&self, username: &str, challenge_response: &[u8]) -> Result<LoginResponse>;
    async fn fetch_token(&self, username: &str) -> Result<String>;
    async fn logout(&self, token: &str) -> Result<()>;
    async fn change_password(&self, token: &str, salt: &[u8], new_main_content: &[u8]) -> Result<()>;

    async fn collection_create(&self, token: &str, collection: &EncryptedCollection) -> Result<EncryptedCollection>;
    async fn collection_fetch(&self, token: &str, uid: &str) -> Result<EncryptedCollection>;
    async fn collection_list(&self, token: &str, stoken: Option<&str>) -> Result<Page<EncryptedCollection>>;
    async fn collection_upload(
        &self,
        token: &str,
        uid: &str,
        upload: ItemUpload,
        mode: UploadMode,
    ) -> Result<()>;

    async fn item_create(&self, token: &str, collection_uid: &str, item: &EncryptedCollectionItem) -> Result<()>;
    async fn item_fetch(&self, token: &str, collection_uid: &str, item_uid: &str) -> Result<EncryptedCollectionItem>;
    async fn item_list(&self, token: &str, collection_uid: &str, stoken: Option<&str>) -> Result<Page<EncryptedCollectionItem>>;
    async fn item_batch(
        &self,
        token: &str,
        collection_uid: &str,
        uploads: Vec<ItemUpload>,
        mode: UploadMode,
    ) -> Result<()>;
    async fn item_fetch_updates(
        &self,
        token: &str,
        collection_uid: &str,
        stoken: Option<&str>,
    ) -> Result<Page<EncryptedCollectionItem>>;
    async fn chunk_upload(&self, token: &str, collection_uid: &str, item_uid: &str, chunk_uid: &str, content: &[u8]) -> Result<()>;
    async fn chunk_download(&self, token: &str, collection_uid: &str, item_uid: &str, chunk_uid: &str) -> Result<Vec<u8>>;
    async fn item_revisions(
        &self,
        token: &str,
        collection_uid: &str,
        item_uid: &str,
        cursor: Option<&str>,
    ) -> Result<Page<EncryptedCollectionItem>>;

    async fn invitations_list_incoming(&self, token: &str) -> Result<Vec<SignedInvitation>>;
    async fn invitations_list_outgoing(&self, token: &str) -> Result<Vec<SignedInvitation>>;
    async fn invitation_invite(&self, token: &str, invitation: &SignedInvitation) -> Result<()>;
    async fn invitation_accept(&self, token: &str, invitation_uid: &str) -> Result<()>;
    async fn invitation_reject(&self, token: &str, invitation_uid: &str) -> Result<()>;

    async fn member_list(&self, token: &str, collection_uid: &str) -> Result<Vec<MemberInfo>>;
    async fn member_remove(&self, token: &str, collection_uid: &str, username: &str) -> Result<()>;
    async fn member_modify_access_level(&self, token: &str, collection_uid: &str, username: &str, access_level: AccessLevel) -> Result<()>;
    async fn member_leave(&self, token: &str, collection_uid: &str) -> Result<()>;
}

/// Deterministic in-memory double for tests. Simulates etag/stoken
/// bookkeeping and conflict rejection the way a real server would, without
/// any actual networking.
#[derive(Default)]
pub struct InMemoryTransport {
    state: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    next_stoken: u64,
    collections: HashMap<String, StoredCollection>,
    invitations: HashMap<String, SignedInvitation>,
    chunks: HashMap<(String, String), Vec<u8>>,
}

struct StoredCollection {
    collection: EncryptedCollection,
    items: HashMap<String, StoredItem>,
    stoken: String,
}

struct StoredItem {
    item: EncryptedCollectionItem,
    revisions: Vec<EncryptedCollectionItem>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_stoken(state: &mut InMemoryState) -> String {
        state.next_stoken += 1;
        format!("stoken-{}", state.next_stoken)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn signup(&self, _req: SignupRequest) -> Result<String> {
        Ok("token-0".to_string())
    }

    async fn login_challenge(&self, _username: &str) -> Result<LoginChallenge> {
        Ok(LoginChallenge { challenge: vec![0u8; 32], salt: vec![0u8; 32], version: 1 })
    }

    async fn login(&self, _username: &str, _challenge_response: &[u8]) -> Result<LoginResponse> {
        Err(Error::NotFound("no accounts registered in memory transport".into()))
    }

    async fn fetch_token(&self, _username: &str) -> Result<String> {
        Ok("token-0".to_string())
    }

    async fn logout(&self, _token: &str) -> Result<()> {
        Ok(())
    }

    async fn change_password(&self, _token: &str, _salt: &[u8], _new_main_content: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn collection_create(&self, _token: &str, collection: &EncryptedCollection) -> Result<EncryptedCollection> {
        let mut state = self.state.lock().unwrap();
        let uid = vsync_crypto::primitives::generate_uid();
        let stoken = Self::next_stoken(&mut state);
        let mut stored = collection.clone();
        stored.uid = uid.clone();
        stored.stoken = Some(stoken.clone());
        state.collections.insert(
            uid,
            StoredCollection { collection: stored.clone(), items: HashMap::new(), stoken },
        );
        Ok(stored)
    }

    async fn collection_fetch(&self, _token: &str, uid: &str) -> Result<EncryptedCollection> {
        let state = self.state.lock().unwrap();
        state
            .collections
            .get(uid)
            .map(|c| c.collection.clone())
            .ok_or_else(|| Error::NotFound(format!("collection {uid}")))
    }

    async fn collection_list(&self, _token: &str, _stoken: Option<&str>) -> Result<Page<EncryptedCollection>> {
        let state = self.state.lock().unwrap();
        let data = state.collections.values().map(|c| c.collection.clone()).collect();
        Ok(Page { data, done: true, stoken: None })
    }

    async fn collection_upload(&self, _token: &str, uid: &str, upload: ItemUpload, _mode: UploadMode) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let stoken = Self::next_stoken(&mut state);
        let stored = state
            .collections
            .get_mut(uid)
            .ok_or_else(|| Error::NotFound(format!("collection {uid}")))?;

        let current_etag = stored.collection.item.etag.clone();
        if upload.expected_etag != current_etag {
            return Err(Error::Conflict(format!(
                "collection {uid} etag mismatch: expected {:?}, have {:?}",
                upload.expected_etag, current_etag
            )));
        }

        stored.collection.item = upload.item;
        stored.stoken = stoken.clone();
        stored.collection.stoken = Some(stoken);
        Ok(())
    }

    async fn item_create(&self, _token: &str, collection_uid: &str, item: &EncryptedCollectionItem) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let stoken = Self::next_stoken(&mut state);
        let stored = state
            .collections
            .get_mut(collection_uid)
            .ok_or_else(|| Error::NotFound(format!("collection {collection_uid}")))?;
        if stored.items.contains_key(&item.uid) {
            return Err(Error::Conflict(format!("item {} already exists", item.uid)));
        }
        stored.items.insert(
            item.uid.clone(),
            StoredItem { item: item.clone(), revisions: vec![item.clone()] },
        );
        stored.stoken = stoken;
        Ok(())
    }

    async fn item_fetch(&self, _token: &str, collection_uid: &str, item_uid: &str) -> Result<EncryptedCollectionItem> {
        let state = self.state.lock().unwrap();
        let stored = state
            .collections
            .get(collection_uid)
            .ok_or_else(|| Error::NotFound(format!("collection {collection_uid}")))?;
        stored
            .items
            .get(item_uid)
            .map(|i| i.item.clone())
            .ok_or_else(|| Error::NotFound(format!("item {item_uid}")))
    }

    async fn item_list(&self, _token: &str, collection_uid: &str, _stoken: Option<&str>) -> Result<Page<EncryptedCollectionItem>> {
        let state = self.state.lock().unwrap();
        let stored = state
            .collections
            .get(collection_uid)
            .ok_or_else(|| Error::NotFound(format!("collection {collection_uid}")))?;
        let data = stored.items.values().map(|i| i.item.clone()).collect();
        Ok(Page { data, done: true, stoken: Some(stored.stoken.clone()) })
    }

    async fn item_batch(&self, _token: &str, collection_uid: &str, uploads: Vec<ItemUpload>, mode: UploadMode) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if mode == UploadMode::Transaction {
            let stored = state
                .collections
                .get(collection_uid)
                .ok_or_else(|| Error::NotFound(format!("collection {collection_uid}")))?;
            for upload in &uploads {
                let current = stored.items.get(&upload.item.uid).map(|i| i.item.etag.clone()).unwrap_or_default();
                if upload.expected_etag != current {
                    return Err(Error::Conflict(format!(
                        "item {} etag mismatch: expected {:?}, have {:?}",
                        upload.item.uid, upload.expected_etag, current
                    )));
                }
            }
        }

        let stoken = Self::next_stoken(&mut state);
        let stored = state
            .collections
            .get_mut(collection_uid)
            .ok_or_else(|| Error::NotFound(format!("collection {collection_uid}")))?;

        for upload in uploads {
            let current = stored.items.get(&upload.item.uid).map(|i| i.item.etag.clone()).unwrap_or_default();
            if mode == UploadMode::Batch && upload.expected_etag != current {
                return Err(Error::Conflict(format!(
                    "item {} etag mismatch: expected {:?}, have {:?}",
                    upload.item.uid, upload.expected_etag, current
                )));
            }
            stored
                .items
                .entry(upload.item.uid.clone())
                .and_modify(|stored_item| {
                    stored_item.item = upload.item.clone();
                    stored_item.revisions.push(upload.item.clone());
                })
                .or_insert_with(|| StoredItem { item: upload.item.clone(), revisions: vec![upload.item] });
        }
        stored.stoken = stoken;
        Ok(())
    }

    async fn item_fetch_updates(&self, token: &str, collection_uid: &str, stoken: Option<&str>) -> Result<Page<EncryptedCollectionItem>> {
        self.item_list(token, collection_uid, stoken).await
    }

    async fn chunk_upload(&self, _token: &str, collection_uid: &str, item_uid: &str, chunk_uid: &str, content: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .chunks
            .insert((format!("{collection_uid}/{item_uid}"), chunk_uid.to_string()), content.to_vec());
        Ok(())
    }

    async fn chunk_download(&self, _token: &str, collection_uid: &str, item_uid: &str, chunk_uid: &str) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .chunks
            .get(&(format!("{collection_uid}/{item_uid}"), chunk_uid.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("chunk {chunk_uid}")))
    }

    async fn item_revisions(&self, _token: &str, collection_uid: &str, item_uid: &str, _cursor: Option<&str>) -> Result<Page<EncryptedCollectionItem>> {
        let state = self.state.lock().unwrap();
        let stored = state
            .collections
            .get(collection_uid)
            .ok_or_else(|| Error::NotFound(format!("collection {collection_uid}")))?;
        let data = stored
            .items
            .get(item_uid)
            .map(|i| i.revisions.clone())
            .ok_or_else(|| Error::NotFound(format!("item {item_uid}")))?;
        Ok(Page { data, done: true, stoken: None })
    }

    async fn invitations_list_incoming(&self, _token: &str) -> Result<Vec<SignedInvitation>> {
        let state = self.state.lock().unwrap();
        Ok(state.invitations.values().cloned().collect())
    }

    async fn invitations_list_outgoing(&self, _token: &str) -> Result<Vec<SignedInvitation>> {
        let state = self.state.lock().unwrap();
        Ok(state.invitations.values().cloned().collect())
    }

    async fn invitation_invite(&self, _token: &str, invitation: &SignedInvitation) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.invitations.insert(invitation.uid.clone(), invitation.clone());
        Ok(())
    }

    async fn invitation_accept(&self, _token: &str, invitation_uid: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .invitations
            .remove(invitation_uid)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("invitation {invitation_uid}")))
    }

    async fn invitation_reject(&self, _token: &str, invitation_uid: &str) -> Result<()> {
        self.invitation_accept(_token, invitation_uid).await
    }

    async fn member_list(&self, _token: &str, _collection_uid: &str) -> Result<Vec<MemberInfo>> {
        Ok(Vec::new())
    }

    async fn member_remove(&self, _token: &str, _collection_uid: &str, _username: &str) -> Result<()> {
        Ok(())
    }

    async fn member_modify_access_level(&self, _token: &str, _collection_uid: &str, _username: &str, _access_level: AccessLevel) -> Result<()> {
        Ok(())
    }

    async fn member_leave(&self, _token: &str, _collection_uid: &str) -> Result<()> {
        Ok(())
    }
}

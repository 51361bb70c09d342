use std::sync::Arc;

use vsync_client::transport::{InMemoryTransport, Transport, UploadMode};
use vsync_client::{Account, Error, ItemState};

async fn signed_up_account() -> Account {
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    Account::signup(transport, "alice", "correct horse battery staple").await.unwrap()
}

#[tokio::test]
async fn create_collection_then_fetch_roundtrip() {
    let account = signed_up_account().await;
    let collections = account.collection_manager();

    let mut collection = collections.create(b"addressbook", b"{}", b"contacts").unwrap();
    assert!(collection.is_unsaved());

    collections.upload(&mut collection, UploadMode::Batch).await.unwrap();
    assert!(!collection.is_unsaved());
    assert!(!collection.uid().is_empty());

    let fetched = collections.fetch(collection.uid()).await.unwrap();
    assert_eq!(fetched.meta().unwrap(), b"{}");
    assert_eq!(fetched.content().unwrap(), b"contacts");
}

#[tokio::test]
async fn item_batch_upload_then_list() {
    let account = signed_up_account().await;
    let collections = account.collection_manager();

    let mut collection = collections.create(b"notes", b"{}", b"").unwrap();
    collections.upload(&mut collection, UploadMode::Batch).await.unwrap();

    let items_mgr = collections.item_manager(&collection);
    let mut a = items_mgr.create(b"note-a", b"hello").unwrap();
    let mut b = items_mgr.create(b"note-b", b"world").unwrap();

    items_mgr.batch(std::slice::from_mut(&mut a)).await.unwrap();
    items_mgr.batch(std::slice::from_mut(&mut b)).await.unwrap();

    assert_eq!(a.state(), ItemState::Clean);
    assert_eq!(b.state(), ItemState::Clean);

    let (listed, _stoken) = items_mgr.list(None).await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn conflicting_upload_is_rejected() {
    let account = signed_up_account().await;
    let collections = account.collection_manager();

    let mut collection = collections.create(b"notes", b"{}", b"").unwrap();
    collections.upload(&mut collection, UploadMode::Batch).await.unwrap();

    let items_mgr = collections.item_manager(&collection);
    let mut item = items_mgr.create(b"note", b"v1").unwrap();
    items_mgr.batch(std::slice::from_mut(&mut item)).await.unwrap();

    // A second local handle on the same item uid, still believing the
    // server has no prior revision — its upload must be rejected as a
    // conflict rather than silently overwriting.
    let mut stale_copy = items_mgr.create(b"note", b"v1").unwrap();
    stale_copy.as_encrypted_mut().uid = item.uid().to_string();

    let err = items_mgr.batch(std::slice::from_mut(&mut stale_copy)).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn deleted_item_is_reported_as_gone_on_fetch_updates() {
    let account = signed_up_account().await;
    let collections = account.collection_manager();

    let mut collection = collections.create(b"notes", b"{}", b"").unwrap();
    collections.upload(&mut collection, UploadMode::Batch).await.unwrap();

    let items_mgr = collections.item_manager(&collection);
    let mut item = items_mgr.create(b"note", b"v1").unwrap();
    items_mgr.batch(std::slice::from_mut(&mut item)).await.unwrap();

    items_mgr.delete(&mut item).unwrap();
    items_mgr.batch(std::slice::from_mut(&mut item)).await.unwrap();
    assert_eq!(item.state(), ItemState::Gone);

    let (updates, _) = items_mgr.fetch_updates(None).await.unwrap();
    assert!(updates.iter().any(|i| i.uid() == item.uid() && i.is_deleted()));
}

#[tokio::test]
async fn chunk_upload_then_download_roundtrip() {
    let account = signed_up_account().await;
    let collections = account.collection_manager();

    let mut collection = collections.create(b"files", b"{}", b"").unwrap();
    collections.upload(&mut collection, UploadMode::Batch).await.unwrap();

    let items_mgr = collections.item_manager(&collection);
    let content = vec![7u8; 2 * vsync_crypto::chunking::MAX_CHUNK_SIZE];
    let mut item = items_mgr.create(b"file.bin", &content).unwrap();
    items_mgr.batch(std::slice::from_mut(&mut item)).await.unwrap();
    items_mgr.upload_chunks(&item).await.unwrap();

    let chunk_uid = item.as_encrypted().content.chunks[0].uid.clone();
    let downloaded = items_mgr.download_chunk(item.uid(), &chunk_uid).await.unwrap();
    assert!(!downloaded.is_empty());
}

#[tokio::test]
async fn session_save_and_load_resumes_with_same_keys() {
    let account = signed_up_account().await;
    let saved = account.save().unwrap();

    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let resumed = Account::load(transport, &saved).unwrap();

    assert_eq!(account.username(), resumed.username());
    assert_eq!(account.identity_pubkey().verifying_key, resumed.identity_pubkey().verifying_key);
}

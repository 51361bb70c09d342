//! Sync engine for an end-to-end encrypted, hierarchical data store:
//! `Account` → `Collection`s → `Item`s. Cryptography lives in
//! `vsync-crypto`; this crate adds the network-facing sync state machine
//! on top of it, behind the [`transport::Transport`] trait.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vsync_client::{Account, transport::Transport};
//!
//! # async fn run(transport: Arc<dyn Transport>) -> vsync_client::Result<()> {
//! let account = Account::signup(transport, "alice", "correct horse battery staple").await?;
//! let collections = account.collection_manager();
//! let collection = collections.create(b"addressbook", b"{}", b"")?;
//! # let _ = collection;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod collection;
pub mod error;
pub mod invitation;
pub mod item;
pub mod member;
pub mod transport;

pub use account::Account;
pub use collection::{Collection, CollectionManager};
pub use error::{Error, Result};
pub use invitation::CollectionInvitationManager;
pub use item::{CollectionItemManager, Item, ItemState};
pub use member::CollectionMemberManager;

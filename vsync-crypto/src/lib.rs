//! Cryptographic core of the sync engine: key derivation, the layered
//! key-manager hierarchy, and the encrypted envelope models that ride over
//! the wire. Nothing in this crate talks to a network or a filesystem — see
//! `vsync-client` for the sync engine built on top of it.
//!
//! ```
//! use vsync_crypto::managers::{MainCryptoManager, AccountCryptoManager};
//! use vsync_crypto::primitives::{derive_key, random_salt};
//!
//! let salt = random_salt();
//! let main_key = derive_key(&salt, "correct horse battery staple").unwrap();
//! let main = MainCryptoManager::new(main_key, MainCryptoManager::SUPPORTED_VERSION).unwrap();
//! let _login = main.login_manager();
//! ```

pub mod canon;
pub mod chunking;
pub mod collection;
pub mod error;
pub mod identity;
pub mod invitation;
pub mod item;
pub mod managers;
pub mod primitives;
pub mod revision;

pub use collection::{AccessLevel, EncryptedCollection};
pub use error::{CryptoError, Result};
pub use identity::IdentityPublicKey;
pub use invitation::SignedInvitation;
pub use item::EncryptedCollectionItem;
pub use primitives::Key;
pub use revision::{Chunk, EncryptedRevision};

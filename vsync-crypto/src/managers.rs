//! Layered key-manager hierarchy: Main → Login, Account, Identity, Collection,
//! CollectionItem. Each manager wraps a 32-byte key plus an 8-byte context
//! tag used only to *derive* the next key in the chain — actual encrypt/sign
//! operations are scoped by a separate associated-data domain string so
//! ciphertexts from one use can never be replayed into another.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret as XSecretKey};

use crate::error::{CryptoError, Result};
use crate::primitives::{self, Key, SignedBox};

pub const CTX_LOGIN: &[u8; 8] = b"Login\0\0\0";
pub const CTX_IDENTITY_SIGN: &[u8; 8] = b"IdSign\0\0";
pub const CTX_IDENTITY_BOX: &[u8; 8] = b"IdBox\0\0\0";

fn key_from_slice(bytes: &[u8]) -> Result<Key> {
    if bytes.len() != primitives::KEY_BYTES {
        return Err(CryptoError::Encoding);
    }
    let mut out = [0u8; primitives::KEY_BYTES];
    out.copy_from_slice(bytes);
    Ok(zeroize::Zeroizing::new(out))
}

/// Base capability shared by every layer: AEAD under a named domain, plus
/// subkey derivation for deriving the next layer down.
#[derive(Clone)]
struct CryptoManager {
    key: Key,
}

impl CryptoManager {
    fn from_key(key: Key) -> Self {
        Self { key }
    }

    fn encrypt(&self, domain: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        primitives::aead_encrypt(&self.key, plaintext, domain.as_bytes())
    }

    fn decrypt(&self, domain: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        primitives::aead_decrypt(&self.key, sealed, domain.as_bytes())
    }

    /// Like [`Self::encrypt`], but the nonce is derived from `(nonce_domain,
    /// plaintext)` instead of drawn at random, so re-encrypting the same
    /// plaintext under the same key always yields the same ciphertext. Used
    /// for content-addressed values whose ciphertext MAC must be stable
    /// across re-encryption (chunk uids).
    fn encrypt_deterministic(&self, domain: &str, nonce_domain: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_tag = self.mac(nonce_domain, plaintext);
        let mut nonce_bytes = [0u8; primitives::NONCE_BYTES];
        nonce_bytes.copy_from_slice(&nonce_tag[..primitives::NONCE_BYTES]);
        primitives::aead_encrypt_with_nonce(&self.key, &nonce_bytes, plaintext, domain.as_bytes())
    }

    fn mac(&self, domain: &str, data: &[u8]) -> [u8; 32] {
        let mut buf = Vec::with_capacity(domain.len() + 1 + data.len());
        buf.extend_from_slice(domain.as_bytes());
        buf.push(0);
        buf.extend_from_slice(data);
        primitives::mac(&self.key, &buf)
    }

    fn mac_verify(&self, domain: &str, data: &[u8], tag: &[u8; 32]) -> Result<()> {
        let computed = self.mac(domain, data);
        use subtle::ConstantTimeEq;
        if computed.ct_eq(tag).into() {
            Ok(())
        } else {
            Err(CryptoError::Integrity)
        }
    }

    fn derive_subkey(&self, context: &[u8; 8]) -> Key {
        primitives::derive_subkey(&self.key, context)
    }
}

// ---------------------------------------------------------------------------
// MainCryptoManager
// ---------------------------------------------------------------------------

/// Root of the key hierarchy: one per account, seeded from the user's
/// password via [`primitives::derive_key`].
pub struct MainCryptoManager {
    inner: CryptoManager,
    version: u8,
}

impl MainCryptoManager {
    pub const SUPPORTED_VERSION: u8 = 1;

    pub fn new(main_key: Key, version: u8) -> Result<Self> {
        if version != Self::SUPPORTED_VERSION {
            return Err(CryptoError::UnknownVersion(version));
        }
        Ok(Self {
            inner: CryptoManager::from_key(main_key),
            version,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Seal the account's `accountKey ∥ identityPrivateKey` bundle.
    pub fn encrypt_content(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner.encrypt("Main", plaintext)
    }

    pub fn decrypt_content(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        self.inner.decrypt("Main", sealed)
    }

    pub fn login_manager(&self) -> LoginCryptoManager {
        LoginCryptoManager::from_seed(self.inner.derive_subkey(CTX_LOGIN))
    }
}

// ---------------------------------------------------------------------------
// LoginCryptoManager
// ---------------------------------------------------------------------------

/// Signs the login/fetch-token challenge. Its Ed25519 keypair is fully
/// determined by the main key, so it requires no separate storage.
pub struct LoginCryptoManager {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl LoginCryptoManager {
    fn from_seed(seed: Key) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self { signing_key, verifying_key }
    }

    pub fn sign_challenge(&self, msg: &[u8]) -> Signature {
        primitives::sign(&self.signing_key, msg)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }
}

// ---------------------------------------------------------------------------
// AccountCryptoManager
// ---------------------------------------------------------------------------

/// Wraps the account's symmetric `accountKey`. Used to seal/open collection
/// keys for collections the account owns or has been invited into.
pub struct AccountCryptoManager {
    inner: CryptoManager,
}

impl AccountCryptoManager {
    pub fn from_account_key(account_key: Key) -> Self {
        Self { inner: CryptoManager::from_key(account_key) }
    }

    pub fn encrypt_collection_key(&self, collection_key: &Key) -> Result<Vec<u8>> {
        self.inner.encrypt("Col", collection_key.as_ref())
    }

    pub fn decrypt_collection_key(&self, sealed: &[u8]) -> Result<Key> {
        key_from_slice(&self.inner.decrypt("Col", sealed)?)
    }
}

// ---------------------------------------------------------------------------
// IdentityCryptoManager
// ---------------------------------------------------------------------------

/// Long-lived asymmetric identity: an Ed25519 signing keypair and an X25519
/// box keypair, both derived from the account's `identityPrivateKey`.
pub struct IdentityCryptoManager {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    box_secret: XSecretKey,
    box_public: XPublicKey,
}

impl IdentityCryptoManager {
    pub fn from_private_key(identity_private_key: &Key) -> Self {
        let sign_seed = primitives::derive_subkey(identity_private_key, CTX_IDENTITY_SIGN);
        let box_seed = primitives::derive_subkey(identity_private_key, CTX_IDENTITY_BOX);

        let signing_key = SigningKey::from_bytes(&sign_seed);
        let verifying_key = signing_key.verifying_key();
        let box_secret = XSecretKey::from(*box_seed);
        let box_public = XPublicKey::from(&box_secret);

        Self { signing_key, verifying_key, box_secret, box_public }
    }

    /// Generate a fresh random `identityPrivateKey` and its manager.
    pub fn generate() -> (Key, Self) {
        let identity_private_key = primitives::random_key();
        let mgr = Self::from_private_key(&identity_private_key);
        (identity_private_key, mgr)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn box_public(&self) -> &XPublicKey {
        &self.box_public
    }

    /// Seal `plaintext` for `recipient_box_pub`, signed by this identity.
    pub fn seal_signed(&self, recipient_box_pub: &XPublicKey, plaintext: &[u8], ad: &[u8]) -> Result<SignedBox> {
        primitives::box_seal_signed(&self.signing_key, &self.box_secret, recipient_box_pub, plaintext, ad)
    }

    /// Open a box addressed to this identity, verifying it was signed by
    /// `sender_verify_key` and sent from `sender_box_pub`.
    pub fn open_verified(
        &self,
        sender_verify_key: &VerifyingKey,
        sender_box_pub: &XPublicKey,
        sealed: &SignedBox,
        ad: &[u8],
    ) -> Result<Vec<u8>> {
        primitives::box_open_verify(sender_verify_key, &self.box_secret, sender_box_pub, sealed, ad)
    }
}

// ---------------------------------------------------------------------------
// CollectionCryptoManager
// ---------------------------------------------------------------------------

/// Wraps a collection's symmetric key.
#[derive(Clone)]
pub struct CollectionCryptoManager {
    inner: CryptoManager,
}

impl CollectionCryptoManager {
    pub fn from_key(collection_key: Key) -> Self {
        Self { inner: CryptoManager::from_key(collection_key) }
    }

    pub fn encrypt_item_key(&self, item_key: &Key) -> Result<Vec<u8>> {
        self.inner.encrypt("ColItemKey", item_key.as_ref())
    }

    pub fn decrypt_item_key(&self, sealed: &[u8]) -> Result<Key> {
        key_from_slice(&self.inner.decrypt("ColItemKey", sealed)?)
    }

    /// Item manager for an item that has its own per-item key.
    pub fn item_manager(&self, item_key: Key) -> CollectionItemCryptoManager {
        CollectionItemCryptoManager::from_key(item_key)
    }

    /// Item manager for an item with no dedicated key: the collection key
    /// is used directly, as `EncryptedCollectionItem.encryptionKey` is
    /// optional.
    pub fn item_manager_direct(&self) -> CollectionItemCryptoManager {
        CollectionItemCryptoManager::from_key(self.inner.key.clone())
    }

    pub fn encrypt(&self, domain: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner.encrypt(domain, plaintext)
    }

    pub fn decrypt(&self, domain: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        self.inner.decrypt(domain, sealed)
    }
}

// ---------------------------------------------------------------------------
// CollectionItemCryptoManager
// ---------------------------------------------------------------------------

/// Wraps the item key (or the collection key, for keyless items). Seals
/// meta and chunks, and computes the MAC-based `uid`s used as etags.
pub struct CollectionItemCryptoManager {
    inner: CryptoManager,
}

impl CollectionItemCryptoManager {
    fn from_key(key: Key) -> Self {
        Self { inner: CryptoManager::from_key(key) }
    }

    pub fn encrypt_meta(&self, meta: &[u8]) -> Result<Vec<u8>> {
        self.inner.encrypt("ColItemMeta", meta)
    }

    pub fn decrypt_meta(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        self.inner.decrypt("ColItemMeta", sealed)
    }

    /// Sealed deterministically: the same chunk bytes under the same item
    /// key always produce the same ciphertext, so [`Self::chunk_uid`] (a MAC
    /// over the ciphertext) is stable across repeated edits that happen to
    /// reproduce an earlier chunk — required for incremental-revision chunk
    /// reuse and for chunking to be reproducible per Testable Property 4.
    pub fn encrypt_chunk(&self, chunk: &[u8]) -> Result<Vec<u8>> {
        self.inner.encrypt_deterministic("ColItemChunk", "ColItemChunkNonce", chunk)
    }

    pub fn decrypt_chunk(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        self.inner.decrypt("ColItemChunk", sealed)
    }

    /// `chunkUid = base64(MAC(ciphertext))`.
    pub fn chunk_uid(&self, ciphertext: &[u8]) -> String {
        let tag = self.inner.mac("ColItemChunkUid", ciphertext);
        URL_SAFE_NO_PAD.encode(tag)
    }

    /// `uid = MAC(meta ∥ ordered chunkUids ∥ deleted)` — see
    /// [`crate::canon::canonical_revision`] for the exact byte layout.
    pub fn revision_uid(&self, canonical: &[u8]) -> String {
        let tag = self.inner.mac("ColItemRevisionUid", canonical);
        URL_SAFE_NO_PAD.encode(tag)
    }

    pub fn verify_revision_uid(&self, canonical: &[u8], expected_uid: &str) -> Result<()> {
        let expected = URL_SAFE_NO_PAD
            .decode(expected_uid)
            .map_err(|_| CryptoError::Encoding)?;
        let expected: [u8; 32] = expected.try_into().map_err(|_| CryptoError::Encoding)?;
        self.inner.mac_verify("ColItemRevisionUid", canonical, &expected)
    }
}

//! Primitive cryptographic operations (locked for scheme version 1).
//!
//! Layout of a sealed AEAD value on the wire: `nonce[12] || ciphertext || tag[16]`.
//! `chacha20poly1305`'s `encrypt` already appends the tag to the ciphertext, so
//! callers only need to prepend the nonce.

use argon2::{Algorithm, Argon2, Params, Version};
use blake2::digest::consts::U32;
use blake2::digest::{FixedOutput, KeyInit, Mac, Update};
use blake2::Blake2bMac;
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit as AeadKeyInit, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{OsRng, RngCore};
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret as XSecretKey};
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

type Blake2bMac256 = Blake2bMac<U32>;

/// 32-byte symmetric key, zeroed on drop.
pub type Key = Zeroizing<[u8; 32]>;

pub const NONCE_BYTES: usize = 12;
pub const KEY_BYTES: usize = 32;
pub const TAG_BYTES: usize = 16;

/// Argon2id parameters for scheme version 1, pinned to libsodium's
/// "moderate" preset so server-side re-derivation (if ever needed) agrees
/// bit-for-bit with the client. Changing these requires bumping `version`.
pub fn argon2id_v1() -> Argon2<'static> {
    // 256 MiB memory, 3 passes, 1 lane — libsodium crypto_pwhash "moderate".
    let params = Params::new(256 * 1024, 3, 1, Some(KEY_BYTES))
        .expect("static argon2 params are valid");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Derive the 32-byte main key from a password and salt.
pub fn derive_key(salt: &[u8], password: &str) -> Result<Key> {
    let mut out = Zeroizing::new([0u8; KEY_BYTES]);
    argon2id_v1()
        .hash_password_into(password.as_bytes(), salt, out.as_mut())
        .map_err(|_| CryptoError::Encoding)?;
    Ok(out)
}

/// Encrypt `plaintext` under `key`, authenticating `ad`, with a fresh random
/// nonce. Returns `nonce || ciphertext || tag`.
pub fn aead_encrypt(key: &Key, plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce_bytes);
    aead_encrypt_with_nonce(key, &nonce_bytes, plaintext, ad)
}

/// Encrypt `plaintext` under `key` with a caller-supplied nonce, authenticating
/// `ad`. Returns `nonce || ciphertext || tag`. Used where the ciphertext must
/// be a deterministic function of the plaintext (content-addressed chunks) —
/// the caller is responsible for never reusing a nonce under the same key for
/// two *different* plaintexts.
pub fn aead_encrypt_with_nonce(key: &Key, nonce_bytes: &[u8; NONCE_BYTES], plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_ref()).map_err(|_| CryptoError::Encoding)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    let ct = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: ad })
        .map_err(|_| CryptoError::Encoding)?;

    let mut out = Vec::with_capacity(NONCE_BYTES + ct.len());
    out.extend_from_slice(nonce_bytes);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Decrypt a value produced by [`aead_encrypt`]. Fails with
/// [`CryptoError::Integrity`] on tag mismatch or malformed input — this is
/// the single failure mode for any tampering, wrong key, or wrong `ad`.
pub fn aead_decrypt(key: &Key, sealed: &[u8], ad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_BYTES + TAG_BYTES {
        return Err(CryptoError::Integrity);
    }
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_ref()).map_err(|_| CryptoError::Integrity)?;
    let (nonce_bytes, ct) = sealed.split_at(NONCE_BYTES);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, Payload { msg: ct, aad: ad })
        .map_err(|_| CryptoError::Integrity)
}

/// Keyed BLAKE2b MAC producing a 32-byte tag.
pub fn mac(key: &Key, data: &[u8]) -> [u8; KEY_BYTES] {
    let mut m = Blake2bMac256::new_from_slice(key.as_ref()).expect("32-byte key is valid");
    Mac::update(&mut m, data);
    m.finalize_fixed().into()
}

/// Verify a MAC in constant time.
pub fn mac_verify(key: &Key, data: &[u8], tag: &[u8; KEY_BYTES]) -> Result<()> {
    use subtle::ConstantTimeEq;
    let computed = mac(key, data);
    if computed.ct_eq(tag).into() {
        Ok(())
    } else {
        Err(CryptoError::Integrity)
    }
}

/// Derive a child subkey from a parent key and an 8-byte context tag.
///
/// This is the library's only KDF: keyed BLAKE2b of the parent key with the
/// context as the message. There is no separate HKDF step.
pub fn derive_subkey(parent: &Key, context: &[u8; 8]) -> Key {
    Zeroizing::new(mac(parent, context))
}

/// Generate a fresh random 32-byte symmetric key.
pub fn random_key() -> Key {
    let mut out = Zeroizing::new([0u8; KEY_BYTES]);
    OsRng.fill_bytes(out.as_mut());
    out
}

/// Generate a fresh random 32-byte salt.
pub fn random_salt() -> [u8; KEY_BYTES] {
    let mut out = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut out);
    out
}

/// Generate a client-side opaque identifier (item uid, invitation uid, ...).
/// Not a secret, just needs to be unguessable and collision-free.
pub fn generate_uid() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    let mut buf = [0u8; 24];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

// ---------------------------------------------------------------------------
// Ed25519 signing
// ---------------------------------------------------------------------------

pub fn generate_signing_keypair() -> (SigningKey, VerifyingKey) {
    let sk = SigningKey::generate(&mut OsRng);
    let pk = sk.verifying_key();
    (sk, pk)
}

pub fn sign(signing_key: &SigningKey, msg: &[u8]) -> Signature {
    signing_key.sign(msg)
}

pub fn verify_signature(verifying_key: &VerifyingKey, msg: &[u8], sig: &Signature) -> Result<()> {
    verifying_key
        .verify(msg, sig)
        .map_err(|_| CryptoError::Integrity)
}

// ---------------------------------------------------------------------------
// X25519 box
// ---------------------------------------------------------------------------

pub fn generate_box_keypair() -> (XSecretKey, XPublicKey) {
    let sk = XSecretKey::random_from_rng(OsRng);
    let pk = XPublicKey::from(&sk);
    (sk, pk)
}

/// A sender-signed, recipient-sealed box: `seal(shared_secret, plaintext)`
/// plus a detached Ed25519 signature over `ciphertext || ad` under the
/// sender's identity signing key.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SignedBox {
    /// `nonce || ciphertext || tag`.
    pub ciphertext: Vec<u8>,
    /// Detached Ed25519 signature, 64 bytes.
    pub signature: [u8; 64],
}

const BOX_SUBKEY_CONTEXT: &[u8; 8] = b"BoxSeal\0";

fn box_shared_key(dh: x25519_dalek::SharedSecret) -> Key {
    let seed = Zeroizing::new(*dh.as_bytes());
    derive_subkey(&seed, BOX_SUBKEY_CONTEXT)
}

/// Seal `plaintext` from `sender_box_secret` to `recipient_box_pub`, and sign
/// the resulting ciphertext with `sender_sign_key`.
pub fn box_seal_signed(
    sender_sign_key: &SigningKey,
    sender_box_secret: &XSecretKey,
    recipient_box_pub: &XPublicKey,
    plaintext: &[u8],
    ad: &[u8],
) -> Result<SignedBox> {
    let dh = sender_box_secret.diffie_hellman(recipient_box_pub);
    let key = box_shared_key(dh);
    let ciphertext = aead_encrypt(&key, plaintext, ad)?;

    let mut signed_msg = Vec::with_capacity(ciphertext.len() + ad.len());
    signed_msg.extend_from_slice(&ciphertext);
    signed_msg.extend_from_slice(ad);
    let signature = sign(sender_sign_key, &signed_msg).to_bytes();

    Ok(SignedBox { ciphertext, signature })
}

/// Open a [`SignedBox`] using the recipient's box secret key, verifying the
/// signature against the sender's identity verifying key.
pub fn box_open_verify(
    sender_verify_key: &VerifyingKey,
    recipient_box_secret: &XSecretKey,
    sender_box_pub: &XPublicKey,
    sealed: &SignedBox,
    ad: &[u8],
) -> Result<Vec<u8>> {
    let mut signed_msg = Vec::with_capacity(sealed.ciphertext.len() + ad.len());
    signed_msg.extend_from_slice(&sealed.ciphertext);
    signed_msg.extend_from_slice(ad);
    let sig = Signature::from_bytes(&sealed.signature);
    verify_signature(sender_verify_key, &signed_msg, &sig)?;

    let dh = recipient_box_secret.diffie_hellman(sender_box_pub);
    let key = box_shared_key(dh);
    aead_decrypt(&key, &sealed.ciphertext, ad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aead_roundtrip() {
        let key = random_key();
        let ct = aead_encrypt(&key, b"hello world", b"ad").unwrap();
        let pt = aead_decrypt(&key, &ct, b"ad").unwrap();
        assert_eq!(pt, b"hello world");
    }

    #[test]
    fn aead_wrong_ad_fails() {
        let key = random_key();
        let ct = aead_encrypt(&key, b"hello world", b"ad").unwrap();
        assert!(aead_decrypt(&key, &ct, b"different").is_err());
    }

    #[test]
    fn aead_tampered_ciphertext_fails() {
        let key = random_key();
        let mut ct = aead_encrypt(&key, b"hello world", b"ad").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(aead_decrypt(&key, &ct, b"ad").is_err());
    }

    #[test]
    fn derive_key_deterministic() {
        let salt = random_salt();
        let a = derive_key(&salt, "hunter2").unwrap();
        let b = derive_key(&salt, "hunter2").unwrap();
        assert_eq!(a.as_ref(), b.as_ref());
        assert_eq!(a.len(), KEY_BYTES);
    }

    #[test]
    fn signed_box_roundtrip() {
        let (sender_sign, sender_verify) = generate_signing_keypair();
        let (sender_box_sk, _sender_box_pk) = generate_box_keypair();
        let (recipient_box_sk, recipient_box_pk) = generate_box_keypair();

        let sealed = box_seal_signed(&sender_sign, &sender_box_sk, &recipient_box_pk, b"secret", b"ctx").unwrap();
        let sender_box_pk = XPublicKey::from(&sender_box_sk);
        let opened = box_open_verify(&sender_verify, &recipient_box_sk, &sender_box_pk, &sealed, b"ctx").unwrap();
        assert_eq!(opened, b"secret");
    }

    #[test]
    fn signed_box_rejects_wrong_signer() {
        let (_sender_sign, _sender_verify) = generate_signing_keypair();
        let (_other_sign, other_verify) = generate_signing_keypair();
        let (sender_box_sk, _sender_box_pk) = generate_box_keypair();
        let (recipient_box_sk, recipient_box_pk) = generate_box_keypair();

        let sealed = box_seal_signed(&_sender_sign, &sender_box_sk, &recipient_box_pk, b"secret", b"ctx").unwrap();
        let sender_box_pk = XPublicKey::from(&sender_box_sk);
        assert!(box_open_verify(&other_verify, &recipient_box_sk, &sender_box_pk, &sealed, b"ctx").is_err());
    }

    #[test]
    fn generate_uid_is_not_degenerate() {
        let a = generate_uid();
        let b = generate_uid();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn aead_encrypt_with_nonce_is_deterministic() {
        let key = random_key();
        let nonce = [7u8; NONCE_BYTES];
        let a = aead_encrypt_with_nonce(&key, &nonce, b"chunk bytes", b"ad").unwrap();
        let b = aead_encrypt_with_nonce(&key, &nonce, b"chunk bytes", b"ad").unwrap();
        assert_eq!(a, b);
        assert_eq!(aead_decrypt(&key, &a, b"ad").unwrap(), b"chunk bytes");
    }

    #[test]
    fn mac_is_deterministic_and_verifies() {
        let key = random_key();
        let tag = mac(&key, b"payload");
        assert!(mac_verify(&key, b"payload", &tag).is_ok());
        assert!(mac_verify(&key, b"other", &tag).is_err());
    }
}

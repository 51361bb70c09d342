//! [`Account`]: the entry point. Holds the session token and the key
//! material derived from the user's password, and hands out
//! [`crate::collection::CollectionManager`] for everything else.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;
use vsync_crypto::managers::{AccountCryptoManager, IdentityCryptoManager, MainCryptoManager};
use vsync_crypto::primitives::{self, Key};
use vsync_crypto::IdentityPublicKey;
use zeroize::Zeroizing;

use crate::collection::CollectionManager;
use crate::error::{Error, Result};
use crate::invitation::CollectionInvitationManager;
use crate::transport::{SignupRequest, Transport};

/// Everything needed to resume a session without asking for the password
/// again. Sensitive — the caller is responsible for storing this
/// encrypted at rest (see [`Account::save`]/[`Account::load`]).
#[derive(Serialize, Deserialize)]
struct SavedSession {
    username: String,
    token: String,
    salt: Vec<u8>,
    version: u8,
    account_key: [u8; 32],
    identity_private_key: [u8; 32],
}

pub struct Account {
    transport: Arc<dyn Transport>,
    username: String,
    token: String,
    salt: Vec<u8>,
    version: u8,
    account_key: Key,
    identity_private_key: Key,
}

impl Account {
    #[instrument(skip(transport, password))]
    pub async fn signup(transport: Arc<dyn Transport>, username: &str, password: &str) -> Result<Self> {
        let salt = primitives::random_salt();
        let main_key = primitives::derive_key(&salt, password)?;
        let main_mgr = MainCryptoManager::new(main_key, MainCryptoManager::SUPPORTED_VERSION)?;
        let login_mgr = main_mgr.login_manager();

        let account_key = primitives::random_key();
        let (identity_private_key, identity_mgr) = IdentityCryptoManager::generate();

        let main_content = main_mgr.encrypt_content(&bundle(&account_key, &identity_private_key))?;

        let req = SignupRequest {
            username: username.to_string(),
            salt: salt.to_vec(),
            login_pubkey: login_mgr.verifying_key().to_bytes().to_vec(),
            main_content,
            identity_pubkey: IdentityPublicKey::of(&identity_mgr),
        };
        let token = transport.signup(req).await?;

        Ok(Self {
            transport,
            username: username.to_string(),
            token,
            salt: salt.to_vec(),
            version: MainCryptoManager::SUPPORTED_VERSION,
            account_key,
            identity_private_key,
        })
    }

    #[instrument(skip(transport, password))]
    pub async fn login(transport: Arc<dyn Transport>, username: &str, password: &str) -> Result<Self> {
        let challenge = transport.login_challenge(username).await?;
        let main_key = primitives::derive_key(&challenge.salt, password)?;
        let main_mgr = MainCryptoManager::new(main_key, challenge.version)?;
        let login_mgr = main_mgr.login_manager();
        let response = login_mgr.sign_challenge(&challenge.challenge).to_bytes().to_vec();

        let login_response = transport.login(username, &response).await?;
        let decoded = main_mgr.decrypt_content(&login_response.main_content)?;
        let (account_key, identity_private_key) = unbundle(&decoded)?;

        Ok(Self {
            transport,
            username: username.to_string(),
            token: login_response.token,
            salt: challenge.salt,
            version: challenge.version,
            account_key,
            identity_private_key,
        })
    }

    pub async fn fetch_token(&mut self) -> Result<()> {
        self.token = self.transport.fetch_token(&self.username).await?;
        Ok(())
    }

    pub async fn logout(self) -> Result<()> {
        self.transport.logout(&self.token).await
    }

    #[instrument(skip(self, new_password))]
    pub async fn change_password(&mut self, new_password: &str) -> Result<()> {
        let salt = primitives::random_salt();
        let main_key = primitives::derive_key(&salt, new_password)?;
        let new_main_mgr = MainCryptoManager::new(main_key, MainCryptoManager::SUPPORTED_VERSION)?;
        let main_content = new_main_mgr.encrypt_content(&bundle(&self.account_key, &self.identity_private_key))?;

        self.transport.change_password(&self.token, &salt, &main_content).await?;
        self.salt = salt.to_vec();
        self.version = MainCryptoManager::SUPPORTED_VERSION;
        Ok(())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn account_mgr(&self) -> AccountCryptoManager {
        AccountCryptoManager::from_account_key(self.account_key.clone())
    }

    pub fn identity_mgr(&self) -> IdentityCryptoManager {
        IdentityCryptoManager::from_private_key(&self.identity_private_key)
    }

    pub fn identity_pubkey(&self) -> IdentityPublicKey {
        IdentityPublicKey::of(&self.identity_mgr())
    }

    pub fn collection_manager(&self) -> CollectionManager {
        CollectionManager::new(self.transport.clone(), self.token.clone(), self.account_mgr())
    }

    pub fn invitation_manager(&self) -> CollectionInvitationManager {
        CollectionInvitationManager::new(
            self.transport.clone(),
            self.token.clone(),
            self.username.clone(),
            self.account_mgr(),
            self.identity_mgr(),
        )
    }

    /// Serialize everything needed to resume this session. The result is
    /// as sensitive as the password itself — callers must encrypt it at
    /// rest before writing it to disk.
    pub fn save(&self) -> Result<Vec<u8>> {
        let saved = SavedSession {
            username: self.username.clone(),
            token: self.token.clone(),
            salt: self.salt.clone(),
            version: self.version,
            account_key: *self.account_key.as_ref(),
            identity_private_key: *self.identity_private_key.as_ref(),
        };
        serde_json::to_vec(&saved).map_err(|e| Error::programming(format!("failed to serialize session: {e}")))
    }

    pub fn load(transport: Arc<dyn Transport>, data: &[u8]) -> Result<Self> {
        let saved: SavedSession =
            serde_json::from_slice(data).map_err(|e| Error::programming(format!("failed to parse session: {e}")))?;
        Ok(Self {
            transport,
            username: saved.username,
            token: saved.token,
            salt: saved.salt,
            version: saved.version,
            account_key: Zeroizing::new(saved.account_key),
            identity_private_key: Zeroizing::new(saved.identity_private_key),
        })
    }
}

fn bundle(account_key: &Key, identity_private_key: &Key) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(account_key.as_ref());
    out.extend_from_slice(identity_private_key.as_ref());
    out
}

fn unbundle(decoded: &[u8]) -> Result<(Key, Key)> {
    if decoded.len() != 64 {
        return Err(Error::programming("decrypted account bundle has unexpected length"));
    }
    Ok((key_from_slice(&decoded[..32]), key_from_slice(&decoded[32..])))
}

fn key_from_slice(bytes: &[u8]) -> Key {
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Zeroizing::new(out)
}

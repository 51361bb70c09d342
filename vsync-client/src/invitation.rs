//! [`CollectionInvitationManager`]: share a collection with another account
//! by sealing its key for their identity, and accept/reject invitations
//! addressed to this account.

use std::sync::Arc;

use tracing::instrument;
use vsync_crypto::managers::{AccountCryptoManager, IdentityCryptoManager};
use vsync_crypto::{AccessLevel, IdentityPublicKey, Key, SignedInvitation};

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::transport::Transport;

pub struct CollectionInvitationManager {
    transport: Arc<dyn Transport>,
    token: String,
    username: String,
    account_mgr: AccountCryptoManager,
    identity_mgr: IdentityCryptoManager,
}

impl CollectionInvitationManager {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        token: String,
        username: String,
        account_mgr: AccountCryptoManager,
        identity_mgr: IdentityCryptoManager,
    ) -> Self {
        Self { transport, token, username, account_mgr, identity_mgr }
    }

    pub async fn list_incoming(&self) -> Result<Vec<SignedInvitation>> {
        self.transport.invitations_list_incoming(&self.token).await
    }

    pub async fn list_outgoing(&self) -> Result<Vec<SignedInvitation>> {
        self.transport.invitations_list_outgoing(&self.token).await
    }

    #[instrument(skip(self, collection, to_identity))]
    pub async fn invite(
        &self,
        collection: &Collection,
        to_username: &str,
        to_identity: &IdentityPublicKey,
        access_level: AccessLevel,
    ) -> Result<()> {
        let invitation = SignedInvitation::create(
            collection.as_encrypted(),
            &self.account_mgr,
            &self.identity_mgr,
            &self.username,
            to_username,
            to_identity,
            access_level,
        )?;
        self.transport.invitation_invite(&self.token, &invitation).await
    }

    /// Verify `invitation` is addressed to this account, recover the
    /// collection key, and tell the server to finalize membership. Returns
    /// the plaintext collection key, which the caller re-seals under its
    /// own account key to actually gain access to the collection content —
    /// see [`crate::collection::CollectionManager::fetch`].
    #[instrument(skip(self, invitation))]
    pub async fn accept(&self, invitation: &SignedInvitation) -> Result<Key> {
        let ours = IdentityPublicKey::of(&self.identity_mgr);
        if invitation.to_pubkey != ours {
            return Err(Error::programming("invitation is addressed to a different identity"));
        }
        let collection_key = invitation.recover_collection_key(&self.identity_mgr)?;
        self.transport.invitation_accept(&self.token, &invitation.uid).await?;
        Ok(collection_key)
    }

    pub async fn reject(&self, invitation: &SignedInvitation) -> Result<()> {
        self.transport.invitation_reject(&self.token, &invitation.uid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use vsync_crypto::primitives::random_key;

    #[tokio::test]
    async fn accept_rejects_foreign_identity() {
        let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
        let account_mgr = AccountCryptoManager::from_account_key(random_key());
        let (_priv, identity_mgr) = IdentityCryptoManager::generate();
        let mgr = CollectionInvitationManager::new(
            transport,
            "token".into(),
            "alice".into(),
            account_mgr,
            identity_mgr,
        );

        let (_other_priv, other_identity) = IdentityCryptoManager::generate();
        let acct2 = AccountCryptoManager::from_account_key(random_key());
        let mut collection =
            vsync_crypto::EncryptedCollection::create(&acct2, b"type", b"meta", b"content").unwrap();
        collection.uid = "col-1".into();
        let invitation = SignedInvitation::create(
            &collection,
            &acct2,
            &other_identity,
            "bob",
            "carol",
            &IdentityPublicKey::of(&other_identity),
            AccessLevel::ReadOnly,
        )
        .unwrap();

        let err = mgr.accept(&invitation).await.unwrap_err();
        assert!(matches!(err, Error::Programming(_)));
    }
}

//! [`CollectionMemberManager`]: list and manage the accounts a collection is
//! shared with.

use std::sync::Arc;

use vsync_crypto::AccessLevel;

use crate::error::Result;
use crate::transport::{MemberInfo, Transport};

pub struct CollectionMemberManager {
    transport: Arc<dyn Transport>,
    token: String,
    collection_uid: String,
}

impl CollectionMemberManager {
    pub(crate) fn new(transport: Arc<dyn Transport>, token: String, collection_uid: String) -> Self {
        Self { transport, token, collection_uid }
    }

    pub async fn list(&self) -> Result<Vec<MemberInfo>> {
        self.transport.member_list(&self.token, &self.collection_uid).await
    }

    pub async fn remove(&self, username: &str) -> Result<()> {
        self.transport.member_remove(&self.token, &self.collection_uid, username).await
    }

    pub async fn modify_access_level(&self, username: &str, access_level: AccessLevel) -> Result<()> {
        self.transport
            .member_modify_access_level(&self.token, &self.collection_uid, username, access_level)
            .await
    }

    /// Leave a collection this account was invited into. Has no effect on
    /// a collection this account owns.
    pub async fn leave(&self) -> Result<()> {
        self.transport.member_leave(&self.token, &self.collection_uid).await
    }
}

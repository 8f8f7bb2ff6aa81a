use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PrincipalStore, StoreError};
use crate::models::Principal;

/// In-process principal store backed by a `HashMap`.
///
/// State does not survive a restart. Used for development and tests, and as
/// the seed target for the bootstrap admin account.
#[derive(Debug, Default)]
pub struct MemoryPrincipalStore {
    principals: RwLock<HashMap<Uuid, Principal>>,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        Ok(self.principals.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .principals
            .read()
            .await
            .values()
            .find(|principal| principal.username == username)
            .cloned())
    }

    async fn insert(&self, principal: Principal) -> Result<(), StoreError> {
        let mut principals = self.principals.write().await;

        if principals
            .values()
            .any(|existing| existing.username == principal.username)
        {
            return Err(StoreError::DuplicateUsername);
        }

        principals.insert(principal.id, principal);
        Ok(())
    }

    async fn deactivate(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(principal) = self.principals.write().await.get_mut(&id) {
            principal.active = false;
        }
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), StoreError> {
        match self.principals.write().await.get_mut(&id) {
            Some(principal) => {
                principal.password_hash = password_hash;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

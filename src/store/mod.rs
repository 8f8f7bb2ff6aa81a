//! Principal storage.
//!
//! The authentication gate and the account handlers talk to storage through
//! the [`PrincipalStore`] trait, so the backing implementation can be swapped
//! without touching the pipeline. The bundled [`MemoryPrincipalStore`] keeps
//! accounts in process memory; a document-database implementation satisfies
//! the same contract in deployments that need durable accounts.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Principal;

pub use memory::MemoryPrincipalStore;

/// Shared handle to whichever store implementation the process runs with.
pub type SharedPrincipalStore = Arc<dyn PrincipalStore>;

/// Storage failures as seen by the authentication pipeline.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert would violate username uniqueness.
    #[error("username already exists")]
    DuplicateUsername,

    /// The targeted principal does not exist.
    #[error("principal not found")]
    NotFound,

    /// The backend cannot be reached or failed mid-operation.
    #[error("principal store unavailable: {0}")]
    Unavailable(String),
}

/// Account lookup and mutation operations used by the pipeline.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Look up a principal by id. `Ok(None)` means the id is unknown.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError>;

    /// Look up a principal by username. `Ok(None)` means the name is unknown.
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError>;

    /// Insert a new principal. Fails with [`StoreError::DuplicateUsername`]
    /// when the username is taken.
    async fn insert(&self, principal: Principal) -> Result<(), StoreError>;

    /// Clear the active flag.
    ///
    /// Matching zero records is not an error: the write is idempotent, and
    /// concurrent requests from the same expired guest may race to issue it.
    async fn deactivate(&self, id: Uuid) -> Result<(), StoreError>;

    /// Replace the stored password hash.
    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), StoreError>;
}

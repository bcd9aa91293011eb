//! Data access seam.
//!
//! The REST front door never talks to storage directly; everything goes
//! through a shared [`DataAccess`] handle constructed at startup and injected
//! into the pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

pub mod error;
pub mod memory;
pub mod models;

pub use error::DataAccessError;
pub use memory::MemoryDataAccess;
pub use models::{Group, Role, RolePermission, Token, User};

pub type DalResult<T> = Result<T, DataAccessError>;

/// Shared, process-wide data access handle.
pub type SharedDataAccess = Arc<dyn DataAccess>;

/// Lifecycle of a data access layer as published through [`DataAccess::updates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DalState {
    Uninitialized,
    Initialized,
    Error(String),
}

/// Operations the REST service requires from persistent storage.
///
/// Implementations must be safe for concurrent use; the service holds one
/// instance for the whole process. Dropping a returned future abandons the
/// call.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Watch channel announcing initialization progress.
    fn updates(&self) -> watch::Receiver<DalState>;

    // Users
    async fn user_authenticate(&self, username: &str, password: &str) -> DalResult<bool>;
    async fn user_create(&self, user: User) -> DalResult<()>;
    async fn user_delete(&self, username: &str) -> DalResult<()>;
    async fn user_exists(&self, username: &str) -> DalResult<bool>;
    async fn user_get(&self, username: &str) -> DalResult<User>;
    async fn user_list(&self) -> DalResult<Vec<User>>;
    async fn user_update(&self, user: User) -> DalResult<()>;

    // Groups
    async fn group_add_user(&self, group: &str, username: &str) -> DalResult<()>;
    async fn group_create(&self, group: Group) -> DalResult<()>;
    async fn group_delete(&self, group: &str) -> DalResult<()>;
    async fn group_get(&self, group: &str) -> DalResult<Group>;
    async fn group_grant_role(&self, group: &str, role: &str) -> DalResult<()>;
    async fn group_list(&self) -> DalResult<Vec<Group>>;
    async fn group_remove_user(&self, group: &str, username: &str) -> DalResult<()>;
    async fn group_revoke_role(&self, group: &str, role: &str) -> DalResult<()>;

    // Roles
    async fn role_create(&self, role: &str) -> DalResult<()>;
    async fn role_delete(&self, role: &str) -> DalResult<()>;
    async fn role_exists(&self, role: &str) -> DalResult<bool>;
    async fn role_get(&self, role: &str) -> DalResult<Role>;
    async fn role_grant_permission(&self, role: &str, bundle: &str, permission: &str) -> DalResult<()>;
    async fn role_list(&self) -> DalResult<Vec<Role>>;
    async fn role_revoke_permission(&self, role: &str, bundle: &str, permission: &str) -> DalResult<()>;

    // Tokens
    async fn token_evaluate(&self, token: &str) -> bool;
    async fn token_generate(&self, username: &str, ttl: Duration) -> DalResult<Token>;
    async fn token_retrieve_by_token(&self, token: &str) -> DalResult<Token>;
}

/// Blocks until the data access layer reports [`DalState::Initialized`].
///
/// This is the barrier the server crosses before it starts accepting
/// traffic.
pub async fn await_initialized(dal: &dyn DataAccess, timeout: Duration) -> DalResult<()> {
    let mut updates = dal.updates();

    let wait = async {
        let state = updates
            .wait_for(|state| !matches!(state, DalState::Uninitialized))
            .await
            .map_err(|_| DataAccessError::NotInitialized)?;

        match &*state {
            DalState::Initialized => Ok(()),
            DalState::Error(msg) => Err(DataAccessError::CantInitialize(msg.clone())),
            DalState::Uninitialized => Err(DataAccessError::NotInitialized),
        }
    };

    let result = tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| DataAccessError::CantInitialize("timed out waiting for data access layer".to_string()))?;

    if result.is_ok() {
        info!("Data access layer initialized");
    }

    result
}

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use super::models::{Group, Role, RolePermission, Token, User};
use super::{DalResult, DalState, DataAccess, DataAccessError};
use crate::auth;

const ADMIN_USER: &str = "admin";
const TOKEN_LEN: usize = 40;

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct StoredGroup {
    users: BTreeSet<String>,
    roles: BTreeSet<String>,
}

#[derive(Default)]
struct Store {
    users: BTreeMap<String, StoredUser>,
    groups: BTreeMap<String, StoredGroup>,
    roles: BTreeMap<String, BTreeSet<RolePermission>>,
    tokens: HashMap<String, Token>,
    tokens_by_user: HashMap<String, String>,
}

impl Store {
    fn group_view(&self, name: &str, group: &StoredGroup) -> Group {
        let users = group
            .users
            .iter()
            .filter_map(|username| self.users.get(username))
            .map(|stored| stored.user.clone())
            .collect();

        Group {
            name: name.to_string(),
            users,
        }
    }

    fn revoke_user_token(&mut self, username: &str) {
        if let Some(token) = self.tokens_by_user.remove(username) {
            self.tokens.remove(&token);
        }
    }
}

/// In-process data access layer.
///
/// Suitable for development deployments and tests; state lives for the
/// lifetime of the process.
pub struct MemoryDataAccess {
    store: RwLock<Store>,
    state: watch::Sender<DalState>,
}

impl MemoryDataAccess {
    /// Creates a store that is ready for use.
    pub fn new() -> Self {
        let dal = Self::uninitialized();
        dal.mark_initialized();
        dal
    }

    /// Creates a store that has not yet announced readiness.
    pub fn uninitialized() -> Self {
        let (state, _) = watch::channel(DalState::Uninitialized);
        Self {
            store: RwLock::new(Store::default()),
            state,
        }
    }

    pub fn mark_initialized(&self) {
        self.state.send_replace(DalState::Initialized);
    }
}

impl Default for MemoryDataAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataAccess for MemoryDataAccess {
    fn updates(&self) -> watch::Receiver<DalState> {
        self.state.subscribe()
    }

    async fn user_authenticate(&self, username: &str, password: &str) -> DalResult<bool> {
        let store = self.store.read().await;
        let stored = store.users.get(username).ok_or(DataAccessError::NoSuchUser)?;
        Ok(auth::verify_password(password, &stored.password_hash))
    }

    async fn user_create(&self, user: User) -> DalResult<()> {
        if user.username.is_empty() {
            return Err(DataAccessError::EmptyUserName);
        }
        if user.password.is_empty() {
            return Err(DataAccessError::FieldRequired("password"));
        }

        let mut store = self.store.write().await;
        if store.users.contains_key(&user.username) {
            return Err(DataAccessError::UserExists);
        }

        let password_hash = auth::hash_password(&user.password);
        debug!("Creating user {}", user.username);
        store.users.insert(
            user.username.clone(),
            StoredUser {
                user: user.without_password(),
                password_hash,
            },
        );
        Ok(())
    }

    async fn user_delete(&self, username: &str) -> DalResult<()> {
        if username.is_empty() {
            return Err(DataAccessError::EmptyUserName);
        }
        if username == ADMIN_USER {
            return Err(DataAccessError::AdminUndeletable);
        }

        let mut store = self.store.write().await;
        if store.users.remove(username).is_none() {
            return Err(DataAccessError::NoSuchUser);
        }
        for group in store.groups.values_mut() {
            group.users.remove(username);
        }
        store.revoke_user_token(username);
        Ok(())
    }

    async fn user_exists(&self, username: &str) -> DalResult<bool> {
        Ok(self.store.read().await.users.contains_key(username))
    }

    async fn user_get(&self, username: &str) -> DalResult<User> {
        if username.is_empty() {
            return Err(DataAccessError::EmptyUserName);
        }
        let store = self.store.read().await;
        store
            .users
            .get(username)
            .map(|stored| stored.user.clone())
            .ok_or(DataAccessError::NoSuchUser)
    }

    async fn user_list(&self) -> DalResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(store.users.values().map(|stored| stored.user.clone()).collect())
    }

    async fn user_update(&self, user: User) -> DalResult<()> {
        if user.username.is_empty() {
            return Err(DataAccessError::EmptyUserName);
        }

        let mut store = self.store.write().await;
        let stored = store
            .users
            .get_mut(&user.username)
            .ok_or(DataAccessError::NoSuchUser)?;

        if !user.email.is_empty() {
            stored.user.email = user.email;
        }
        if !user.full_name.is_empty() {
            stored.user.full_name = user.full_name;
        }
        if !user.password.is_empty() {
            stored.password_hash = auth::hash_password(&user.password);
        }
        Ok(())
    }

    async fn group_add_user(&self, group: &str, username: &str) -> DalResult<()> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(username) {
            return Err(DataAccessError::NoSuchUser);
        }
        let stored = store.groups.get_mut(group).ok_or(DataAccessError::NoSuchGroup)?;
        stored.users.insert(username.to_string());
        Ok(())
    }

    async fn group_create(&self, group: Group) -> DalResult<()> {
        if group.name.is_empty() {
            return Err(DataAccessError::EmptyGroupName);
        }

        let mut store = self.store.write().await;
        if store.groups.contains_key(&group.name) {
            return Err(DataAccessError::GroupExists);
        }

        let mut stored = StoredGroup::default();
        for user in &group.users {
            if store.users.contains_key(&user.username) {
                stored.users.insert(user.username.clone());
            }
        }
        store.groups.insert(group.name, stored);
        Ok(())
    }

    async fn group_delete(&self, group: &str) -> DalResult<()> {
        if group.is_empty() {
            return Err(DataAccessError::EmptyGroupName);
        }
        let mut store = self.store.write().await;
        store
            .groups
            .remove(group)
            .map(|_| ())
            .ok_or(DataAccessError::NoSuchGroup)
    }

    async fn group_get(&self, group: &str) -> DalResult<Group> {
        if group.is_empty() {
            return Err(DataAccessError::EmptyGroupName);
        }
        let store = self.store.read().await;
        let stored = store.groups.get(group).ok_or(DataAccessError::NoSuchGroup)?;
        Ok(store.group_view(group, stored))
    }

    async fn group_grant_role(&self, group: &str, role: &str) -> DalResult<()> {
        let mut store = self.store.write().await;
        if !store.roles.contains_key(role) {
            return Err(DataAccessError::NoSuchRole);
        }
        let stored = store.groups.get_mut(group).ok_or(DataAccessError::NoSuchGroup)?;
        stored.roles.insert(role.to_string());
        Ok(())
    }

    async fn group_list(&self) -> DalResult<Vec<Group>> {
        let store = self.store.read().await;
        Ok(store
            .groups
            .iter()
            .map(|(name, stored)| store.group_view(name, stored))
            .collect())
    }

    async fn group_remove_user(&self, group: &str, username: &str) -> DalResult<()> {
        let mut store = self.store.write().await;
        let stored = store.groups.get_mut(group).ok_or(DataAccessError::NoSuchGroup)?;
        if !stored.users.remove(username) {
            return Err(DataAccessError::NoSuchUser);
        }
        Ok(())
    }

    async fn group_revoke_role(&self, group: &str, role: &str) -> DalResult<()> {
        let mut store = self.store.write().await;
        let stored = store.groups.get_mut(group).ok_or(DataAccessError::NoSuchGroup)?;
        stored.roles.remove(role);
        Ok(())
    }

    async fn role_create(&self, role: &str) -> DalResult<()> {
        if role.is_empty() {
            return Err(DataAccessError::EmptyRoleName);
        }
        let mut store = self.store.write().await;
        if store.roles.contains_key(role) {
            return Err(DataAccessError::RoleExists);
        }
        store.roles.insert(role.to_string(), BTreeSet::new());
        Ok(())
    }

    async fn role_delete(&self, role: &str) -> DalResult<()> {
        if role.is_empty() {
            return Err(DataAccessError::EmptyRoleName);
        }
        let mut store = self.store.write().await;
        if store.roles.remove(role).is_none() {
            return Err(DataAccessError::NoSuchRole);
        }
        for group in store.groups.values_mut() {
            group.roles.remove(role);
        }
        Ok(())
    }

    async fn role_exists(&self, role: &str) -> DalResult<bool> {
        Ok(self.store.read().await.roles.contains_key(role))
    }

    async fn role_get(&self, role: &str) -> DalResult<Role> {
        if role.is_empty() {
            return Err(DataAccessError::EmptyRoleName);
        }
        let store = self.store.read().await;
        let permissions = store.roles.get(role).ok_or(DataAccessError::NoSuchRole)?;
        Ok(Role {
            name: role.to_string(),
            permissions: permissions.iter().cloned().collect(),
        })
    }

    async fn role_grant_permission(&self, role: &str, bundle: &str, permission: &str) -> DalResult<()> {
        if permission.is_empty() {
            return Err(DataAccessError::FieldRequired("permission"));
        }
        let mut store = self.store.write().await;
        let permissions = store.roles.get_mut(role).ok_or(DataAccessError::NoSuchRole)?;
        permissions.insert(RolePermission {
            bundle_name: bundle.to_string(),
            permission: permission.to_string(),
        });
        Ok(())
    }

    async fn role_list(&self) -> DalResult<Vec<Role>> {
        let store = self.store.read().await;
        Ok(store
            .roles
            .iter()
            .map(|(name, permissions)| Role {
                name: name.clone(),
                permissions: permissions.iter().cloned().collect(),
            })
            .collect())
    }

    async fn role_revoke_permission(&self, role: &str, bundle: &str, permission: &str) -> DalResult<()> {
        let mut store = self.store.write().await;
        let permissions = store.roles.get_mut(role).ok_or(DataAccessError::NoSuchRole)?;
        // Revoking a permission that was never granted is a no-op.
        permissions.remove(&RolePermission {
            bundle_name: bundle.to_string(),
            permission: permission.to_string(),
        });
        Ok(())
    }

    async fn token_evaluate(&self, token: &str) -> bool {
        let store = self.store.read().await;
        store
            .tokens
            .get(token)
            .map(|t| !t.is_expired())
            .unwrap_or(false)
    }

    async fn token_generate(&self, username: &str, ttl: Duration) -> DalResult<Token> {
        let duration = chrono::Duration::from_std(ttl)
            .map_err(|e| DataAccessError::Storage(format!("invalid token ttl: {}", e)))?;

        let mut store = self.store.write().await;
        if !store.users.contains_key(username) {
            return Err(DataAccessError::NoSuchUser);
        }
        store.revoke_user_token(username);

        let now = Utc::now();
        let token = Token {
            token: auth::generate_random_token(TOKEN_LEN),
            user: username.to_string(),
            duration_secs: duration.num_seconds(),
            valid_from: now,
            valid_until: now + duration,
        };

        store.tokens.insert(token.token.clone(), token.clone());
        store
            .tokens_by_user
            .insert(username.to_string(), token.token.clone());
        Ok(token)
    }

    async fn token_retrieve_by_token(&self, token: &str) -> DalResult<Token> {
        let store = self.store.read().await;
        store.tokens.get(token).cloned().ok_or(DataAccessError::NoSuchToken)
    }
}

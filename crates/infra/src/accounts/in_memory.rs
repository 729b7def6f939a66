use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use bookshelf_auth::{NewUser, Token, TokenHash, TokenScope, User};
use bookshelf_core::UserId;

use super::{TokenStore, UserStore};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct StoredToken {
    user_id: UserId,
    expiry: DateTime<Utc>,
    scope: TokenScope,
}

#[derive(Debug, Default)]
struct Inner {
    last_user_id: i64,
    users: BTreeMap<i64, User>,
    tokens: HashMap<TokenHash, StoredToken>,
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// In-memory user and token store for tests/dev.
///
/// Users and tokens share one lock, so deleting a user's tokens and resolving
/// a token through its owner behave like the cascading foreign key and the
/// join in Postgres.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    inner: RwLock<Inner>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(operation: &'static str) -> StoreError {
    StoreError::storage(operation, "lock poisoned")
}

#[async_trait::async_trait]
impl UserStore for InMemoryAccountStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("insert_user"))?;
        if inner.email_taken(&user.email, None) {
            return Err(StoreError::DuplicateEmail);
        }

        inner.last_user_id += 1;
        let stored = User {
            id: UserId::new(inner.last_user_id),
            created_at: Utc::now(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            activated: user.activated,
            version: 1,
        };
        inner.users.insert(stored.id.get(), stored.clone());
        Ok(stored)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned("get_user_by_email"))?;
        inner
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<i32, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("update_user"))?;
        if inner.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::DuplicateEmail);
        }

        let Some(stored) = inner.users.get_mut(&user.id.get()) else {
            return Err(StoreError::EditConflict);
        };
        if stored.version != user.version {
            return Err(StoreError::EditConflict);
        }

        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.activated = user.activated;
        stored.version += 1;
        Ok(stored.version)
    }

    async fn get_for_token(
        &self,
        scope: TokenScope,
        hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned("get_user_for_token"))?;
        let token = inner
            .tokens
            .get(hash)
            .filter(|t| t.scope == scope && t.expiry > now)
            .ok_or(StoreError::NotFound)?;
        inner
            .users
            .get(&token.user_id.get())
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait::async_trait]
impl TokenStore for InMemoryAccountStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("insert_token"))?;
        if !inner.users.contains_key(&token.user_id.get()) {
            return Err(StoreError::storage("insert_token", "token owner does not exist"));
        }
        inner.tokens.insert(
            token.hash,
            StoredToken {
                user_id: token.user_id,
                expiry: token.expiry,
                scope: token.scope,
            },
        );
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("delete_tokens"))?;
        inner
            .tokens
            .retain(|_, t| !(t.user_id == user_id && t.scope == scope));
        Ok(())
    }

    async fn revoke_all(&self, user_id: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("revoke_tokens"))?;
        inner.tokens.retain(|_, t| t.user_id != user_id);
        Ok(())
    }
}

//! User and token storage.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryAccountStore;
pub use postgres::{PostgresTokenStore, PostgresUserStore};

use chrono::{DateTime, Duration, Utc};

use bookshelf_auth::{NewUser, Token, TokenHash, TokenScope, User};
use bookshelf_core::UserId;

use crate::error::StoreError;

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// `DuplicateEmail` when the address is already registered.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Compare-and-increment on `version`, exactly as for books. Returns the
    /// new version.
    async fn update(&self, user: &User) -> Result<i32, StoreError>;

    /// The owner of a stored, unexpired token with this hash and scope.
    /// Unknown and expired tokens are both `NotFound`.
    async fn get_for_token(
        &self,
        scope: TokenScope,
        hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError>;
}

#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), StoreError>;

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: UserId) -> Result<(), StoreError>;

    /// Delete every token of the user, whatever the scope. Idempotent.
    async fn revoke_all(&self, user_id: UserId) -> Result<(), StoreError>;

    /// Generate and persist a token. The returned value is the only place the
    /// plaintext ever appears.
    async fn issue(&self, user_id: UserId, ttl: Duration, scope: TokenScope) -> Result<Token, StoreError> {
        let token = Token::generate(user_id, ttl, scope, Utc::now())?;
        self.insert(&token).await?;
        tracing::debug!(user_id = %user_id, scope = %scope, "token issued");
        Ok(token)
    }
}

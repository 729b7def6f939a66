//! Postgres-backed user and token stores.
//!
//! Only the SHA-256 hash of a token reaches the `tokens` table. Deleting a
//! user cascades to its tokens.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use bookshelf_auth::{NewUser, PasswordHash, Token, TokenHash, TokenScope, User};
use bookshelf_core::UserId;

use super::{TokenStore, UserStore};
use crate::db::bounded;
use crate::error::StoreError;

const USER_COLUMNS: &str = "users.id, users.created_at, users.name, users.email, users.password_hash, users.activated, users.version";

struct UserRow {
    id: i64,
    created_at: DateTime<Utc>,
    name: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            activated: row.try_get("activated")?,
            version: row.try_get("version")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::new(row.id),
            created_at: row.created_at,
            name: row.name,
            email: row.email,
            password_hash: PasswordHash::from_stored(row.password_hash),
            activated: row.activated,
            version: row.version,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PostgresUserStore {
    pub fn with_pool(pool: Arc<PgPool>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self, user), err)]
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let row = bounded(
            "insert_user",
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO users (name, email, password_hash, activated)
                VALUES ($1, $2, $3, $4)
                RETURNING id, created_at, version
                "#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.password_hash.as_str())
            .bind(user.activated)
            .fetch_one(&*self.pool),
        )
        .await?;

        let decode = |e: sqlx::Error| StoreError::storage("insert_user", e.to_string());
        Ok(User {
            id: UserId::new(row.try_get("id").map_err(decode)?),
            created_at: row.try_get("created_at").map_err(decode)?,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            activated: user.activated,
            version: row.try_get("version").map_err(decode)?,
        })
    }

    #[instrument(skip(self, email), err)]
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = bounded(
            "get_user_by_email",
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(email)
                .fetch_one(&*self.pool),
        )
        .await?;

        Ok(row.into())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, version = user.version), err)]
    async fn update(&self, user: &User) -> Result<i32, StoreError> {
        let version: Option<i32> = bounded(
            "update_user",
            self.timeout,
            sqlx::query_scalar(
                r#"
                UPDATE users
                SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.password_hash.as_str())
            .bind(user.activated)
            .bind(user.id.get())
            .bind(user.version)
            .fetch_optional(&*self.pool),
        )
        .await?;

        version.ok_or(StoreError::EditConflict)
    }

    #[instrument(skip(self, hash), fields(scope = %scope), err)]
    async fn get_for_token(
        &self,
        scope: TokenScope,
        hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
              AND tokens.scope = $2
              AND tokens.expiry > $3
            "#
        );
        let row = bounded(
            "get_user_for_token",
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(hash.as_bytes())
                .bind(scope.as_str())
                .bind(now)
                .fetch_one(&*self.pool),
        )
        .await?;

        Ok(row.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresTokenStore {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PostgresTokenStore {
    pub fn with_pool(pool: Arc<PgPool>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait::async_trait]
impl TokenStore for PostgresTokenStore {
    #[instrument(skip(self, token), fields(user_id = %token.user_id, scope = %token.scope), err)]
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        bounded(
            "insert_token",
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO tokens (hash, user_id, expiry, scope)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(token.hash.as_bytes())
            .bind(token.user_id.get())
            .bind(token.expiry)
            .bind(token.scope.as_str())
            .execute(&*self.pool),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(scope = %scope, user_id = %user_id), err)]
    async fn delete_all_for_user(&self, scope: TokenScope, user_id: UserId) -> Result<(), StoreError> {
        bounded(
            "delete_tokens",
            self.timeout,
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id.get())
                .execute(&*self.pool),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn revoke_all(&self, user_id: UserId) -> Result<(), StoreError> {
        bounded(
            "revoke_tokens",
            self.timeout,
            sqlx::query("DELETE FROM tokens WHERE user_id = $1")
                .bind(user_id.get())
                .execute(&*self.pool),
        )
        .await?;
        Ok(())
    }
}

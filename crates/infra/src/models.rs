use std::sync::Arc;

use crate::accounts::{InMemoryAccountStore, PostgresTokenStore, PostgresUserStore, TokenStore, UserStore};
use crate::authenticator::Authenticator;
use crate::books::{BookStore, InMemoryBookStore, PostgresBookStore};
use crate::db::{self, DbConfig};
use crate::error::StoreError;

/// Every store the application talks to.
#[derive(Clone)]
pub struct Models {
    pub books: Arc<dyn BookStore>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
}

impl Models {
    /// Non-persistent stores for tests/dev.
    pub fn in_memory() -> Self {
        let accounts = Arc::new(InMemoryAccountStore::new());
        Self {
            books: Arc::new(InMemoryBookStore::new()),
            users: accounts.clone(),
            tokens: accounts,
        }
    }

    /// Connect, apply migrations and build Postgres-backed stores sharing one
    /// pool.
    pub async fn postgres(config: &DbConfig) -> Result<Self, StoreError> {
        let pool = Arc::new(db::connect(config).await?);
        db::run_migrations(&pool).await?;

        Ok(Self {
            books: Arc::new(PostgresBookStore::with_pool(pool.clone(), config.query_timeout)),
            users: Arc::new(PostgresUserStore::with_pool(pool.clone(), config.query_timeout)),
            tokens: Arc::new(PostgresTokenStore::with_pool(pool, config.query_timeout)),
        })
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.users.clone())
    }
}

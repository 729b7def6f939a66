//! Infrastructure layer: Postgres and in-memory storage behind store traits.

pub mod accounts;
pub mod authenticator;
pub mod books;
pub mod db;
pub mod error;
pub mod models;

pub use accounts::{InMemoryAccountStore, PostgresTokenStore, PostgresUserStore, TokenStore, UserStore};
pub use authenticator::Authenticator;
pub use books::{BookFilter, BookStore, InMemoryBookStore, PostgresBookStore};
pub use db::DbConfig;
pub use error::StoreError;
pub use models::Models;

#[cfg(test)]
mod integration_tests;

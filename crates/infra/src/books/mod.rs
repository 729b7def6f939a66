//! Book storage with optimistic concurrency control.
//!
//! Every update is a compare-and-increment on `version`: the write only lands
//! if the stored version still equals the one the caller read, and the stored
//! version then moves forward by exactly one. A lost race surfaces as
//! `StoreError::EditConflict`; nothing here retries it.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryBookStore;
pub use postgres::PostgresBookStore;

use bookshelf_catalog::{Book, BookFields};
use bookshelf_core::{BookId, Filters, Metadata};

use crate::error::StoreError;

/// Listing filters. An empty field matches every book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// Exact ISBN.
    pub isbn: String,
    /// Full-text match on the title.
    pub title: String,
    /// Full-text match on the author.
    pub author: String,
    /// Every listed genre must be present on the book.
    pub genres: Vec<String>,
}

#[async_trait::async_trait]
pub trait BookStore: Send + Sync {
    /// Insert a book; storage assigns id, creation time and version 1.
    async fn insert(&self, fields: BookFields) -> Result<Book, StoreError>;

    /// `NotFound` for ids below 1 without touching storage.
    async fn get(&self, id: BookId) -> Result<Book, StoreError>;

    /// Write `book.fields` if the stored version still equals `book.version`.
    ///
    /// Returns the new version. A missing row and a stale version are both
    /// reported as `EditConflict`.
    async fn update(&self, book: &Book) -> Result<i32, StoreError>;

    /// Unconditional on version. `NotFound` when nothing was deleted.
    async fn delete(&self, id: BookId) -> Result<(), StoreError>;

    /// One page of matching books plus pagination metadata.
    ///
    /// The sort key is checked against the safelist before any query runs.
    async fn list(
        &self,
        filter: &BookFilter,
        filters: &Filters,
    ) -> Result<(Vec<Book>, Metadata), StoreError>;
}

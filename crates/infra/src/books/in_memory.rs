use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::Utc;

use bookshelf_catalog::{Book, BookFields};
use bookshelf_core::{BookId, Filters, Metadata, SortDirection};

use super::{BookFilter, BookStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    rows: BTreeMap<i64, Book>,
}

/// In-memory book store for tests/dev.
///
/// The write lock is held across the version check and the write, so
/// compare-and-increment is atomic just as the single `UPDATE` statement is
/// in Postgres.
#[derive(Debug, Default)]
pub struct InMemoryBookStore {
    inner: RwLock<Inner>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(operation: &'static str) -> StoreError {
    StoreError::storage(operation, "lock poisoned")
}

#[async_trait::async_trait]
impl BookStore for InMemoryBookStore {
    async fn insert(&self, fields: BookFields) -> Result<Book, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("insert_book"))?;
        inner.last_id += 1;
        let book = Book {
            id: BookId::new(inner.last_id),
            created_at: Utc::now(),
            fields,
            version: 1,
        };
        inner.rows.insert(book.id.get(), book.clone());
        Ok(book)
    }

    async fn get(&self, id: BookId) -> Result<Book, StoreError> {
        if !id.is_assignable() {
            return Err(StoreError::NotFound);
        }
        let inner = self.inner.read().map_err(|_| poisoned("get_book"))?;
        inner.rows.get(&id.get()).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, book: &Book) -> Result<i32, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("update_book"))?;
        let Some(stored) = inner.rows.get_mut(&book.id.get()) else {
            return Err(StoreError::EditConflict);
        };
        if stored.version != book.version {
            return Err(StoreError::EditConflict);
        }
        stored.fields = book.fields.clone();
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        if !id.is_assignable() {
            return Err(StoreError::NotFound);
        }
        let mut inner = self.inner.write().map_err(|_| poisoned("delete_book"))?;
        inner.rows.remove(&id.get()).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn list(
        &self,
        filter: &BookFilter,
        filters: &Filters,
    ) -> Result<(Vec<Book>, Metadata), StoreError> {
        let column = filters.sort_column()?;
        let direction = filters.sort_direction();

        let inner = self.inner.read().map_err(|_| poisoned("list_books"))?;
        let mut matched: Vec<&Book> = inner.rows.values().filter(|b| matches(b, filter)).collect();
        matched.sort_by(|a, b| {
            let ord = compare_column(a, b, column);
            let ord = match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let offset = usize::try_from(filters.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(filters.limit()).unwrap_or(0);
        let page: Vec<Book> = matched.into_iter().skip(offset).take(limit).cloned().collect();

        // The window count only exists on returned rows, so a page past the
        // end carries no metadata.
        let total = if page.is_empty() { 0 } else { total };
        Ok((page, Metadata::calculate(total, filters.cursor, filters.cursor_size)))
    }
}

fn compare_column(a: &Book, b: &Book, column: &str) -> Ordering {
    match column {
        "title" => a.fields.title.cmp(&b.fields.title),
        "author" => a.fields.author.cmp(&b.fields.author),
        "year" => a.fields.year.cmp(&b.fields.year),
        _ => a.id.cmp(&b.id),
    }
}

fn matches(book: &Book, filter: &BookFilter) -> bool {
    (filter.isbn.is_empty() || book.fields.isbn == filter.isbn)
        && text_matches(&book.fields.title, &filter.title)
        && text_matches(&book.fields.author, &filter.author)
        && filter.genres.iter().all(|g| book.fields.genres.contains(g))
}

/// Approximates `to_tsvector('simple', ..) @@ plainto_tsquery('simple', ..)`:
/// every query word must appear as a word of the text, case-insensitively.
fn text_matches(text: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let haystack: Vec<String> = words(text).collect();
    let mut needles = words(query).peekable();
    if needles.peek().is_none() {
        return false;
    }
    needles.all(|w| haystack.contains(&w))
}

fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_text_match_needs_every_word() {
        assert!(text_matches("The Rust Programming Language", "rust language"));
        assert!(text_matches("The Rust Programming Language", ""));
        assert!(!text_matches("The Rust Programming Language", "rust go"));
        assert!(!text_matches("Rustacean", "rust"));
        assert!(!text_matches("Anything", "!!"));
    }
}

//! Postgres-backed book store.
//!
//! Every statement runs under the store's query timeout (see
//! [`crate::db::bounded`]). Listing is a single statement: the total match
//! count comes from `count(*) OVER()` alongside the page rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use bookshelf_catalog::{Book, BookFields, Pages};
use bookshelf_core::{BookId, Filters, Metadata};

use super::{BookFilter, BookStore};
use crate::db::bounded;
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct PostgresBookStore {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PostgresBookStore {
    pub fn with_pool(pool: Arc<PgPool>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

/// Internal row representation for `books`.
struct BookRow {
    id: i64,
    created_at: DateTime<Utc>,
    isbn: String,
    title: String,
    author: String,
    genres: Vec<String>,
    pages: i32,
    language: String,
    publisher: String,
    year: i32,
    version: i32,
}

impl<'r> FromRow<'r, PgRow> for BookRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            isbn: row.try_get("isbn")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            genres: row.try_get("genres")?,
            pages: row.try_get("pages")?,
            language: row.try_get("language")?,
            publisher: row.try_get("publisher")?,
            year: row.try_get("year")?,
            version: row.try_get("version")?,
        })
    }
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: BookId::new(row.id),
            created_at: row.created_at,
            fields: BookFields {
                isbn: row.isbn,
                title: row.title,
                author: row.author,
                genres: row.genres,
                pages: Pages(row.pages),
                language: row.language,
                publisher: row.publisher,
                year: row.year,
            },
            version: row.version,
        }
    }
}

#[async_trait::async_trait]
impl BookStore for PostgresBookStore {
    #[instrument(skip(self, fields), fields(title = %fields.title), err)]
    async fn insert(&self, fields: BookFields) -> Result<Book, StoreError> {
        let row = bounded(
            "insert_book",
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO books (isbn, title, author, genres, pages, language, publisher, year)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id, created_at, version
                "#,
            )
            .bind(&fields.isbn)
            .bind(&fields.title)
            .bind(&fields.author)
            .bind(&fields.genres)
            .bind(fields.pages.get())
            .bind(&fields.language)
            .bind(&fields.publisher)
            .bind(fields.year)
            .fetch_one(&*self.pool),
        )
        .await?;

        let decode = |e: sqlx::Error| StoreError::storage("insert_book", e.to_string());
        Ok(Book {
            id: BookId::new(row.try_get("id").map_err(decode)?),
            created_at: row.try_get("created_at").map_err(decode)?,
            fields,
            version: row.try_get("version").map_err(decode)?,
        })
    }

    #[instrument(skip(self), fields(book_id = %id), err)]
    async fn get(&self, id: BookId) -> Result<Book, StoreError> {
        if !id.is_assignable() {
            return Err(StoreError::NotFound);
        }

        let row = bounded(
            "get_book",
            self.timeout,
            sqlx::query_as::<_, BookRow>(
                r#"
                SELECT id, created_at, isbn, title, author, genres, pages, language, publisher, year, version
                FROM books
                WHERE id = $1
                "#,
            )
            .bind(id.get())
            .fetch_one(&*self.pool),
        )
        .await?;

        Ok(row.into())
    }

    #[instrument(skip(self, book), fields(book_id = %book.id, version = book.version), err)]
    async fn update(&self, book: &Book) -> Result<i32, StoreError> {
        let fields = &book.fields;
        let version: Option<i32> = bounded(
            "update_book",
            self.timeout,
            sqlx::query_scalar(
                r#"
                UPDATE books
                SET isbn = $1, title = $2, author = $3, genres = $4, pages = $5,
                    language = $6, publisher = $7, year = $8, version = version + 1
                WHERE id = $9 AND version = $10
                RETURNING version
                "#,
            )
            .bind(&fields.isbn)
            .bind(&fields.title)
            .bind(&fields.author)
            .bind(&fields.genres)
            .bind(fields.pages.get())
            .bind(&fields.language)
            .bind(&fields.publisher)
            .bind(fields.year)
            .bind(book.id.get())
            .bind(book.version)
            .fetch_optional(&*self.pool),
        )
        .await?;

        version.ok_or(StoreError::EditConflict)
    }

    #[instrument(skip(self), fields(book_id = %id), err)]
    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        if !id.is_assignable() {
            return Err(StoreError::NotFound);
        }

        let result = bounded(
            "delete_book",
            self.timeout,
            sqlx::query("DELETE FROM books WHERE id = $1")
                .bind(id.get())
                .execute(&*self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(
        skip(self, filter, filters),
        fields(sort = %filters.sort, cursor = filters.cursor, book_count = tracing::field::Empty),
        err
    )]
    async fn list(
        &self,
        filter: &BookFilter,
        filters: &Filters,
    ) -> Result<(Vec<Book>, Metadata), StoreError> {
        // Sort target is interpolated, never bound: it must come from the safelist.
        let column = filters.sort_column()?;
        let direction = filters.sort_direction().as_sql();

        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total_records,
                   id, created_at, isbn, title, author, genres, pages, language, publisher, year, version
            FROM books
            WHERE (isbn = $1 OR $1 = '')
              AND (to_tsvector('simple', title) @@ plainto_tsquery('simple', $2) OR $2 = '')
              AND (to_tsvector('simple', author) @@ plainto_tsquery('simple', $3) OR $3 = '')
              AND (genres @> $4 OR cardinality($4::text[]) = 0)
            ORDER BY {column} {direction}, id ASC
            LIMIT $5 OFFSET $6
            "#
        );

        let rows = bounded(
            "list_books",
            self.timeout,
            sqlx::query(&sql)
                .bind(&filter.isbn)
                .bind(&filter.title)
                .bind(&filter.author)
                .bind(&filter.genres)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&*self.pool),
        )
        .await?;

        let decode = |e: sqlx::Error| StoreError::storage("list_books", e.to_string());
        let mut total_records = 0_i64;
        let mut books = Vec::with_capacity(rows.len());
        for row in rows {
            total_records = row.try_get("total_records").map_err(decode)?;
            books.push(BookRow::from_row(&row).map_err(decode)?.into());
        }

        tracing::Span::current().record("book_count", books.len());
        Ok((books, Metadata::calculate(total_records, filters.cursor, filters.cursor_size)))
    }
}

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use bookshelf_core::validation::unique;
use bookshelf_core::{BookId, DomainResult, Validator, Versioned};

use crate::Pages;

/// Sort keys accepted when listing books.
pub const SORT_SAFELIST: &[&str] = &[
    "id", "title", "author", "year", "-id", "-title", "-author", "-year",
];

const MAX_TEXT_BYTES: usize = 500;
const ISBN_LENGTH: usize = 13;
const MAX_GENRES: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Book
// ─────────────────────────────────────────────────────────────────────────────

/// Caller-editable attributes of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookFields {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub genres: Vec<String>,
    pub pages: Pages,
    pub language: String,
    pub publisher: String,
    pub year: i32,
}

/// A stored book.
///
/// `id`, `created_at` and `version` are assigned by storage. `version` starts
/// at 1 and only moves forward through compare-and-increment updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: BookId,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: BookFields,
    pub version: i32,
}

impl Versioned for Book {
    type Id = BookId;

    fn id(&self) -> BookId {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }
}

impl BookFields {
    /// Record every rule violation in `v`. `current_year` bounds `year`.
    pub fn validate(&self, v: &mut Validator, current_year: i32) {
        v.check(!self.isbn.is_empty(), "isbn", "must be provided");
        v.check(self.isbn.len() == ISBN_LENGTH, "isbn", "must be 13 digit");

        check_text(v, &self.title, "title");
        check_text(v, &self.author, "author");

        v.check(!self.genres.is_empty(), "genres", "must contain at least 1 genre");
        v.check(self.genres.len() <= MAX_GENRES, "genres", "must not contain more than 5 genres");
        v.check(unique(&self.genres), "genres", "must not contain duplicate values");

        v.check(self.pages.get() != 0, "pages", "must be provided");
        v.check(self.pages.get() > 0, "pages", "must be a positive integer");

        check_text(v, &self.language, "language");
        check_text(v, &self.publisher, "publisher");

        v.check(self.year != 0, "year", "must be provided");
        v.check(self.year > 0, "year", "must be greater than 0");
        v.check(self.year <= current_year, "year", "must not be in the future");
    }

    /// Validate against the current calendar year.
    pub fn validated(&self) -> DomainResult<()> {
        let mut v = Validator::new();
        self.validate(&mut v, Utc::now().year());
        v.finish()
    }
}

fn check_text(v: &mut Validator, value: &str, field: &str) {
    v.check(!value.is_empty(), field, "must be provided");
    v.check(
        value.len() <= MAX_TEXT_BYTES,
        field,
        "must not be more than 500 bytes long",
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Partial update
// ─────────────────────────────────────────────────────────────────────────────

/// Partial update: `None` leaves a field unchanged. `genres`, when present,
/// replaces the whole list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub genres: Option<Vec<String>>,
    pub pages: Option<Pages>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
}

impl BookPatch {
    pub fn apply(self, fields: &mut BookFields) {
        if let Some(isbn) = self.isbn {
            fields.isbn = isbn;
        }
        if let Some(title) = self.title {
            fields.title = title;
        }
        if let Some(author) = self.author {
            fields.author = author;
        }
        if let Some(genres) = self.genres {
            fields.genres = genres;
        }
        if let Some(pages) = self.pages {
            fields.pages = pages;
        }
        if let Some(language) = self.language {
            fields.language = language;
        }
        if let Some(publisher) = self.publisher {
            fields.publisher = publisher;
        }
        if let Some(year) = self.year {
            fields.year = year;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_core::DomainError;

    fn dune() -> BookFields {
        BookFields {
            isbn: "9780441172719".to_string(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            genres: vec!["science fiction".to_string(), "adventure".to_string()],
            pages: Pages(617),
            language: "English".to_string(),
            publisher: "Chilton Books".to_string(),
            year: 1965,
        }
    }

    fn errors_for(fields: &BookFields) -> bookshelf_core::FieldErrors {
        let mut v = Validator::new();
        fields.validate(&mut v, 2024);
        v.errors().clone()
    }

    #[test]
    fn valid_book_passes() {
        assert!(errors_for(&dune()).is_empty());
        assert!(dune().validated().is_ok());
    }

    #[test]
    fn missing_fields_are_reported() {
        let fields = BookFields {
            isbn: String::new(),
            title: String::new(),
            author: String::new(),
            genres: vec![],
            pages: Pages(0),
            language: String::new(),
            publisher: String::new(),
            year: 0,
        };
        let errors = errors_for(&fields);
        assert_eq!(errors.get("isbn"), Some("must be provided"));
        assert_eq!(errors.get("title"), Some("must be provided"));
        assert_eq!(errors.get("genres"), Some("must contain at least 1 genre"));
        assert_eq!(errors.get("pages"), Some("must be provided"));
        assert_eq!(errors.get("year"), Some("must be provided"));
        assert_eq!(errors.len(), 8);
    }

    #[test]
    fn genre_rules() {
        let mut fields = dune();
        fields.genres = vec!["a", "b", "c", "d", "e", "f"].into_iter().map(String::from).collect();
        assert_eq!(errors_for(&fields).get("genres"), Some("must not contain more than 5 genres"));

        fields.genres = vec!["a".to_string(), "a".to_string()];
        assert_eq!(errors_for(&fields).get("genres"), Some("must not contain duplicate values"));
    }

    #[test]
    fn future_year_and_negative_pages_are_rejected() {
        let mut fields = dune();
        fields.year = 2025;
        fields.pages = Pages(-3);
        let errors = errors_for(&fields);
        assert_eq!(errors.get("year"), Some("must not be in the future"));
        assert_eq!(errors.get("pages"), Some("must be a positive integer"));
    }

    #[test]
    fn oversized_text_is_rejected() {
        let mut fields = dune();
        fields.publisher = "x".repeat(501);
        fields.isbn = "123".to_string();
        let err = {
            let mut v = Validator::new();
            fields.validate(&mut v, 2024);
            v.finish().unwrap_err()
        };
        let DomainError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("publisher"), Some("must not be more than 500 bytes long"));
        assert_eq!(errors.get("isbn"), Some("must be 13 digit"));
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut fields = dune();
        BookPatch {
            title: Some("Dune Messiah".to_string()),
            year: Some(1969),
            ..Default::default()
        }
        .apply(&mut fields);

        assert_eq!(fields.title, "Dune Messiah");
        assert_eq!(fields.year, 1969);
        assert_eq!(fields.author, "Frank Herbert");
        assert_eq!(fields.genres.len(), 2);
    }

    #[test]
    fn patch_replaces_genre_list_wholesale() {
        let mut fields = dune();
        BookPatch {
            genres: Some(vec!["classic".to_string()]),
            ..Default::default()
        }
        .apply(&mut fields);
        assert_eq!(fields.genres, vec!["classic".to_string()]);
    }

    #[test]
    fn serialized_book_hides_created_at() {
        let book = Book {
            id: BookId::new(7),
            created_at: Utc::now(),
            fields: dune(),
            version: 2,
        };
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["version"], 2);
        assert_eq!(json["pages"], "617 pages");
        assert!(json.get("created_at").is_none());
    }
}

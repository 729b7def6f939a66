//! `bookshelf-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod pagination;
pub mod validation;

pub use entity::{ExpectedVersion, Versioned};
pub use error::{DomainError, DomainResult};
pub use id::{BookId, UserId};
pub use pagination::{Filters, Metadata, PaginationError, SortDirection};
pub use validation::{FieldErrors, Validator};

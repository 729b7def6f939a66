//! Catalog domain module.
//!
//! This crate contains the book resource and its business rules, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod book;
pub mod pages;

pub use book::{Book, BookFields, BookPatch, SORT_SAFELIST};
pub use pages::{Pages, PagesFormatError};

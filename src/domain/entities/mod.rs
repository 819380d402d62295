//! Core domain entities representing the business data model.
//!
//! Entities are plain data structures without store-specific logic.
//!
//! # Entity Types
//!
//! - [`UrlRecord`] - A shortened URL with owner, lifetime and activity flag
//! - [`NewUrlRecord`] - Input for inserting a record
//! - [`UrlPage`] / [`PaginationMeta`] - One page of an owner listing

pub mod url_record;

pub use url_record::{NewUrlRecord, PaginationMeta, UrlPage, UrlRecord};

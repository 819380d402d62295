//! Durable store implementations.
//!
//! # Repositories
//!
//! - [`PgUrlRepository`] - PostgreSQL storage for URL records
//! - [`MemoryUrlRepository`] - In-process storage for tests and local runs

pub mod memory_url_repository;
pub mod pg_url_repository;

pub use memory_url_repository::MemoryUrlRepository;
pub use pg_url_repository::PgUrlRepository;

//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for data persistence and caching.
//!
//! # Modules
//!
//! - [`cache`] - Expiring key-value store (Redis and in-memory implementations)
//! - [`persistence`] - Durable record store (PostgreSQL and in-memory implementations)

pub mod cache;
pub mod persistence;

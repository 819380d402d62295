//! Domain layer containing business entities and logic.
//!
//! This module defines entities, repository interfaces, and the expiration
//! listener, independent of the concrete stores.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`expiration_listener`] - Background reconciliation of cache expirations
//!
//! # Expiration Flow
//!
//! 1. A short key's TTL runs out in the cache
//! 2. The cache publishes the expired key name
//! 3. [`expiration_listener::ExpirationListener`] receives it
//! 4. The record is deactivated via [`repositories::UrlRepository::mark_expired_by_code`]

pub mod entities;
pub mod expiration_listener;
pub mod repositories;

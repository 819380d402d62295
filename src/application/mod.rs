//! Application layer services implementing business logic.
//!
//! Services consume the repository and cache traits and run the multi-store
//! sagas; HTTP handlers and the admin binary call into them.
//!
//! # Available Services
//!
//! - [`services::shorten_service::ShortenService`] - Link creation and listing
//! - [`services::lifecycle_service::LifecycleService`] - Soft delete and expiry extension
//! - [`services::redirect_service::RedirectService`] - Short code resolution

pub mod services;

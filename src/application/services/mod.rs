//! Coordinators spanning the durable store and the cache.

pub mod lifecycle_service;
pub mod redirect_service;
pub mod shorten_service;

pub use lifecycle_service::LifecycleService;
pub use redirect_service::RedirectService;
pub use shorten_service::ShortenService;

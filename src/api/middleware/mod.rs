//! HTTP middleware for request processing.
//!
//! Provides caller identity and observability middleware.

pub mod identity;
pub mod tracing;

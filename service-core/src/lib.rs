//! Shared building blocks for the auth platform services.
//!
//! Carries the error taxonomy every service maps onto the wire, the
//! tracing/logging bootstrap, and the per-IP rate-limit middleware applied
//! in front of credential-sensitive endpoints.

pub mod error;
pub mod middleware;
pub mod observability;

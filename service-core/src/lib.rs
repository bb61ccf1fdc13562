//! service-core: shared infrastructure for roster services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

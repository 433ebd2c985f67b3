//! Shared building blocks for the Snowflake query service.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;

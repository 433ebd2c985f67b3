//! Shared data models.

pub mod query;

pub use query::{BindValue, QueryRequest, Row};

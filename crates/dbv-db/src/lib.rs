//! dbv-db - Database layer for dbv
//!
//! This crate provides the [`Backend`] trait the migration engine talks to
//! and its DuckDB implementation.

pub mod duckdb;
pub mod error;
pub mod traits;
pub mod value;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::{Backend, Row, TableInfo, TableKind};
pub use value::SqlValue;

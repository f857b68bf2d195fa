//! dbv-sql - SQL layer for dbv
//!
//! This crate provides syntax-only validation of change scripts through
//! sqlparser-rs and the extraction of the tables a script touches, which
//! drives backup targeting.

pub mod dialect;
pub mod error;
pub mod extractor;
pub mod parser;

pub use dialect::{DuckDbDialect, SqlDialect};
pub use error::{SqlError, SqlResult};
pub use extractor::{AstExtractor, KeywordScanner, TableExtractor};
pub use parser::SqlParser;

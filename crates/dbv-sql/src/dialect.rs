//! SQL dialect abstraction

use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, DuckDbDialect as SqlParserDuckDb};
use sqlparser::parser::Parser;

use crate::error::{SqlError, SqlResult};

/// Trait for SQL dialect implementations
pub trait SqlDialect {
    /// Get the underlying sqlparser dialect
    fn parser_dialect(&self) -> &dyn Dialect;

    /// Parse SQL into AST statements
    fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        Parser::parse_sql(self.parser_dialect(), sql).map_err(|e| {
            let message = e.to_string();
            let (line, column) = location_from_error(&message);
            SqlError::ParseError {
                message,
                line,
                column,
            }
        })
    }

    /// Quote an identifier for this dialect
    fn quote_ident(&self, ident: &str) -> String;

    /// Get the dialect name
    fn name(&self) -> &'static str;
}

/// Pull "Line: N, Column: M" out of a sqlparser error message.
///
/// `ParserError` carries no structured location, only the rendered text.
fn location_from_error(msg: &str) -> (usize, usize) {
    fn number_after(msg: &str, label: &str) -> Option<usize> {
        let start = msg.find(label)? + label.len();
        let digits: String = msg[start..]
            .chars()
            .skip_while(|c| c.is_whitespace())
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }
    match (number_after(msg, "Line:"), number_after(msg, "Column:")) {
        (Some(line), Some(column)) => (line, column),
        _ => (0, 0),
    }
}

/// DuckDB SQL dialect
pub struct DuckDbDialect {
    dialect: SqlParserDuckDb,
}

impl DuckDbDialect {
    /// Create a new DuckDB dialect
    pub fn new() -> Self {
        Self {
            dialect: SqlParserDuckDb {},
        }
    }
}

impl Default for DuckDbDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for DuckDbDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn name(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_error() {
        assert_eq!(
            location_from_error("Expected: end of statement, found: x at Line: 3, Column: 14"),
            (3, 14)
        );
        assert_eq!(location_from_error("no location here"), (0, 0));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        let d = DuckDbDialect::new();
        assert_eq!(d.quote_ident("users"), "\"users\"");
        assert_eq!(d.quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}

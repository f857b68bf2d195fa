//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{Backend, Row, TableInfo, TableKind};
use crate::value::SqlValue;
use dbv_sql::{SqlError, SqlParser};
use duckdb::types::{ToSql, ToSqlOutput, Value, ValueRef};
use duckdb::{params_from_iter, Config, Connection};
use std::path::Path;

/// Statement size limit used when none is configured
pub const DEFAULT_MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// DuckDB database backend.
///
/// Single-threaded: no `Mutex`, the migration run is sequential. Row
/// streaming goes through a second connection to the same database so that
/// ledger writes can be issued while a result set is still being read.
pub struct DuckDbBackend {
    conn: Connection,
    reader: Connection,
    parser: SqlParser,
    max_packet_size: usize,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB database
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Open (or create) a DuckDB database file
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Self::from_connection(conn)
    }

    /// Open from a path string (handles the `:memory:` special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        let reader = conn
            .try_clone()
            .map_err(|e| DbError::ConnectionError(format!("reader connection: {e}")))?;
        Ok(Self {
            conn,
            reader,
            parser: SqlParser::duckdb(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        })
    }

    /// Override the statement size limit
    pub fn with_max_packet_size(mut self, bytes: usize) -> Self {
        self.max_packet_size = bytes;
        self
    }

    /// CREATE statement of a table or view as recorded in the catalog
    fn catalog_sql(&self, kind: TableKind, name: &str) -> DbResult<Option<String>> {
        let (function, column) = match kind {
            TableKind::BaseTable => ("duckdb_tables()", "table_name"),
            TableKind::View => ("duckdb_views()", "view_name"),
            TableKind::Other => return Ok(None),
        };
        let sql = format!(
            "SELECT sql FROM {function} WHERE database_name = current_database() \
             AND schema_name = current_schema() AND {column} = ?"
        );
        let rows = self.query(&sql, &[name.into()])?;
        Ok(rows.into_iter().next().and_then(|r| r.into_iter().next().flatten()))
    }

    /// CREATE INDEX statements of a table's explicitly created indexes.
    ///
    /// Indexes backing PRIMARY KEY and UNIQUE constraints are part of the
    /// table's own CREATE statement and are not listed here.
    fn index_sql(&self, table: &str) -> DbResult<Vec<String>> {
        let rows = self.query(
            "SELECT sql FROM duckdb_indexes() WHERE database_name = current_database() \
             AND schema_name = current_schema() AND table_name = ? ORDER BY index_name",
            &[table.into()],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.into_iter().next().flatten())
            .collect())
    }

    /// Ask DuckDB's own parser about a script the generic parser rejected.
    ///
    /// The script is prepared on a throwaway in-memory database with external
    /// access disabled, so nothing reaches the target database or the file
    /// system. Only a parser error confirms the rejection; catalog and binder
    /// errors mean the syntax is fine.
    fn confirm_parse_error(&self, sql: &str, rejected: SqlError) -> DbResult<()> {
        let scratch = Config::default()
            .enable_external_access(false)
            .and_then(|c| c.enable_autoload_extension(false))
            .and_then(Connection::open_in_memory_with_flags)
            .map_err(|e| DbError::ConnectionError(format!("scratch parser connection: {e}")))?;
        let prepared = scratch.prepare(sql).map(|_| ());
        if let Err(e) = prepared {
            let message = e.to_string();
            if message.contains("Parser Error") || message.contains("syntax error") {
                return Err(DbError::ValidationError(format!("{rejected} ({message})")));
            }
            log::debug!("DuckDB parsed the script; preparing it failed with: {message}");
        }
        log::warn!("Accepted by DuckDB but not by the generic SQL parser: {rejected}");
        Ok(())
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(n) => Value::BigInt(*n),
            SqlValue::Real(x) => Value::Double(*x),
            SqlValue::Bool(b) => Value::Boolean(*b),
            SqlValue::Text(s) => Value::Text(s.clone()),
        }))
    }
}

/// Read a column value as a string, keeping SQL NULL distinct.
///
/// Floats and booleans are matched first since the integer getter would
/// coerce them; the rest goes through the String -> i64 getter chain.
fn column_as_string(row: &duckdb::Row<'_>, idx: usize) -> Option<String> {
    match row.get_ref(idx) {
        Ok(ValueRef::Null) => return None,
        Ok(ValueRef::Boolean(b)) => return Some(b.to_string()),
        Ok(ValueRef::Double(x)) => return Some(x.to_string()),
        Ok(ValueRef::Float(x)) => return Some(x.to_string()),
        _ => {}
    }
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return Some(s);
    }
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return Some(n.to_string());
    }
    log::warn!("Column {idx} has a type that cannot be read as text; cast it to VARCHAR");
    None
}

fn read_row(row: &duckdb::Row<'_>) -> Row {
    // Statement metadata is only valid once the statement has run
    let column_count = row.as_ref().column_count();
    (0..column_count)
        .map(|i| column_as_string(row, i))
        .collect()
}

impl Backend for DuckDbBackend {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn execute_batch(&self, sql: &str) -> DbResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_row(row));
        }
        Ok(out)
    }

    fn for_each_row(
        &self,
        sql: &str,
        on_row: &mut dyn FnMut(&[Option<String>]) -> DbResult<()>,
    ) -> DbResult<usize> {
        let mut stmt = self.reader.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            on_row(&read_row(row))?;
            count += 1;
        }
        Ok(count)
    }

    fn validate(&self, sql: &str) -> DbResult<()> {
        match self.parser.validate(sql) {
            Ok(_) => Ok(()),
            Err(rejected @ SqlError::ParseError { .. }) => self.confirm_parse_error(sql, rejected),
            Err(e) => Err(DbError::ValidationError(e.to_string())),
        }
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn describe_table(&self, name: &str) -> DbResult<Option<TableInfo>> {
        let rows = self.query(
            "SELECT table_name, table_type FROM information_schema.tables \
             WHERE table_catalog = current_database() AND table_schema = current_schema() \
             AND lower(table_name) = lower(?)",
            &[name.into()],
        )?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let mut cells = row.into_iter();
        let Some(actual) = cells.next().flatten() else {
            return Err(DbError::Internal(format!(
                "catalog returned no name for '{name}'"
            )));
        };
        let kind = match cells.next().flatten().as_deref() {
            Some("BASE TABLE") => TableKind::BaseTable,
            Some("VIEW") => TableKind::View,
            _ => TableKind::Other,
        };

        let create_sql = self.catalog_sql(kind, &actual)?;
        let indexes = match kind {
            TableKind::BaseTable => self.index_sql(&actual)?,
            _ => Vec::new(),
        };

        let columns = self
            .query(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_catalog = current_database() AND table_schema = current_schema() \
                 AND table_name = ? ORDER BY ordinal_position",
                &[actual.as_str().into()],
            )?
            .into_iter()
            .filter_map(|r| r.into_iter().next().flatten())
            .collect();

        Ok(Some(TableInfo {
            name: actual,
            kind,
            create_sql,
            columns,
            indexes,
        }))
    }

    fn active_namespaces(&self) -> DbResult<Vec<String>> {
        let rows = self.query("SELECT current_database(), current_schema()", &[])?;
        Ok(rows
            .into_iter()
            .flatten()
            .flatten()
            .map(|n| n.to_lowercase())
            .collect())
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;

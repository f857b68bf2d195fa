//! Backend trait definition

use crate::error::DbResult;
use crate::value::SqlValue;

/// One result row; `None` is SQL NULL
pub type Row = Vec<Option<String>>;

/// Storage kind of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// A table with its own storage
    BaseTable,
    /// A view (no storage)
    View,
    /// Anything else the catalog reports
    Other,
}

impl TableKind {
    /// Whether the relation stores rows that a backup has to capture
    pub fn has_storage(self) -> bool {
        matches!(self, TableKind::BaseTable)
    }
}

/// Catalog description of a relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// Name as stored in the catalog
    pub name: String,
    /// Relation kind
    pub kind: TableKind,
    /// Statement recreating the relation, when the backend can produce one
    pub create_sql: Option<String>,
    /// Column names in ordinal order
    pub columns: Vec<String>,
    /// `CREATE INDEX` statements of the relation's secondary indexes
    pub indexes: Vec<String>,
}

/// Execution and connection service used by the migration engine.
///
/// Calls are synchronous and the engine drives one backend from a single
/// thread.
pub trait Backend {
    /// Execute one statement with bound parameters, returning affected rows
    fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Execute a script of one or more statements
    fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Run a query and collect every row
    fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>>;

    /// Run a query and hand each row to `on_row` in order, returning the
    /// number of rows visited.
    ///
    /// Callers may issue further statements against this backend from inside
    /// `on_row`.
    fn for_each_row(
        &self,
        sql: &str,
        on_row: &mut dyn FnMut(&[Option<String>]) -> DbResult<()>,
    ) -> DbResult<usize>;

    /// Syntax-check `sql` without executing it against this database
    fn validate(&self, sql: &str) -> DbResult<()>;

    /// Quote a value as a SQL string literal
    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Quote an identifier
    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Largest statement, in bytes, the connection accepts
    fn max_packet_size(&self) -> usize;

    /// Describe a relation of the active database, or `None` if absent
    fn describe_table(&self, name: &str) -> DbResult<Option<TableInfo>>;

    /// Qualifiers that denote the active database (lower case)
    fn active_namespaces(&self) -> DbResult<Vec<String>>;

    /// Backend identifier for logging
    fn db_type(&self) -> &'static str;
}

//! Relational store consumed by both pipelines
//!
//! The pipelines only ever create tables, replace a table's contents, append
//! rows and select rows back. [`RelationalStore`] captures exactly that
//! surface; [`SqliteStore`] is the SQLite-backed implementation used at
//! runtime.

use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::fmt;
use std::path::Path;

/// A single stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(v) => Some(*v),
            Cell::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(v) => Some(*v as f64),
            Cell::Real(v) => Some(*v),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Null => None,
        }
    }

    /// Text rendering used for CSV output and string-typed reads.
    /// NULL renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Integer(v) => v.to_string(),
            Cell::Real(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map(Cell::Text).unwrap_or(Cell::Null)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Real(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::Owned(Value::Null),
            Cell::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            Cell::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            Cell::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl<'a> From<ValueRef<'a>> for Cell {
    fn from(value: ValueRef<'a>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(v) => Cell::Integer(v),
            ValueRef::Real(v) => Cell::Real(v),
            ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Declared SQLite storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A fully materialized table: column names plus rows in query order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Table contents handed to a replace operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Cell>>,
}

/// Selection issued against the store: all rows of one table, projected and
/// ordered. Joins and grouping happen in the aggregator, not in SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub table: String,
    /// Empty selects every column in declared order.
    pub columns: Vec<String>,
    pub order_by: Vec<String>,
}

impl Select {
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            order_by: Vec::new(),
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = columns.into_iter().map(Into::into).collect();
        self
    }

    fn to_sql(&self) -> String {
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projection, quote_ident(&self.table));
        if !self.order_by.is_empty() {
            let order = self.order_by.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        sql
    }
}

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Io(std::io::Error),
    ArityMismatch {
        table: String,
        expected: usize,
        found: usize,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::ArityMismatch { table, expected, found } => write!(
                f,
                "Row for table '{}' has {} values, expected {}",
                table, found, expected
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            StoreError::Io(e) => Some(e),
            StoreError::ArityMismatch { .. } => None,
        }
    }
}

/// Storage operations the pipelines rely on. No updates, no row deletes.
pub trait RelationalStore {
    /// Create `name` if it does not already exist.
    fn create_table(&mut self, name: &str, columns: &[ColumnDef]) -> Result<(), StoreError>;

    /// Atomically replace every listed table (drop, create, insert) in a
    /// single transaction.
    fn replace_tables(&mut self, tables: &[TableData]) -> Result<(), StoreError>;

    /// Append `rows` to `table` in a single transaction.
    fn insert_rows(&mut self, table: &str, rows: &[Vec<Cell>]) -> Result<(), StoreError>;

    fn query(&self, select: &Select) -> Result<Table, StoreError>;

    fn table_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Drop every listed table that exists, in a single transaction.
    fn drop_tables(&mut self, names: &[&str]) -> Result<(), StoreError>;

    /// Replace one table's contents wholesale.
    fn replace_table(&mut self, data: &TableData) -> Result<(), StoreError> {
        self.replace_tables(std::slice::from_ref(data))
    }

    fn insert_row(&mut self, table: &str, values: Vec<Cell>) -> Result<(), StoreError> {
        self.insert_rows(table, &[values])
    }

    /// Backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// SQLite-backed [`RelationalStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        log::debug!("Opened SQLite store at {}", db_path.display());
        Ok(Self { conn })
    }

    /// Delete any previous database file at `db_path`, then open a fresh one.
    ///
    /// WAL side files are removed too so no state from an aborted run
    /// survives.
    pub fn recreate(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        delete_db_if_exists(db_path)?;
        Self::open(db_path)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }
}

/// Remove a database file and its `-wal`/`-shm` companions if present.
/// Returns whether the main file existed.
pub fn delete_db_if_exists(db_path: &Path) -> std::io::Result<bool> {
    let existed = db_path.exists();
    if existed {
        std::fs::remove_file(db_path)?;
        log::info!("Deleted existing database file: {}", db_path.display());
    }

    for suffix in ["-wal", "-shm"] {
        let mut side = db_path.as_os_str().to_owned();
        side.push(suffix);
        let side = Path::new(&side);
        if side.exists() {
            std::fs::remove_file(side)?;
        }
    }

    Ok(existed)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(name: &str, columns: &[ColumnDef]) -> String {
    let defs = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(name), defs)
}

fn insert_sql(name: &str, arity: usize) -> String {
    let placeholders = (1..=arity).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ");
    format!("INSERT INTO {} VALUES ({})", quote_ident(name), placeholders)
}

fn check_arity(table: &str, expected: usize, rows: &[Vec<Cell>]) -> Result<(), StoreError> {
    if let Some(row) = rows.iter().find(|r| r.len() != expected) {
        return Err(StoreError::ArityMismatch {
            table: table.to_string(),
            expected,
            found: row.len(),
        });
    }
    Ok(())
}

impl SqliteStore {
    fn column_count(&self, table: &str) -> Result<usize, StoreError> {
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {} LIMIT 0", quote_ident(table)))?;
        let count = stmt.column_count();
        stmt.finalize()?;
        Ok(count)
    }
}

impl RelationalStore for SqliteStore {
    fn create_table(&mut self, name: &str, columns: &[ColumnDef]) -> Result<(), StoreError> {
        self.conn.execute(&create_table_sql(name, columns), [])?;
        log::info!("Created {}", name);
        Ok(())
    }

    fn replace_tables(&mut self, tables: &[TableData]) -> Result<(), StoreError> {
        for data in tables {
            check_arity(&data.name, data.columns.len(), &data.rows)?;
        }

        let tx = self.conn.transaction()?;

        for data in tables {
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(&data.name)), [])?;
            tx.execute(&create_table_sql(&data.name, &data.columns), [])?;

            let mut stmt = tx.prepare(&insert_sql(&data.name, data.columns.len()))?;
            for row in &data.rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }

        tx.commit()?;

        for data in tables {
            log::debug!("Replaced {} ({} rows)", data.name, data.rows.len());
        }
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, rows: &[Vec<Cell>]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let arity = self.column_count(table)?;
        check_arity(table, arity, rows)?;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert_sql(table, arity))?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        log::debug!("Inserted {} rows into {}", rows.len(), table);
        Ok(())
    }

    fn query(&self, select: &Select) -> Result<Table, StoreError> {
        let mut stmt = self.conn.prepare(&select.to_sql())?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                cells.push(Cell::from(row.get_ref(idx)?));
            }
            rows.push(cells);
        }

        Ok(Table { columns, rows })
    }

    fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        Ok(stmt.exists([name])?)
    }

    fn drop_tables(&mut self, names: &[&str]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for name in names {
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])?;
        }
        tx.commit()?;

        log::debug!("Dropped {}", names.join(", "));
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

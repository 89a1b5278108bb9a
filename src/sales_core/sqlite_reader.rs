//! Typed reads of the loaded date dimension, dimension and fact tables
//!
//! Column names are resolved from the loaded headers: the date dimension uses
//! `DATE_KEY`/`DATE_FLD`, a dimension table `*_KEY`/`*_CODE`/`*_DESCRIPTION`,
//! and a fact table `<dimension key>`/`DATE_KEY`/`*_VAL`.

use super::window::{parse_date, InvalidDateError};
use crate::store::{Cell, RelationalStore, Select, StoreError, Table};
use chrono::NaiveDate;
use std::fmt;

pub const DATE_KEY_COLUMN: &str = "DATE_KEY";
pub const DATE_VALUE_COLUMN: &str = "DATE_FLD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateDimensionRow {
    pub date_key: i64,
    pub date_value: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionRow {
    pub dimension_key: i64,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub dimension_key: i64,
    pub date_key: i64,
    pub measure_value: f64,
}

/// Column names of a loaded dimension table, e.g. `STORE_KEY`,
/// `STORE_CODE`, `STORE_DESCRIPTION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionColumns {
    pub key: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug)]
pub enum ReaderError {
    Store(StoreError),
    SchemaMismatch { table: String, detail: String },
    InvalidValue { table: String, column: String, row: usize, value: String },
    InvalidDate(InvalidDateError),
}

impl From<StoreError> for ReaderError {
    fn from(err: StoreError) -> Self {
        ReaderError::Store(err)
    }
}

impl From<InvalidDateError> for ReaderError {
    fn from(err: InvalidDateError) -> Self {
        ReaderError::InvalidDate(err)
    }
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Store(e) => write!(f, "Store error: {}", e),
            ReaderError::SchemaMismatch { table, detail } => {
                write!(f, "Schema mismatch in {}: {}", table, detail)
            }
            ReaderError::InvalidValue { table, column, row, value } => write!(
                f,
                "Invalid value '{}' in {}.{} (row {})",
                value, table, column, row
            ),
            ReaderError::InvalidDate(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ReaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReaderError::Store(e) => Some(e),
            ReaderError::InvalidDate(e) => Some(e),
            _ => None,
        }
    }
}

/// Reads typed rows out of a [`RelationalStore`].
pub struct SalesTableReader<'a, S: RelationalStore> {
    store: &'a S,
}

impl<'a, S: RelationalStore> SalesTableReader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn read_dates(&self, table: &str) -> Result<Vec<DateDimensionRow>, ReaderError> {
        let data = self.store.query(&Select::all(table).order_by([DATE_KEY_COLUMN]))?;
        let key_idx = require_column(&data, table, DATE_KEY_COLUMN)?;
        let date_idx = require_column(&data, table, DATE_VALUE_COLUMN)?;

        let mut rows = Vec::with_capacity(data.len());
        for (row_idx, row) in data.rows.iter().enumerate() {
            rows.push(DateDimensionRow {
                date_key: int_cell(table, DATE_KEY_COLUMN, row_idx, &row[key_idx])?,
                date_value: parse_date(&row[date_idx].to_text())?,
            });
        }

        log::debug!("📥 Read {} date rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Resolve the `*_KEY`, `*_CODE`, `*_DESCRIPTION` columns of a dimension
    /// table.
    pub fn dimension_columns(&self, table: &str) -> Result<DimensionColumns, ReaderError> {
        let data = self.store.query(&Select::all(table))?;
        Ok(DimensionColumns {
            key: suffix_column(&data, table, "_KEY")?,
            code: suffix_column(&data, table, "_CODE")?,
            description: suffix_column(&data, table, "_DESCRIPTION")?,
        })
    }

    pub fn read_dimensions(
        &self,
        table: &str,
    ) -> Result<(DimensionColumns, Vec<DimensionRow>), ReaderError> {
        let columns = self.dimension_columns(table)?;
        let data = self.store.query(
            &Select::all(table)
                .columns([&columns.key, &columns.code, &columns.description])
                .order_by([&columns.key]),
        )?;

        let mut rows = Vec::with_capacity(data.len());
        for (row_idx, row) in data.rows.iter().enumerate() {
            rows.push(DimensionRow {
                dimension_key: int_cell(table, &columns.key, row_idx, &row[0])?,
                code: row[1].to_text(),
                description: row[2].to_text(),
            });
        }

        log::debug!("📥 Read {} dimension rows from {}", rows.len(), table);
        Ok((columns, rows))
    }

    /// Facts keyed by `dimension_key_column`, `DATE_KEY` and the table's
    /// `*_VAL` measure column.
    pub fn read_facts(
        &self,
        table: &str,
        dimension_key_column: &str,
    ) -> Result<Vec<FactRow>, ReaderError> {
        let data = self.store.query(&Select::all(table))?;
        let dim_idx = require_column(&data, table, dimension_key_column)?;
        let date_idx = require_column(&data, table, DATE_KEY_COLUMN)?;
        let measure = suffix_column(&data, table, "_VAL")?;
        let measure_idx = require_column(&data, table, &measure)?;

        let mut rows = Vec::with_capacity(data.len());
        for (row_idx, row) in data.rows.iter().enumerate() {
            let measure_cell = &row[measure_idx];
            let measure_value = measure_cell.as_f64().ok_or_else(|| ReaderError::InvalidValue {
                table: table.to_string(),
                column: measure.clone(),
                row: row_idx + 1,
                value: measure_cell.to_text(),
            })?;

            rows.push(FactRow {
                dimension_key: int_cell(table, dimension_key_column, row_idx, &row[dim_idx])?,
                date_key: int_cell(table, DATE_KEY_COLUMN, row_idx, &row[date_idx])?,
                measure_value,
            });
        }

        log::debug!("📥 Read {} fact rows from {}", rows.len(), table);
        Ok(rows)
    }
}

fn require_column(data: &Table, table: &str, column: &str) -> Result<usize, ReaderError> {
    data.column_index(column).ok_or_else(|| ReaderError::SchemaMismatch {
        table: table.to_string(),
        detail: format!("missing column {}", column),
    })
}

/// First column whose name ends with `suffix` (case-insensitive), skipping
/// `DATE_KEY` when looking for a dimension key.
fn suffix_column(data: &Table, table: &str, suffix: &str) -> Result<String, ReaderError> {
    data.columns
        .iter()
        .find(|c| {
            let upper = c.to_ascii_uppercase();
            upper.ends_with(suffix) && upper != DATE_KEY_COLUMN
        })
        .cloned()
        .ok_or_else(|| ReaderError::SchemaMismatch {
            table: table.to_string(),
            detail: format!("no *{} column in [{}]", suffix, data.columns.join(", ")),
        })
}

fn int_cell(table: &str, column: &str, row_idx: usize, cell: &Cell) -> Result<i64, ReaderError> {
    cell.as_i64().ok_or_else(|| ReaderError::InvalidValue {
        table: table.to_string(),
        column: column.to_string(),
        row: row_idx + 1,
        value: cell.to_text(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sales_core::loader::{TabularLoader, TabularSource};
    use crate::store::SqliteStore;

    fn load(store: &mut SqliteStore, table: &str, csv: &str) {
        let source = TabularSource::from_reader(table, csv.as_bytes()).unwrap();
        TabularLoader::new(store).load(&source, table).unwrap();
    }

    #[test]
    fn test_read_dates() {
        let mut store = SqliteStore::in_memory().unwrap();
        load(&mut store, "date_table", "DATE_KEY,DATE_FLD\n2,2023-01-02\n1,2023-01-01\n");

        let dates = SalesTableReader::new(&store).read_dates("date_table").unwrap();
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0].date_key, 1);
        assert_eq!(dates[0].date_value, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }

    #[test]
    fn test_read_dates_invalid_date() {
        let mut store = SqliteStore::in_memory().unwrap();
        load(&mut store, "date_table", "DATE_KEY,DATE_FLD\n1,2023-13-01\n");

        let err = SalesTableReader::new(&store).read_dates("date_table").unwrap_err();
        assert!(matches!(err, ReaderError::InvalidDate(ref e) if e.value == "2023-13-01"));
    }

    #[test]
    fn test_read_dimensions_resolves_columns() {
        let mut store = SqliteStore::in_memory().unwrap();
        load(
            &mut store,
            "stores_table",
            "STORE_KEY,STORE_CODE,STORE_DESCRIPTION\n2,002,Store 2\n1,001,Store 1\n",
        );

        let (columns, rows) = SalesTableReader::new(&store).read_dimensions("stores_table").unwrap();
        assert_eq!(columns.key, "STORE_KEY");
        assert_eq!(columns.code, "STORE_CODE");
        assert_eq!(columns.description, "STORE_DESCRIPTION");
        assert_eq!(
            rows[0],
            DimensionRow {
                dimension_key: 1,
                code: "001".to_string(),
                description: "Store 1".to_string(),
            }
        );
    }

    #[test]
    fn test_read_dimensions_keeps_code_text() {
        let mut store = SqliteStore::in_memory().unwrap();
        load(
            &mut store,
            "stores_table",
            "STORE_KEY,STORE_CODE,STORE_DESCRIPTION\n1,1.10,2.50\n2,1e3,7.0\n",
        );

        let (_, rows) = SalesTableReader::new(&store).read_dimensions("stores_table").unwrap();
        let values: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.code.as_str(), r.description.as_str()))
            .collect();
        assert_eq!(values, vec![("1.10", "2.50"), ("1e3", "7.0")]);
    }

    #[test]
    fn test_read_facts() {
        let mut store = SqliteStore::in_memory().unwrap();
        load(&mut store, "fsl_table", "STORE_KEY,DATE_KEY,SALE_NET_VAL\n1,1,100\n1,2,150.5\n");

        let facts = SalesTableReader::new(&store).read_facts("fsl_table", "STORE_KEY").unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[1].measure_value, 150.5);
        assert_eq!(facts[1].date_key, 2);
    }

    #[test]
    fn test_missing_measure_column() {
        let mut store = SqliteStore::in_memory().unwrap();
        load(&mut store, "fsl_table", "STORE_KEY,DATE_KEY,AMOUNT\n1,1,100\n");

        let err = SalesTableReader::new(&store).read_facts("fsl_table", "STORE_KEY").unwrap_err();
        assert!(matches!(err, ReaderError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_non_numeric_measure() {
        let mut store = SqliteStore::in_memory().unwrap();
        load(&mut store, "fsl_table", "STORE_KEY,DATE_KEY,SALE_NET_VAL\n1,1,abc\n");

        let err = SalesTableReader::new(&store).read_facts("fsl_table", "STORE_KEY").unwrap_err();
        assert!(matches!(err, ReaderError::InvalidValue { row: 1, .. }));
    }
}

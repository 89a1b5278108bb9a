//! Result Materializer - named result sets and their sinks
//!
//! Aggregation and flattening results become [`ResultSet`]s collected in a
//! [`ResultCatalog`]. Sinks ([`ResultSinkBackend`]) emit a whole catalog:
//! CSV files or store tables.

pub mod csv_writer;
pub mod sqlite_writer;
pub mod writer_backend;

pub use csv_writer::{write_csv, write_csv_to, CsvDirectoryWriter, StagedCsv};
pub use sqlite_writer::StoreResultWriter;
pub use writer_backend::{MaterializeError, ResultSinkBackend};

use crate::sales_core::{DimensionColumns, PeriodRow, ToDateRow};
use crate::store::{Cell, ColumnDef, ColumnType, Table, TableData};
use std::collections::BTreeMap;

pub const YTD_COLUMN: &str = "YTD_SALES";
pub const MTD_COLUMN: &str = "MTD_SALES";
pub const WTD_COLUMN: &str = "WTD_SALES";
pub const PERIOD_COLUMN: &str = "PERIOD";
pub const PERIOD_TOTAL_COLUMN: &str = "SALES";

/// A named, fully materialized row set with a declared column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultSet {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Wrap a queried table. Column types are taken from `columns`.
    pub fn from_table(name: impl Into<String>, columns: Vec<ColumnDef>, table: Table) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: table.rows,
        }
    }

    /// To-date view: dimension columns then YTD/MTD/WTD sums.
    pub fn from_to_date(name: impl Into<String>, dims: &DimensionColumns, rows: &[ToDateRow]) -> Self {
        let mut columns = dimension_column_defs(dims);
        columns.extend([
            ColumnDef::new(YTD_COLUMN, ColumnType::Real),
            ColumnDef::new(MTD_COLUMN, ColumnType::Real),
            ColumnDef::new(WTD_COLUMN, ColumnType::Real),
        ]);

        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::Integer(row.dimension.dimension_key),
                    Cell::from(row.dimension.code.as_str()),
                    Cell::from(row.dimension.description.as_str()),
                    Cell::Real(row.ytd),
                    Cell::Real(row.mtd),
                    Cell::Real(row.wtd),
                ]
            })
            .collect();

        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Periodic view: dimension columns, period label, summed measure.
    pub fn from_periodic(name: impl Into<String>, dims: &DimensionColumns, rows: &[PeriodRow]) -> Self {
        let mut columns = dimension_column_defs(dims);
        columns.extend([
            ColumnDef::new(PERIOD_COLUMN, ColumnType::Text),
            ColumnDef::new(PERIOD_TOTAL_COLUMN, ColumnType::Real),
        ]);

        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::Integer(row.dimension.dimension_key),
                    Cell::from(row.dimension.code.as_str()),
                    Cell::from(row.dimension.description.as_str()),
                    Cell::from(row.period.as_str()),
                    Cell::Real(row.total),
                ]
            })
            .collect();

        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn to_table_data(&self) -> TableData {
        TableData {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.clone(),
        }
    }

    /// Log column names then every row, the way a run reports its views.
    pub fn log_rows(&self) {
        log::info!("{} data:", self.name);
        log::info!("Column names: {:?}", self.column_names());
        for row in &self.rows {
            let values: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            log::info!("({})", values.join(", "));
        }
    }
}

fn dimension_column_defs(dims: &DimensionColumns) -> Vec<ColumnDef> {
    vec![
        ColumnDef::new(dims.key.as_str(), ColumnType::Integer),
        ColumnDef::new(dims.code.as_str(), ColumnType::Text),
        ColumnDef::new(dims.description.as_str(), ColumnType::Text),
    ]
}

/// Named result sets of one run, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCatalog {
    sets: BTreeMap<String, ResultSet>,
}

impl ResultCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result set, replacing any previous set with the same name.
    pub fn insert(&mut self, set: ResultSet) {
        self.sets.insert(set.name.clone(), set);
    }

    pub fn get(&self, name: &str) -> Option<&ResultSet> {
        self.sets.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sets.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Emit the whole catalog through `sink`.
    pub fn emit(&self, sink: &mut dyn ResultSinkBackend) -> Result<(), MaterializeError> {
        let sets: Vec<&ResultSet> = self.iter().collect();
        sink.write_all(&sets)?;
        log::info!("✅ Materialized {} result sets ({})", sets.len(), sink.backend_type());
        Ok(())
    }
}

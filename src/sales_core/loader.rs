//! Tabular (CSV) source loading with full-replace semantics

use crate::store::{Cell, ColumnDef, ColumnType, RelationalStore, StoreError, TableData};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum LoadError {
    SourceNotFound { path: PathBuf, source: std::io::Error },
    SchemaMismatch { source: String, detail: String },
    Csv { source: String, error: csv::Error },
    Store(StoreError),
}

impl From<StoreError> for LoadError {
    fn from(err: StoreError) -> Self {
        LoadError::Store(err)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::SourceNotFound { path, source } => {
                write!(f, "Source not found: {} ({})", path.display(), source)
            }
            LoadError::SchemaMismatch { source, detail } => {
                write!(f, "Schema mismatch in {}: {}", source, detail)
            }
            LoadError::Csv { source, error } => write!(f, "CSV error in {}: {}", source, error),
            LoadError::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::SourceNotFound { source, .. } => Some(source),
            LoadError::Csv { error, .. } => Some(error),
            LoadError::Store(e) => Some(e),
            LoadError::SchemaMismatch { .. } => None,
        }
    }
}

/// Parsed CSV source: header plus raw string records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularSource {
    pub name: String,
    pub header: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl TabularSource {
    /// Read a CSV file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let not_found = |source| LoadError::SourceNotFound {
            path: path.to_path_buf(),
            source,
        };

        // decoding happens in the CSV reader, so bad UTF-8 is a parse error
        let mut content = Vec::new();
        File::open(path)
            .and_then(|mut file| file.read_to_end(&mut content))
            .map_err(not_found)?;

        Self::from_reader(path.display().to_string(), content.as_slice())
    }

    /// Parse CSV from any reader. Every record must have the header's arity.
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self, LoadError> {
        let name = name.into();
        let csv_error = |error| LoadError::Csv {
            source: name.clone(),
            error,
        };

        // flexible(true) so arity problems surface as SchemaMismatch with a line number
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let header: Vec<String> = reader.headers().map_err(csv_error)?.iter().map(str::to_string).collect();
        if header.is_empty() || header.iter().all(|h| h.is_empty()) {
            return Err(LoadError::SchemaMismatch {
                source: name,
                detail: "missing header row".to_string(),
            });
        }

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result.map_err(csv_error)?;
            if record.len() != header.len() {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                return Err(LoadError::SchemaMismatch {
                    source: name,
                    detail: format!(
                        "line {} has {} fields, header has {}",
                        line,
                        record.len(),
                        header.len()
                    ),
                });
            }
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { name, header, records })
    }

    /// Column types inferred from the values (see [`infer_column_type`]).
    /// Columns named like [`TEXT_COLUMN_SUFFIXES`] are always `TEXT`.
    pub fn column_defs(&self) -> Vec<ColumnDef> {
        self.header
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let column_type = if is_text_column(name) {
                    ColumnType::Text
                } else {
                    infer_column_type(self.records.iter().map(|r| r[idx].as_str()))
                };
                ColumnDef::new(name.clone(), column_type)
            })
            .collect()
    }

    /// Typed table contents destined for `table`.
    pub fn to_table_data(&self, table: &str) -> TableData {
        let columns = self.column_defs();
        let rows = self
            .records
            .iter()
            .map(|record| {
                record
                    .iter()
                    .zip(&columns)
                    .map(|(value, column)| typed_cell(value, column.column_type))
                    .collect()
            })
            .collect();

        TableData {
            name: table.to_string(),
            columns,
            rows,
        }
    }
}

/// Dimension code and description columns keep their source text verbatim
/// ("1.10" must not come back as "1.1", nor "1e3" as "1000").
pub const TEXT_COLUMN_SUFFIXES: [&str; 2] = ["_CODE", "_DESCRIPTION"];

fn is_text_column(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    TEXT_COLUMN_SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

/// "001", "-07": zero-padded codes, never numbers. "0" and "0.5" are fine.
fn has_leading_zero(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value).as_bytes();
    digits.len() > 1 && digits[0] == b'0' && digits[1].is_ascii_digit()
}

fn is_integer_literal(value: &str) -> bool {
    !has_leading_zero(value) && value.parse::<i64>().is_ok()
}

fn is_real_literal(value: &str) -> bool {
    !has_leading_zero(value) && value.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// `INTEGER` if every non-empty value is a plain integer literal, `REAL` if
/// every non-empty value is numeric, `TEXT` otherwise (or when all values
/// are empty). Zero-padded values count as text for both numeric types.
pub fn infer_column_type<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut seen = false;
    let mut integer = true;
    let mut real = true;

    for value in values.filter(|v| !v.is_empty()) {
        seen = true;
        if integer && !is_integer_literal(value) {
            integer = false;
        }
        if real && !is_real_literal(value) {
            real = false;
        }
        if !integer && !real {
            break;
        }
    }

    match (seen, integer, real) {
        (false, _, _) => ColumnType::Text,
        (true, true, _) => ColumnType::Integer,
        (true, false, true) => ColumnType::Real,
        (true, false, false) => ColumnType::Text,
    }
}

fn typed_cell(value: &str, column_type: ColumnType) -> Cell {
    if value.is_empty() {
        return Cell::Null;
    }
    match column_type {
        ColumnType::Integer => value.parse().map(Cell::Integer).unwrap_or_else(|_| Cell::from(value)),
        ColumnType::Real => value.parse().map(Cell::Real).unwrap_or_else(|_| Cell::from(value)),
        ColumnType::Text => Cell::from(value),
    }
}

/// Loads tabular sources into named tables, replacing prior contents.
pub struct TabularLoader<'a, S: RelationalStore> {
    store: &'a mut S,
}

impl<'a, S: RelationalStore> TabularLoader<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Replace `table` with the contents of the CSV at `path`.
    /// Returns the number of rows loaded.
    pub fn load_path(&mut self, path: impl AsRef<Path>, table: &str) -> Result<usize, LoadError> {
        let source = TabularSource::from_path(path)?;
        self.load(&source, table)
    }

    pub fn load(&mut self, source: &TabularSource, table: &str) -> Result<usize, LoadError> {
        let data = source.to_table_data(table);
        self.store.replace_table(&data)?;

        log::info!("Loaded {} into {} ({} rows)", source.name, table, data.rows.len());
        Ok(data.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Select, SqliteStore};
    use tempfile::tempdir;

    const STORES: &str = "STORE_KEY,STORE_CODE,STORE_DESCRIPTION\n1,001,Store 1\n2,002,Store 2\n3,003,Store 3\n";

    #[test]
    fn test_parse_source() {
        let source = TabularSource::from_reader("stores.csv", STORES.as_bytes()).unwrap();
        assert_eq!(source.header, vec!["STORE_KEY", "STORE_CODE", "STORE_DESCRIPTION"]);
        assert_eq!(source.records.len(), 3);
        assert_eq!(source.records[2], vec!["3", "003", "Store 3"]);
    }

    #[test]
    fn test_type_inference() {
        let source = TabularSource::from_reader(
            "mixed.csv",
            "A_KEY,A_CODE,A_VAL,A_NOTE,A_EMPTY\n1,001,100,x,\n2,010,12.5,,\n".as_bytes(),
        )
        .unwrap();
        let types: Vec<ColumnType> = source.column_defs().into_iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Integer,
                ColumnType::Text,
                ColumnType::Real,
                ColumnType::Text,
                ColumnType::Text
            ]
        );

        assert_eq!(infer_column_type(["0", "-5", "42"].into_iter()), ColumnType::Integer);
        assert_eq!(infer_column_type(["2023-01-01"].into_iter()), ColumnType::Text);
        assert_eq!(infer_column_type(["0.5", "1"].into_iter()), ColumnType::Real);
        assert_eq!(infer_column_type(["1", "007"].into_iter()), ColumnType::Text);
        assert_eq!(infer_column_type(["nan"].into_iter()), ColumnType::Text);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = TabularSource::from_reader("bad.csv", "A,B\n1,2\n3\n".as_bytes()).unwrap_err();
        match err {
            LoadError::SchemaMismatch { source, detail } => {
                assert_eq!(source, "bad.csv");
                assert!(detail.contains("line 3"), "{}", detail);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_source() {
        let dir = tempdir().unwrap();
        let err = TabularSource::from_path(dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, LoadError::SourceNotFound { .. }));
    }

    #[test]
    fn test_load_keeps_codes_as_text() {
        let mut store = SqliteStore::in_memory().unwrap();
        let source = TabularSource::from_reader("stores.csv", STORES.as_bytes()).unwrap();

        let count = TabularLoader::new(&mut store).load(&source, "stores_table").unwrap();
        assert_eq!(count, 3);

        let table = store.query(&Select::all("stores_table").order_by(["STORE_KEY"])).unwrap();
        assert_eq!(table.rows[0], vec![Cell::Integer(1), Cell::from("001"), Cell::from("Store 1")]);
    }

    #[test]
    fn test_numeric_looking_codes_stay_verbatim() {
        let source = TabularSource::from_reader(
            "stores.csv",
            "STORE_KEY,store_code,STORE_DESCRIPTION\n1,1.10,2.50\n2,1e3,7.0\n".as_bytes(),
        )
        .unwrap();
        let types: Vec<ColumnType> = source.column_defs().into_iter().map(|c| c.column_type).collect();
        assert_eq!(types, vec![ColumnType::Integer, ColumnType::Text, ColumnType::Text]);

        let mut store = SqliteStore::in_memory().unwrap();
        TabularLoader::new(&mut store).load(&source, "stores_table").unwrap();
        let table = store.query(&Select::all("stores_table").order_by(["STORE_KEY"])).unwrap();
        assert_eq!(table.rows[0][1], Cell::from("1.10"));
        assert_eq!(table.rows[0][2], Cell::from("2.50"));
        assert_eq!(table.rows[1][1], Cell::from("1e3"));
        assert_eq!(table.rows[1][2], Cell::from("7.0"));
    }

    #[test]
    fn test_invalid_utf8_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stores.csv");
        std::fs::write(&path, b"STORE_KEY,STORE_CODE,STORE_DESCRIPTION\n1,001,Caf\xe9\n").unwrap();

        let err = TabularSource::from_path(&path).unwrap_err();
        assert!(matches!(err, LoadError::Csv { .. }), "{}", err);
    }

    #[test]
    fn test_load_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fsl.csv");
        let mut store = SqliteStore::in_memory().unwrap();

        std::fs::write(&path, "STORE_KEY,DATE_KEY,SALE_NET_VAL\n1,1,100\n1,2,150\n1,3,200\n").unwrap();
        assert_eq!(TabularLoader::new(&mut store).load_path(&path, "fsl_table").unwrap(), 3);

        std::fs::write(&path, "STORE_KEY,DATE_KEY,SALE_NET_VAL\n2,1,300\n").unwrap();
        assert_eq!(TabularLoader::new(&mut store).load_path(&path, "fsl_table").unwrap(), 1);

        let table = store.query(&Select::all("fsl_table")).unwrap();
        assert_eq!(table.rows, vec![vec![Cell::Integer(2), Cell::Integer(1), Cell::Integer(300)]]);
    }

    #[test]
    fn test_load_is_idempotent() {
        let mut store = SqliteStore::in_memory().unwrap();
        let source = TabularSource::from_reader("stores.csv", STORES.as_bytes()).unwrap();

        TabularLoader::new(&mut store).load(&source, "stores_table").unwrap();
        let first = store.query(&Select::all("stores_table")).unwrap();
        TabularLoader::new(&mut store).load(&source, "stores_table").unwrap();
        let second = store.query(&Select::all("stores_table")).unwrap();

        assert_eq!(first, second);
    }
}

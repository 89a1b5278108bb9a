//! Pipeline configuration from environment variables
//!
//! Each run receives an explicit config struct; nothing reads paths or the
//! reference date from globals.

use crate::sales_core::window::{parse_date, WeekStart};
use chrono::NaiveDate;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_REFERENCE_DATE: &str = "2023-02-14";

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the event flattening run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPipelineConfig {
    /// NDJSON event export
    pub source_path: PathBuf,

    /// Flat CSV output
    pub csv_path: PathBuf,

    /// SQLite database, recreated on every run
    pub db_path: PathBuf,
}

impl EventPipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `EVENTS_SOURCE_PATH` (default: source/events.ndjson)
    /// - `EVENTS_CSV_PATH` (default: target/events.csv)
    /// - `EVENTS_DB_PATH` (default: events.db)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            source_path: lookup("EVENTS_SOURCE_PATH")
                .unwrap_or_else(|| "source/events.ndjson".to_string())
                .into(),
            csv_path: lookup("EVENTS_CSV_PATH")
                .unwrap_or_else(|| "target/events.csv".to_string())
                .into(),
            db_path: lookup("EVENTS_DB_PATH")
                .unwrap_or_else(|| "events.db".to_string())
                .into(),
        }
    }
}

/// Configuration for the sales rollup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesPipelineConfig {
    pub date_source: PathBuf,
    pub dimension_source: PathBuf,
    pub fact_source: PathBuf,

    /// SQLite database, recreated on every run
    pub db_path: PathBuf,

    pub date_table: String,
    pub dimension_table: String,
    pub fact_table: String,

    /// Reference ("current") date all windows are relative to
    pub reference_date: NaiveDate,

    /// First day of the week-to-date window
    pub week_start: WeekStart,

    /// Result set names are `<prefix>_view`, `<prefix>_yearly`, ...
    pub view_prefix: String,

    /// When set, every result set is also written to `<dir>/<name>.csv`
    pub output_dir: Option<PathBuf>,
}

impl SalesPipelineConfig {
    /// Defaults with all sources under `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            date_source: base_dir.join("date.csv"),
            dimension_source: base_dir.join("stores.csv"),
            fact_source: base_dir.join("fsl.csv"),
            db_path: base_dir.join("sales.db"),
            date_table: "date_table".to_string(),
            dimension_table: "stores_table".to_string(),
            fact_table: "fsl_table".to_string(),
            reference_date: default_reference_date(),
            week_start: WeekStart::Monday,
            view_prefix: "store_sales".to_string(),
            output_dir: None,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SALES_DATE_CSV` (default: date.csv)
    /// - `SALES_DIMENSION_CSV` (default: stores.csv)
    /// - `SALES_FACT_CSV` (default: fsl.csv)
    /// - `SALES_DB_PATH` (default: sales.db)
    /// - `SALES_DATE_TABLE` / `SALES_DIMENSION_TABLE` / `SALES_FACT_TABLE`
    ///   (default: date_table / stores_table / fsl_table)
    /// - `SALES_REFERENCE_DATE` (default: 2023-02-14)
    /// - `SALES_WEEK_START` (default: monday)
    /// - `SALES_VIEW_PREFIX` (default: store_sales)
    /// - `SALES_OUTPUT_DIR` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::with_base_dir("");

        let reference_date = match lookup("SALES_REFERENCE_DATE") {
            Some(value) => parse_reference_date(&value)?,
            None => defaults.reference_date,
        };

        let week_start = match lookup("SALES_WEEK_START") {
            Some(value) => parse_week_start(&value)?,
            None => defaults.week_start,
        };

        let path_or = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);
        let string_or = |key: &str, default: String| lookup(key).unwrap_or(default);

        Ok(Self {
            date_source: path_or("SALES_DATE_CSV", defaults.date_source),
            dimension_source: path_or("SALES_DIMENSION_CSV", defaults.dimension_source),
            fact_source: path_or("SALES_FACT_CSV", defaults.fact_source),
            db_path: path_or("SALES_DB_PATH", defaults.db_path),
            date_table: string_or("SALES_DATE_TABLE", defaults.date_table),
            dimension_table: string_or("SALES_DIMENSION_TABLE", defaults.dimension_table),
            fact_table: string_or("SALES_FACT_TABLE", defaults.fact_table),
            reference_date,
            week_start,
            view_prefix: string_or("SALES_VIEW_PREFIX", defaults.view_prefix),
            output_dir: lookup("SALES_OUTPUT_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Apply `--reference-date <YYYY-MM-DD>` and `--week-start <day>` from
    /// the command line.
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(value) = flag_value(args, "--reference-date")? {
            self.reference_date = parse_reference_date(value)?;
        }
        if let Some(value) = flag_value(args, "--week-start")? {
            self.week_start = parse_week_start(value)?;
        }
        if let Some(value) = flag_value(args, "--output-dir")? {
            self.output_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }

    pub fn to_date_view_name(&self) -> String {
        format!("{}_view", self.view_prefix)
    }

    pub fn periodic_view_name(&self, period: &str) -> String {
        format!("{}_{}", self.view_prefix, period)
    }
}

fn default_reference_date() -> NaiveDate {
    // constant literal, parse cannot fail
    parse_date(DEFAULT_REFERENCE_DATE).unwrap_or(NaiveDate::MIN)
}

fn parse_reference_date(value: &str) -> Result<NaiveDate, ConfigError> {
    parse_date(value).map_err(|e| ConfigError::InvalidValue(format!("reference date: {}", e)))
}

fn parse_week_start(value: &str) -> Result<WeekStart, ConfigError> {
    WeekStart::from_str(value).ok_or_else(|| {
        ConfigError::InvalidValue(format!(
            "week start must be monday or sunday, got '{}'",
            value
        ))
    })
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>, ConfigError> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(idx) => args
            .get(idx + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| ConfigError::MissingVariable(format!("value for {}", flag))),
    }
}

//! Sales Rollup Binary - to-date and periodic sales views
//!
//! Loads the date dimension, dimension table and fact table from CSV, then
//! materializes YTD/MTD/WTD sums plus yearly, monthly and weekly totals
//! relative to a reference date.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin sales_rollup -- --reference-date 2023-02-14 --week-start monday
//! ```
//!
//! ## Environment Variables
//!
//! - SALES_DATE_CSV - Date dimension source (default: date.csv)
//! - SALES_DIMENSION_CSV - Dimension source (default: stores.csv)
//! - SALES_FACT_CSV - Fact source (default: fsl.csv)
//! - SALES_DB_PATH - SQLite database, recreated each run (default: sales.db)
//! - SALES_REFERENCE_DATE - Reference date, YYYY-MM-DD (default: 2023-02-14)
//! - SALES_WEEK_START - monday | sunday (default: monday)
//! - SALES_DATE_TABLE / SALES_DIMENSION_TABLE / SALES_FACT_TABLE - Table names
//! - SALES_VIEW_PREFIX - Result set name prefix (default: store_sales)
//! - SALES_OUTPUT_DIR - Also write every result set as CSV here (optional)
//! - RUST_LOG - Logging level (optional, default: info)
//!
//! `--reference-date`, `--week-start` and `--output-dir` override the
//! environment.

use salesflow::{run_sales_pipeline, SalesPipelineConfig};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let mut config = SalesPipelineConfig::from_env()?;
    config.apply_args(&args)?;

    log::info!("🚀 Starting Sales Rollup");
    log::info!("   Date source: {}", config.date_source.display());
    log::info!("   Dimension source: {}", config.dimension_source.display());
    log::info!("   Fact source: {}", config.fact_source.display());
    log::info!("   Database: {}", config.db_path.display());
    log::info!("   Reference date: {}", config.reference_date);
    log::info!("   Week start: {}", config.week_start.as_str());
    if let Some(dir) = &config.output_dir {
        log::info!("   CSV output: {}", dir.display());
    }

    if let Err(e) = run_sales_pipeline(&config) {
        log::error!("❌ Sales rollup failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}

//! Event Flattener Binary - nested analytics events to a flat CSV
//!
//! Reads an NDJSON event export, flattens each event onto the fixed column
//! set, stores the rows in `events_table` and exports them as CSV.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin event_flattener
//! ```
//!
//! ## Environment Variables
//!
//! - EVENTS_SOURCE_PATH - NDJSON event export (default: source/events.ndjson)
//! - EVENTS_CSV_PATH - CSV output (default: target/events.csv)
//! - EVENTS_DB_PATH - SQLite database, recreated each run (default: events.db)
//! - RUST_LOG - Logging level (optional, default: info)

use salesflow::{run_event_pipeline, EventPipelineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = EventPipelineConfig::from_env();

    log::info!("🚀 Starting Event Flattener");
    log::info!("   Source: {}", config.source_path.display());
    log::info!("   CSV output: {}", config.csv_path.display());
    log::info!("   Database: {}", config.db_path.display());

    if let Err(e) = run_event_pipeline(&config) {
        log::error!("❌ Event flattening failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}

//! End-to-end pipeline runs
//!
//! Each run takes an explicit config, starts from a freshly recreated store
//! and either completes every stage or returns the first error. Outputs
//! (CSV files, result tables) are only emitted after every upstream stage
//! has succeeded.

use crate::config::{EventPipelineConfig, SalesPipelineConfig};
use crate::error::PipelineError;
use crate::event_core::{flatten_all, parse_ndjson, EventTableWriter, FlatEventRow, EVENTS_TABLE};
use crate::materializer::{write_csv, CsvDirectoryWriter, ResultCatalog, ResultSet, StoreResultWriter};
use crate::sales_core::{
    PeriodKind, SalesAggregator, SalesTableReader, TabularLoader, TabularSource, WindowClassifier,
};
use crate::store::{RelationalStore, SqliteStore};
use std::time::Instant;

/// Flatten the NDJSON export into `events_table` and write it out as CSV.
///
/// Returns the exported result set (header order plus rows in source order).
pub fn run_event_pipeline(config: &EventPipelineConfig) -> Result<ResultSet, PipelineError> {
    let started = Instant::now();

    // raw bytes: undecodable lines are reported per line by the parser
    let content = std::fs::read(&config.source_path).map_err(|source| {
        PipelineError::SourceNotFound {
            path: config.source_path.clone(),
            source,
        }
    })?;

    // parse everything up front: a malformed line aborts before any output
    let records = parse_ndjson(&content)?;
    log::info!("📥 Parsed {} events from {}", records.len(), config.source_path.display());

    let rows = flatten_all(&records);

    let mut store = SqliteStore::recreate(&config.db_path)?;
    log::info!("Table {} created successfully", EVENTS_TABLE);

    let table = {
        let mut writer = EventTableWriter::new(&mut store)?;
        writer.write_all(&rows)?;
        writer.read_all()?
    };

    let events = ResultSet::from_table(EVENTS_TABLE, FlatEventRow::columns(), table);
    write_csv(&events, &config.csv_path)?;

    log::info!(
        "✅ Process completed successfully ({} rows in {:.2?})",
        events.len(),
        started.elapsed()
    );
    Ok(events)
}

/// Load the three sales sources, compute to-date and periodic rollups
/// relative to the configured reference date and materialize them.
///
/// Result sets are stored as tables in the run's database and, when
/// `output_dir` is set, written as CSV files. A failure in either output
/// leaves neither behind.
pub fn run_sales_pipeline(config: &SalesPipelineConfig) -> Result<ResultCatalog, PipelineError> {
    let started = Instant::now();

    // all sources must exist and parse before the store is touched
    let date_source = TabularSource::from_path(&config.date_source)?;
    let dimension_source = TabularSource::from_path(&config.dimension_source)?;
    let fact_source = TabularSource::from_path(&config.fact_source)?;

    let mut store = SqliteStore::recreate(&config.db_path)?;
    {
        let mut loader = TabularLoader::new(&mut store);
        loader.load(&date_source, &config.date_table)?;
        loader.load(&dimension_source, &config.dimension_table)?;
        loader.load(&fact_source, &config.fact_table)?;
    }

    let reader = SalesTableReader::new(&store);
    let dates = reader.read_dates(&config.date_table)?;
    let (dimension_columns, dimensions) = reader.read_dimensions(&config.dimension_table)?;
    let facts = reader.read_facts(&config.fact_table, &dimension_columns.key)?;

    let classifier = WindowClassifier::new(config.reference_date, config.week_start);
    log::info!(
        "Reference date {} (week starts {}, WTD from {})",
        classifier.reference(),
        classifier.week_start().as_str(),
        classifier.week_to_date_start()
    );

    let aggregator = SalesAggregator::new(classifier, &dates, &dimensions, &facts)?;

    let mut catalog = ResultCatalog::new();
    catalog.insert(ResultSet::from_to_date(
        config.to_date_view_name(),
        &dimension_columns,
        &aggregator.to_date(),
    ));
    for kind in PeriodKind::all() {
        catalog.insert(ResultSet::from_periodic(
            config.periodic_view_name(kind.as_str()),
            &dimension_columns,
            &aggregator.periodic(kind),
        ));
    }

    // CSV files are staged before the tables are written and committed after,
    // so either both outputs appear or neither does
    let staged = match &config.output_dir {
        Some(dir) => Some(CsvDirectoryWriter::new(dir).stage(&catalog.iter().collect::<Vec<_>>())?),
        None => None,
    };
    catalog.emit(&mut StoreResultWriter::new(&mut store))?;

    if let Some(staged) = staged {
        if let Err(e) = staged.commit() {
            if let Err(drop_err) = store.drop_tables(&catalog.names()) {
                log::error!("❌ Could not drop result tables after CSV failure: {}", drop_err);
            }
            return Err(e.into());
        }
    }

    if let Some(view) = catalog.get(&config.to_date_view_name()) {
        view.log_rows();
    }

    log::info!(
        "✅ Process completed successfully ({} result sets in {:.2?})",
        catalog.len(),
        started.elapsed()
    );
    Ok(catalog)
}

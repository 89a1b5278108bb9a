//! `events_table` writer/reader on top of a [`RelationalStore`]

use super::flattener::FlatEventRow;
use crate::store::{Cell, RelationalStore, Select, StoreError, Table};

pub const EVENTS_TABLE: &str = "events_table";

/// Writes flattened events to `events_table` and reads them back in
/// insertion order.
pub struct EventTableWriter<'a, S: RelationalStore> {
    store: &'a mut S,
    table: String,
}

impl<'a, S: RelationalStore> EventTableWriter<'a, S> {
    /// Create the table (if missing) and return a writer bound to it.
    pub fn new(store: &'a mut S) -> Result<Self, StoreError> {
        Self::with_table(store, EVENTS_TABLE)
    }

    pub fn with_table(store: &'a mut S, table: &str) -> Result<Self, StoreError> {
        store.create_table(table, &FlatEventRow::columns())?;
        Ok(Self {
            store,
            table: table.to_string(),
        })
    }

    /// Insert every row in one transaction.
    pub fn write_all(&mut self, rows: &[FlatEventRow]) -> Result<usize, StoreError> {
        let cells: Vec<Vec<Cell>> = rows.iter().map(FlatEventRow::to_cells).collect();
        self.store.insert_rows(&self.table, &cells)?;

        for row in rows {
            log::debug!(
                "Inserted event: {} at {}",
                row.event_name.as_deref().unwrap_or("<none>"),
                row.event_timestamp.as_deref().unwrap_or("<none>")
            );
        }
        log::info!("✅ Inserted {} events into {} ({})", rows.len(), self.table, self.store.backend_type());
        Ok(rows.len())
    }

    /// Every stored event, columns in declared order, rows in insertion order.
    pub fn read_all(&self) -> Result<Table, StoreError> {
        // rowid keeps insertion order explicit rather than relying on scan order
        let select = Select::all(self.table.as_str())
            .columns(FlatEventRow::column_names())
            .order_by(["rowid"]);
        self.store.query(&select)
    }
}

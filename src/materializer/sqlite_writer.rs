//! Store backend for result sets - each set becomes a table named after it

use super::writer_backend::{MaterializeError, ResultSinkBackend};
use super::ResultSet;
use crate::store::{RelationalStore, TableData};

/// Replaces one table per result set in a single store transaction, so the
/// sets are queryable by name (`SELECT * FROM store_sales_view`).
pub struct StoreResultWriter<'a, S: RelationalStore> {
    store: &'a mut S,
}

impl<'a, S: RelationalStore> StoreResultWriter<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }
}

impl<'a, S: RelationalStore> ResultSinkBackend for StoreResultWriter<'a, S> {
    fn write_all(&mut self, sets: &[&ResultSet]) -> Result<(), MaterializeError> {
        let tables: Vec<TableData> = sets.iter().map(|set| set.to_table_data()).collect();
        self.store.replace_tables(&tables)?;

        log::debug!("✅ Result sets stored: {}", sets.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", "));
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        self.store.backend_type()
    }
}

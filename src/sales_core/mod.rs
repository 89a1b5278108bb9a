//! Sales Core - dimensional loads and calendar-window rollups
//!
//! # Architecture
//!
//! ```text
//! CSV sources → TabularLoader → date_table / stores_table / fsl_table
//!     ↓
//! SalesTableReader (typed DateDimensionRow / DimensionRow / FactRow)
//!     ↓
//! SalesAggregator (join + WindowClassifier)
//!     ↓
//! to-date view (YTD/MTD/WTD) + yearly / monthly / weekly views
//! ```

pub mod aggregator;
pub mod loader;
pub mod sqlite_reader;
pub mod window;

pub use aggregator::{JoinKeyError, JoinedFact, MissingKey, PeriodRow, SalesAggregator, ToDateRow};
pub use loader::{LoadError, TabularLoader, TabularSource};
pub use sqlite_reader::{
    DateDimensionRow, DimensionColumns, DimensionRow, FactRow, ReaderError, SalesTableReader,
};
pub use window::{
    parse_date, InvalidDateError, PeriodKind, WeekStart, WindowBucket, WindowClassifier,
};

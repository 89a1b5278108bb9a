//! Event Core - nested analytics events to flat rows
//!
//! # Architecture
//!
//! ```text
//! NDJSON source → normalizer (NestedEventRecord)
//!     ↓
//! flattener (FlatEventRow, fixed projection)
//!     ↓
//! EventTableWriter → events_table
//!     ↓
//! query-all → materializer → CSV
//! ```

pub mod flattener;
pub mod normalizer;
pub mod sqlite_writer;

pub use flattener::{flatten_all, FlatEventRow, PROJECTED_PARAMS, SCALAR_COLUMNS};
pub use normalizer::{parse_ndjson, EventParam, MalformedRecordError, NestedEventRecord, ParamValue, TaggedValue};
pub use sqlite_writer::{EventTableWriter, EVENTS_TABLE};

//! SalesFlow - analytics event flattening and calendar-window sales rollups
//!
//! Two batch pipelines share one relational store and one output layer:
//!
//! ```text
//! (A) NDJSON events → event_core → events_table → CSV
//! (B) date / dimension / fact CSVs → sales_core → YTD/MTD/WTD + periodic views
//! ```
//!
//! Both runs are driven from [`runner`] with an explicit config from
//! [`config`].

pub mod config;
pub mod error;
pub mod event_core;
pub mod materializer;
pub mod runner;
pub mod sales_core;
pub mod sqlite_pragma;
pub mod store;

pub use config::{ConfigError, EventPipelineConfig, SalesPipelineConfig};
pub use error::PipelineError;
pub use runner::{run_event_pipeline, run_sales_pipeline};

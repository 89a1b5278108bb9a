//! Sink trait for materialized result sets

use super::ResultSet;
use crate::store::StoreError;

#[derive(Debug)]
pub enum MaterializeError {
    Io(std::io::Error),
    Csv(csv::Error),
    Store(StoreError),
}

impl From<std::io::Error> for MaterializeError {
    fn from(err: std::io::Error) -> Self {
        MaterializeError::Io(err)
    }
}

impl From<csv::Error> for MaterializeError {
    fn from(err: csv::Error) -> Self {
        MaterializeError::Csv(err)
    }
}

impl From<StoreError> for MaterializeError {
    fn from(err: StoreError) -> Self {
        MaterializeError::Store(err)
    }
}

impl std::fmt::Display for MaterializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterializeError::Io(e) => write!(f, "IO error: {}", e),
            MaterializeError::Csv(e) => write!(f, "CSV error: {}", e),
            MaterializeError::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for MaterializeError {}

/// Backend that receives a complete batch of result sets.
///
/// A backend either emits every set of the batch or none of them.
pub trait ResultSinkBackend {
    fn write_all(&mut self, sets: &[&ResultSet]) -> Result<(), MaterializeError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

//! Run-level error wrapping every stage's error type

use crate::event_core::MalformedRecordError;
use crate::materializer::MaterializeError;
use crate::sales_core::{JoinKeyError, LoadError, ReaderError};
use crate::store::StoreError;
use std::fmt;
use std::path::PathBuf;

/// Any failure that aborts a pipeline run. Nothing is emitted after one.
#[derive(Debug)]
pub enum PipelineError {
    SourceNotFound { path: PathBuf, source: std::io::Error },
    MalformedRecord(MalformedRecordError),
    Load(LoadError),
    Reader(ReaderError),
    JoinKey(JoinKeyError),
    Materialize(MaterializeError),
    Store(StoreError),
}

impl From<MalformedRecordError> for PipelineError {
    fn from(err: MalformedRecordError) -> Self {
        PipelineError::MalformedRecord(err)
    }
}

impl From<LoadError> for PipelineError {
    fn from(err: LoadError) -> Self {
        PipelineError::Load(err)
    }
}

impl From<ReaderError> for PipelineError {
    fn from(err: ReaderError) -> Self {
        PipelineError::Reader(err)
    }
}

impl From<JoinKeyError> for PipelineError {
    fn from(err: JoinKeyError) -> Self {
        PipelineError::JoinKey(err)
    }
}

impl From<MaterializeError> for PipelineError {
    fn from(err: MaterializeError) -> Self {
        PipelineError::Materialize(err)
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Store(err)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::SourceNotFound { path, source } => {
                write!(f, "Source not found: {} ({})", path.display(), source)
            }
            PipelineError::MalformedRecord(e) => write!(f, "{}", e),
            PipelineError::Load(e) => write!(f, "Load failed: {}", e),
            PipelineError::Reader(e) => write!(f, "Read failed: {}", e),
            PipelineError::JoinKey(e) => write!(f, "{}", e),
            PipelineError::Materialize(e) => write!(f, "Materialization failed: {}", e),
            PipelineError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::SourceNotFound { source, .. } => Some(source),
            PipelineError::MalformedRecord(e) => Some(e),
            PipelineError::Load(e) => Some(e),
            PipelineError::Reader(e) => Some(e),
            PipelineError::JoinKey(e) => Some(e),
            PipelineError::Materialize(e) => Some(e),
            PipelineError::Store(e) => Some(e),
        }
    }
}

impl PipelineError {
    /// True for the source-not-found case, whichever stage raised it.
    pub fn is_source_not_found(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceNotFound { .. }
                | PipelineError::Load(LoadError::SourceNotFound { .. })
        )
    }
}

use crate::chunk::ChunkAction;
use chunk_types::{ChunkView, Delta, FieldName, InstanceName};
use thiserror::Error;
use widget_dom::DomError;

/// Chunks field error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunksError {
    #[error("Field not mounted: {0}")]
    FieldNotMounted(FieldName),

    #[error("Chunk not found: {field}[{delta}]")]
    ChunkNotFound { field: FieldName, delta: Delta },

    #[error("Chunk {delta} cannot {action} while in {from} view")]
    InvalidTransition {
        delta: Delta,
        from: ChunkView,
        action: ChunkAction,
    },

    #[error("Unknown instance: {0}")]
    UnknownInstance(InstanceName),

    #[error("Row not found: {field}[{delta}]")]
    RowNotFound { field: FieldName, delta: Delta },
}

impl From<DomError> for ChunksError {
    fn from(err: DomError) -> Self {
        match err {
            DomError::ContainerNotFound(field) => ChunksError::FieldNotMounted(field),
            DomError::RowNotFound { field, delta } => ChunksError::RowNotFound { field, delta },
        }
    }
}

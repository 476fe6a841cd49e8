use chunk_types::{FieldName, NodeId};
use services_chunks_field::ChunksError;
use thiserror::Error;
use widget_dom::DomError;

/// Widget error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WidgetError {
    #[error("Unknown field: {0}")]
    UnknownField(FieldName),

    #[error("No handler bound for {field} on {node}")]
    UnboundTarget { field: FieldName, node: NodeId },

    #[error(transparent)]
    Chunks(#[from] ChunksError),

    #[error(transparent)]
    Dom(#[from] DomError),
}

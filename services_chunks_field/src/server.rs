//! Server round-trip boundary
//!
//! Requests carry the submitted form state of one field. Responses carry
//! freshly rendered field containers plus out-of-band signals. What the
//! server does in between is opaque to the widget.

use chunk_types::{ChunkView, Delta, FieldName, InstanceName, LangCode, RequestId, RowKey};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use widget_dom::{Control, FieldContainer};

/// Operation the server is asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerOperation {
    /// Commit and stage a new chunk, requested from "add before"
    AddBefore,
    /// Commit and stage a new chunk, requested from a chunk's "add after"
    AddAfter(Delta),
    /// Render a chunk's preview
    PreviewRender(Delta),
}

impl ServerOperation {
    pub fn is_add(&self) -> bool {
        matches!(self, ServerOperation::AddBefore | ServerOperation::AddAfter(_))
    }
}

impl fmt::Display for ServerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerOperation::AddBefore => write!(f, "add-before"),
            ServerOperation::AddAfter(delta) => write!(f, "add-after {}", delta),
            ServerOperation::PreviewRender(delta) => write!(f, "preview {}", delta),
        }
    }
}

/// Submitted values of one chunk row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFormState {
    /// Hidden row key, echoed back by every render
    pub key: RowKey,
    pub delta: Delta,
    /// Hidden `view` value
    pub view: ChunkView,
    pub instance: Option<InstanceName>,
    pub module: Option<String>,
    pub weight: i64,
    pub controls: Vec<Control>,
}

/// Submitted values of one field, rows in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFormState {
    pub rows: Vec<RowFormState>,
}

impl FieldFormState {
    /// Captures what a form submit would send for `container`
    pub fn capture(container: &FieldContainer) -> Self {
        let rows = container
            .rows
            .iter()
            .map(|row| RowFormState {
                key: row.key,
                delta: row.delta,
                view: row.view,
                instance: row.instance.clone(),
                module: row.module.clone(),
                weight: row.weight,
                controls: row.controls.clone(),
            })
            .collect();
        Self { rows }
    }

    pub fn row(&self, delta: Delta) -> Option<&RowFormState> {
        self.rows.iter().find(|r| r.delta == delta)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRequest {
    pub id: RequestId,
    pub field: FieldName,
    pub langcode: LangCode,
    pub operation: ServerOperation,
    pub form: FieldFormState,
}

/// Out-of-band notifications carried by a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// A server-rendered preview finished loading
    PreviewLoaded { field: FieldName, delta: Delta },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub request_id: RequestId,
    /// Replacement fragments
    pub containers: Vec<FieldContainer>,
    pub signals: Vec<Signal>,
}

impl ServerResponse {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            containers: Vec::new(),
            signals: Vec::new(),
        }
    }

    pub fn with_container(mut self, container: FieldContainer) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }
}

/// Requests issued but not yet handed to the transport
#[derive(Debug, Default)]
pub struct Outbox {
    next_id: u64,
    queued: VecDeque<ServerRequest>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a request and returns its id
    pub fn issue(
        &mut self,
        field: FieldName,
        langcode: LangCode,
        operation: ServerOperation,
        form: FieldFormState,
    ) -> RequestId {
        self.next_id += 1;
        let id = RequestId::new(self.next_id);
        self.queued.push_back(ServerRequest {
            id,
            field,
            langcode,
            operation,
            form,
        });
        id
    }

    /// Hands every issued request to the caller
    pub fn take(&mut self) -> Vec<ServerRequest> {
        self.queued.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

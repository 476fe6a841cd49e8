//! Widget audit trail
//!
//! Every state-relevant change is recorded with a logical timestamp so
//! tests and tooling can replay what happened and in which order.

use crate::staging::AddOrigin;
use crate::server::ServerOperation;
use chunk_types::{ChunkView, Delta, FieldName, RequestId, TicketId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetEvent {
    FieldAttached { field: FieldName },
    FieldUpdated { field: FieldName },
    FieldDetached { field: FieldName, handlers_unbound: usize },
    ChunkCreated { field: FieldName, delta: Delta, view: ChunkView },
    ChunkRebound { field: FieldName, delta: Delta },
    ChunkDropped { field: FieldName, delta: Delta },
    /// A render renumbered the chunk's row
    ChunkRenumbered { field: FieldName, from: Delta, to: Delta },
    /// A render from before a removal brought the row back; it stays removed
    RemovedRowSuppressed { field: FieldName, delta: Delta },
    ViewChanged {
        field: FieldName,
        delta: Delta,
        from: ChunkView,
        to: ChunkView,
    },
    ChunkActivated { field: FieldName, delta: Delta },
    ChunksDeactivated { field: FieldName },
    Claimed {
        field: FieldName,
        ticket: TicketId,
        origin: AddOrigin,
    },
    Redeemed {
        field: FieldName,
        ticket: TicketId,
        origin: AddOrigin,
        delta: Delta,
    },
    FollowUpRecorded { field: FieldName, origin: AddOrigin },
    FollowUpFired { field: FieldName, origin: AddOrigin },
    ActionQueued { field: FieldName, label: String },
    ActionDrained { field: FieldName, label: String },
    ActionDiscarded { field: FieldName, label: String },
    RequestDispatched {
        field: FieldName,
        request: RequestId,
        operation: ServerOperation,
    },
    ResponseSettled { field: FieldName, request: RequestId },
    ResponseDiscarded { request: RequestId },
    RequestTimedOut { field: FieldName, request: RequestId },
    ClientPreviewRendered { field: FieldName, delta: Delta },
    PreviewLoaded { field: FieldName, delta: Delta },
    StaleSignalDiscarded { field: FieldName, delta: Delta },
    ConfigSaved { field: FieldName, delta: Delta },
    ConfigRestored { field: FieldName, delta: Delta },
    ValidationErrors { field: FieldName, delta: Delta },
    RowPrepared { field: FieldName, delta: Delta },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: u64,
    pub event: WidgetEvent,
}

#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    next_timestamp: u64,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: WidgetEvent) {
        log::debug!("{:?}", event);
        let timestamp = self.next_timestamp;
        self.next_timestamp += 1;
        self.entries.push(AuditEntry { timestamp, event });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn events(&self) -> impl Iterator<Item = &WidgetEvent> {
        self.entries.iter().map(|e| &e.event)
    }

    pub fn last(&self) -> Option<&WidgetEvent> {
        self.entries.last().map(|e| &e.event)
    }

    /// Number of events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&WidgetEvent) -> bool) -> usize {
        self.events().filter(|e| predicate(e)).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

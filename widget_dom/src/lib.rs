//! # Widget DOM
//!
//! A headless model of the document the chunks widget operates on.
//!
//! ## Philosophy
//!
//! - **Fragments, not pages**: the server replaces whole field containers
//! - **Node identity**: every render mints new node ids, so replacement is observable
//! - **Deferred focus**: focus moves queued during a handler apply after render settles
//! - **Delegated events**: handlers are keyed by node, never by re-derived selectors
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - An HTML parser or layout engine
//! - A renderer; markup strings are stored, never interpreted

pub mod bindings;
pub mod container;
pub mod focus;
pub mod row;

pub use bindings::{EventBindings, Handler};
pub use container::{FieldContainer, RowAnchor};
pub use focus::{FocusEvent, FocusTracker};
pub use row::{ChunkRow, Control, RowButton};

use chunk_types::{ChunkTypeId, Delta, FieldName, FocusTarget};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

/// Document error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("Field container not mounted: {0}")]
    ContainerNotFound(FieldName),

    #[error("Row not found: {field}[{delta}]")]
    RowNotFound { field: FieldName, delta: Delta },
}

/// A focus move that applies once the current render settles
///
/// Requests are resolved against the document as it is at settle time,
/// not as it was when they were queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredFocus {
    /// A specific control
    Target(FocusTarget),
    /// First option of a chunk's instance selection
    FirstInstanceOption { field: FieldName, delta: Delta },
    /// First visible configuration control of a chunk type
    FirstVisibleControl {
        field: FieldName,
        delta: Delta,
        chunk_type: ChunkTypeId,
    },
    /// First configuration control carrying an error marker
    FirstErrorControl { field: FieldName, delta: Delta },
}

/// Result of mounting a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mounted {
    /// Container was not present before
    Inserted,
    /// Container replaced an earlier render
    Replaced(Box<FieldContainer>),
}

/// The document: mounted field containers plus focus and bindings
#[derive(Debug, Default)]
pub struct Document {
    containers: BTreeMap<FieldName, FieldContainer>,
    focus: FocusTracker,
    bindings: EventBindings,
    after_render: VecDeque<DeferredFocus>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a container, replacing any earlier render of the same field
    pub fn mount(&mut self, container: FieldContainer) -> Mounted {
        let name = container.field_name.clone();
        match self.containers.insert(name, container) {
            Some(old) => Mounted::Replaced(Box::new(old)),
            None => Mounted::Inserted,
        }
    }

    /// Removes a container from the document
    ///
    /// Focus inside the removed container is cleared.
    pub fn unmount(&mut self, field: &FieldName) -> Option<FieldContainer> {
        let removed = self.containers.remove(field)?;
        if self.focus.current().map(|t| t.field() == field).unwrap_or(false) {
            self.focus.clear();
        }
        Some(removed)
    }

    pub fn container(&self, field: &FieldName) -> Option<&FieldContainer> {
        self.containers.get(field)
    }

    pub fn container_mut(&mut self, field: &FieldName) -> Option<&mut FieldContainer> {
        self.containers.get_mut(field)
    }

    /// Fetches a container or reports it missing
    pub fn require(&self, field: &FieldName) -> Result<&FieldContainer, DomError> {
        self.containers
            .get(field)
            .ok_or_else(|| DomError::ContainerNotFound(field.clone()))
    }

    pub fn require_mut(&mut self, field: &FieldName) -> Result<&mut FieldContainer, DomError> {
        self.containers
            .get_mut(field)
            .ok_or_else(|| DomError::ContainerNotFound(field.clone()))
    }

    pub fn row_mut(&mut self, field: &FieldName, delta: Delta) -> Result<&mut ChunkRow, DomError> {
        self.require_mut(field)?
            .row_mut(delta)
            .ok_or_else(|| DomError::RowNotFound {
                field: field.clone(),
                delta,
            })
    }

    pub fn field_names(&self) -> Vec<FieldName> {
        self.containers.keys().cloned().collect()
    }

    pub fn bindings(&self) -> &EventBindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut EventBindings {
        &mut self.bindings
    }

    pub fn focused(&self) -> Option<&FocusTarget> {
        self.focus.current()
    }

    pub fn focus_tracker(&self) -> &FocusTracker {
        &self.focus
    }

    /// Queues a focus move for after the render settles
    pub fn defer_focus(&mut self, request: DeferredFocus) {
        self.after_render.push_back(request);
    }

    pub fn pending_focus_count(&self) -> usize {
        self.after_render.len()
    }

    /// Applies every deferred focus move in order
    ///
    /// The last request that resolves wins. Returns the focused control.
    pub fn settle(&mut self) -> Option<FocusTarget> {
        while let Some(request) = self.after_render.pop_front() {
            match self.resolve(&request) {
                Some(target) => self.focus.focus(target),
                None => {
                    log::debug!("deferred focus request unresolved: {:?}", request);
                    self.focus.record_unresolved(format!("{:?}", request));
                }
            }
        }
        self.focus.current().cloned()
    }

    /// Moves focus immediately if the target resolves
    pub fn focus_now(&mut self, target: FocusTarget) -> bool {
        match self.resolve(&DeferredFocus::Target(target)) {
            Some(resolved) => {
                self.focus.focus(resolved);
                true
            }
            None => false,
        }
    }

    /// Resolves a focus request against the live document
    pub fn resolve(&self, request: &DeferredFocus) -> Option<FocusTarget> {
        match request {
            DeferredFocus::Target(target) => self.is_focusable(target).then(|| target.clone()),
            DeferredFocus::FirstInstanceOption { field, delta } => {
                let row = self.visible_row(field, *delta)?;
                let instance = row.instance_options.first()?.clone();
                Some(FocusTarget::InstanceOption {
                    field: field.clone(),
                    delta: *delta,
                    instance,
                })
            }
            DeferredFocus::FirstVisibleControl {
                field,
                delta,
                chunk_type,
            } => {
                let row = self.visible_row(field, *delta)?;
                let control = row.first_visible_control(chunk_type)?;
                Some(FocusTarget::ConfigControl {
                    field: field.clone(),
                    delta: *delta,
                    chunk_type: control.chunk_type.clone(),
                    property: control.property.clone(),
                })
            }
            DeferredFocus::FirstErrorControl { field, delta } => {
                let row = self.visible_row(field, *delta)?;
                let control = row.first_error_control()?;
                Some(FocusTarget::ConfigControl {
                    field: field.clone(),
                    delta: *delta,
                    chunk_type: control.chunk_type.clone(),
                    property: control.property.clone(),
                })
            }
        }
    }

    fn visible_row(&self, field: &FieldName, delta: Delta) -> Option<&ChunkRow> {
        self.containers
            .get(field)?
            .row(delta)
            .filter(|row| row.visible)
    }

    fn is_focusable(&self, target: &FocusTarget) -> bool {
        let Some(container) = self.containers.get(target.field()) else {
            return false;
        };
        match target {
            FocusTarget::AddBefore { .. } => true,
            FocusTarget::AddAfter { delta, .. } | FocusTarget::Editor { delta, .. } => {
                container.row(*delta).map(|r| r.visible).unwrap_or(false)
            }
            FocusTarget::InstanceOption {
                delta, instance, ..
            } => container
                .row(*delta)
                .map(|r| r.visible && r.has_option(instance))
                .unwrap_or(false),
            FocusTarget::ConfigControl {
                delta,
                chunk_type,
                property,
                ..
            } => container
                .row(*delta)
                .filter(|r| r.visible)
                .and_then(|r| r.control(chunk_type, property))
                .map(|c| c.visible)
                .unwrap_or(false),
        }
    }
}

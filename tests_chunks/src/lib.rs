//! Chunks Widget Test Utilities
//!
//! Shared fixtures for the scenario tests: a fake server that re-renders
//! field containers from submitted form state, plus helpers to find nodes
//! and drive the widget.
//!
//! ## Test Philosophy
//!
//! - **Round trips are real**: every request is answered by a fresh render with new node ids
//! - **One step at a time**: tests choose when responses arrive
//! - **Observable outcomes**: assertions read the document, the audit log and focus

use chunk_types::{
    Activation, ChunkInstance, ChunkTypeId, ChunkView, Delta, FieldName, FieldSettings,
    InstanceName, KeyPress, LangCode, NodeId,
};
use services_chunks_field::{ServerOperation, ServerRequest, ServerResponse, Signal};
use services_field_registry::{ChunksWidget, DispatchOutcome, UiControl, UiEvent, WidgetError};
use std::collections::{BTreeMap, BTreeSet};
use widget_dom::{ChunkRow, Control, FieldContainer};

/// Instances every fixture field offers, in display order
pub fn default_settings() -> FieldSettings {
    FieldSettings::new()
        .unlimited()
        .with_instance(
            "text",
            ChunkInstance::new("text")
                .with_title("Text")
                .with_module("chunks")
                .previewed_on_client(),
        )
        .with_instance("heading", ChunkInstance::new("heading").with_title("Heading"))
        .with_instance(
            "p",
            ChunkInstance::new("p")
                .with_title("Paragraph")
                .previewed_on_client()
                .edited_in_place(),
        )
}

/// Configuration controls rendered for a chunk type
pub fn controls_for_type(chunk_type: &ChunkTypeId) -> Vec<Control> {
    let mut controls = vec![Control::new(chunk_type.clone(), "text", "")];
    if chunk_type.as_str() == "heading" {
        controls.push(Control::new(chunk_type.clone(), "level", "2"));
    }
    controls
}

/// Server side of the round trip
#[derive(Debug, Default)]
pub struct FakeServer {
    settings: BTreeMap<FieldName, FieldSettings>,
    /// Controls to flag with a validation error on the next render
    invalid: BTreeSet<(FieldName, Delta, ChunkTypeId, String)>,
    handled: Vec<ServerRequest>,
    /// Drop removed rows and renumber deltas in weight order on every render
    compacting: bool,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A server that renumbers deltas the way a form rebuild does
    pub fn compacting(mut self) -> Self {
        self.compacting = true;
        self
    }

    pub fn with_field(mut self, field: &str, settings: FieldSettings) -> Self {
        self.settings.insert(FieldName::new(field), settings);
        self
    }

    pub fn settings(&self, field: &FieldName) -> FieldSettings {
        self.settings.get(field).cloned().unwrap_or_else(default_settings)
    }

    /// Requests answered so far
    pub fn handled(&self) -> &[ServerRequest] {
        &self.handled
    }

    /// Flags a control with a validation error on the next render
    pub fn reject(&mut self, field: &str, delta: u32, chunk_type: &str, property: &str) {
        self.invalid.insert((
            FieldName::new(field),
            Delta::new(delta),
            ChunkTypeId::new(chunk_type),
            property.to_string(),
        ));
    }

    /// Renders one row with controls for every configured type
    pub fn row(
        &self,
        field: &FieldName,
        delta: u32,
        view: ChunkView,
        instance: Option<&str>,
        text: &str,
    ) -> ChunkRow {
        let settings = self.settings(field);
        let mut row = ChunkRow::new(Delta::new(delta), view)
            .with_options(settings.instances.keys().cloned().collect::<Vec<_>>());

        let chunk_type = instance
            .and_then(|name| settings.instance(&InstanceName::new(name)))
            .map(|i| i.chunk_type.clone());
        for ty in types(&settings) {
            for mut control in controls_for_type(&ty) {
                if Some(&ty) == chunk_type.as_ref() && control.property == "text" {
                    control.value = text.to_string();
                }
                row.controls.push(control);
            }
        }
        if let Some(name) = instance {
            row.instance = Some(InstanceName::new(name));
        }
        if view == ChunkView::Preview {
            row.preview_markup = server_preview(text);
        }
        row
    }

    /// Initial page render: `(instance, text)` chunks in preview, then a
    /// staged row if `staged`
    pub fn page(&self, field: &str, chunks: &[(&str, &str)], staged: bool) -> FieldContainer {
        let name = FieldName::new(field);
        let mut container = FieldContainer::new(name.clone(), LangCode::undefined(), self.settings(&name));
        for (i, (instance, text)) in chunks.iter().enumerate() {
            container = container.with_row(self.row(&name, i as u32, ChunkView::Preview, Some(instance), text));
        }
        if staged {
            container =
                container.with_row(self.row(&name, chunks.len() as u32, ChunkView::Staged, None, ""));
        }
        container
    }

    /// Re-renders the requesting field from its submitted form
    pub fn respond(&mut self, request: &ServerRequest) -> ServerResponse {
        log::debug!("fake server handling {} for {}", request.operation, request.field);
        log::trace!(
            "submitted form: {}",
            serde_json::to_string(&request.form).unwrap_or_default()
        );
        let field = &request.field;
        let settings = self.settings(field);
        let mut container = FieldContainer::new(field.clone(), request.langcode.clone(), settings.clone());

        let mut rows: Vec<_> = request
            .form
            .rows
            .iter()
            .filter(|r| !(self.compacting && r.view == ChunkView::Removed))
            .collect();
        rows.sort_by_key(|r| r.weight);
        let mut renumbered = BTreeMap::new();
        for (position, submitted) in rows.into_iter().enumerate() {
            let delta = if self.compacting {
                Delta::new(position as u32)
            } else {
                submitted.delta
            };
            renumbered.insert(submitted.delta, delta);
            let mut row = ChunkRow::new(delta, submitted.view)
                .with_options(settings.instances.keys().cloned().collect::<Vec<_>>())
                .ajax_loaded();
            row.key = submitted.key;
            row.instance = submitted.instance.clone();
            row.module = submitted.module.clone();
            row.controls = submitted
                .controls
                .iter()
                .cloned()
                .map(|mut c| {
                    c.error = self.invalid.remove(&(
                        field.clone(),
                        submitted.delta,
                        c.chunk_type.clone(),
                        c.property.clone(),
                    ));
                    c
                })
                .collect();
            if submitted.view == ChunkView::Preview {
                let text = submitted
                    .controls
                    .iter()
                    .find(|c| c.property == "text" && Some(&c.chunk_type) == chunk_type_of(&settings, &row))
                    .map(|c| c.value.as_str())
                    .unwrap_or("");
                row.preview_markup = server_preview(text);
            }
            container.rows.push(row);
        }

        if request.operation.is_add() && container.staged_count() == 0 {
            let next = container.rows.iter().map(|r| r.delta.get() + 1).max().unwrap_or(0);
            container
                .rows
                .push(self.row(field, next, ChunkView::Staged, None, "").ajax_loaded());
        }

        let mut response = ServerResponse::new(request.id).with_container(container);
        if let ServerOperation::PreviewRender(delta) = request.operation {
            response = response.with_signal(Signal::PreviewLoaded {
                field: field.clone(),
                delta: renumbered.get(&delta).copied().unwrap_or(delta),
            });
        }
        self.handled.push(request.clone());
        response
    }

    /// Answers every outstanding request, including ones issued while
    /// answering; returns how many were answered
    pub fn pump(&mut self, widget: &mut ChunksWidget) -> Result<usize, WidgetError> {
        let mut answered = 0;
        loop {
            let requests = widget.take_requests();
            if requests.is_empty() {
                return Ok(answered);
            }
            for request in requests {
                let response = self.respond(&request);
                widget.deliver(response)?;
                answered += 1;
            }
        }
    }

    /// Answers only the requests outstanding right now
    pub fn step(&mut self, widget: &mut ChunksWidget) -> Result<usize, WidgetError> {
        let requests = widget.take_requests();
        let answered = requests.len();
        for request in requests {
            let response = self.respond(&request);
            widget.deliver(response)?;
        }
        Ok(answered)
    }
}

fn types(settings: &FieldSettings) -> Vec<ChunkTypeId> {
    let mut types: Vec<ChunkTypeId> = settings
        .instances
        .values()
        .map(|i| i.chunk_type.clone())
        .collect();
    types.sort();
    types.dedup();
    types
}

fn chunk_type_of<'a>(settings: &'a FieldSettings, row: &ChunkRow) -> Option<&'a ChunkTypeId> {
    row.instance
        .as_ref()
        .and_then(|name| settings.instance(name))
        .map(|i| &i.chunk_type)
}

/// Markup the server renders for a preview
pub fn server_preview(text: &str) -> String {
    format!("<div class=\"server-preview\">{}</div>", text)
}

pub fn row_node(widget: &ChunksWidget, field: &str, delta: u32) -> NodeId {
    widget
        .container(&FieldName::new(field))
        .and_then(|c| c.row(Delta::new(delta)))
        .map(|r| r.node)
        .unwrap_or_default()
}

pub fn container_node(widget: &ChunksWidget, field: &str) -> NodeId {
    widget
        .container(&FieldName::new(field))
        .map(|c| c.node)
        .unwrap_or_default()
}

/// Primary click on a chunk row control
pub fn click(
    widget: &mut ChunksWidget,
    field: &str,
    delta: u32,
    control: UiControl,
) -> Result<DispatchOutcome, WidgetError> {
    let node = row_node(widget, field, delta);
    widget.dispatch(UiEvent::click(FieldName::new(field), node, control))
}

/// Primary click on the field's "add before" control
pub fn click_add_before(widget: &mut ChunksWidget, field: &str) -> Result<DispatchOutcome, WidgetError> {
    let node = container_node(widget, field);
    widget.dispatch(UiEvent::click(FieldName::new(field), node, UiControl::AddBefore))
}

/// Key transition on a chunk row control
pub fn press(
    widget: &mut ChunksWidget,
    field: &str,
    delta: u32,
    control: UiControl,
    key: KeyPress,
) -> Result<DispatchOutcome, WidgetError> {
    let node = row_node(widget, field, delta);
    widget.dispatch(UiEvent::new(
        FieldName::new(field),
        node,
        control,
        Activation::Key(key),
    ))
}

/// Selects an instance with a click
pub fn select(widget: &mut ChunksWidget, field: &str, delta: u32, instance: &str) -> Result<DispatchOutcome, WidgetError> {
    click(
        widget,
        field,
        delta,
        UiControl::InstanceOption(InstanceName::new(instance)),
    )
}

/// Types into a chunk's `text` control
pub fn type_text(widget: &mut ChunksWidget, field: &str, delta: u32, chunk_type: &str, text: &str) -> bool {
    widget
        .input(
            &FieldName::new(field),
            Delta::new(delta),
            &ChunkTypeId::new(chunk_type),
            "text",
            text,
        )
        .unwrap_or(false)
}

/// Weights of visible rows in document order
pub fn visible_weights(widget: &ChunksWidget, field: &str) -> Vec<i64> {
    widget
        .container(&FieldName::new(field))
        .map(|c| c.visible_rows().map(|r| r.weight).collect())
        .unwrap_or_default()
}

/// Deltas of visible rows in document order
pub fn visible_deltas(widget: &ChunksWidget, field: &str) -> Vec<u32> {
    widget
        .container(&FieldName::new(field))
        .map(|c| c.visible_rows().map(|r| r.delta.get()).collect())
        .unwrap_or_default()
}

/// Number of chunks in staged view, counted on both sides
pub fn staged_counts(widget: &ChunksWidget, field: &str) -> (usize, usize) {
    let name = FieldName::new(field);
    let rows = widget.container(&name).map(|c| c.staged_count()).unwrap_or(0);
    let chunks = widget
        .field(&name)
        .map(|f| f.chunks().filter(|c| c.view() == ChunkView::Staged).count())
        .unwrap_or(0);
    (rows, chunks)
}

//! Chunk rows and their form controls

use chunk_types::{ChunkTypeId, ChunkView, Delta, InstanceName, NodeId, RowKey, Stripe};
use serde::{Deserialize, Serialize};

/// Buttons rendered inside a chunk row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowButton {
    Preview,
    Edit,
    Cancel,
    Remove,
    Reset,
    AddAfter,
}

/// One configuration form control
///
/// Corresponds to `field[lang][delta][configuration][type][property]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub chunk_type: ChunkTypeId,
    pub property: String,
    pub value: String,
    pub visible: bool,
    /// Server attached a validation error marker to this control
    pub error: bool,
}

impl Control {
    pub fn new(
        chunk_type: impl Into<ChunkTypeId>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            chunk_type: chunk_type.into(),
            property: property.into(),
            value: value.into(),
            visible: true,
            error: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_error(mut self) -> Self {
        self.error = true;
        self
    }
}

/// One chunk row as rendered in the field's table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRow {
    /// Identity of the rendered node; changes whenever the row is re-rendered
    pub node: NodeId,
    /// Stable across renders; deltas may be renumbered
    pub key: RowKey,
    pub delta: Delta,
    /// Value of the hidden `view` input
    pub view: ChunkView,
    /// Currently checked instance option
    pub instance: Option<InstanceName>,
    /// Instance options in display order
    pub instance_options: Vec<InstanceName>,
    /// Value of the hidden `module` input
    pub module: Option<String>,
    pub controls: Vec<Control>,
    /// Markup inside the preview region
    pub preview_markup: String,
    pub visible: bool,
    pub stripe: Option<Stripe>,
    pub active: bool,
    pub weight: i64,
    pub weight_options: Vec<i64>,
    pub cancel_visible: bool,
    /// Progress indicator message, when one is showing
    pub progress: Option<String>,
    /// Row still carries the `staged` class
    pub staged_class: bool,
    /// Row arrived in an asynchronous response and has not been prepared yet
    pub ajax_loaded: bool,
    pub draggable: bool,
    /// Preview button submits the form by default
    pub preview_submits: bool,
    /// Button currently showing a pressed/active visual state
    pub pressed: Option<RowButton>,
}

impl ChunkRow {
    pub fn new(delta: Delta, view: ChunkView) -> Self {
        Self {
            node: NodeId::new(),
            key: RowKey::new(),
            delta,
            view,
            instance: None,
            instance_options: Vec::new(),
            module: None,
            controls: Vec::new(),
            preview_markup: String::new(),
            visible: view.is_visible(),
            stripe: None,
            active: false,
            weight: 0,
            weight_options: Vec::new(),
            cancel_visible: false,
            progress: None,
            staged_class: view == ChunkView::Staged,
            ajax_loaded: false,
            draggable: true,
            preview_submits: true,
            pressed: None,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<InstanceName>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = InstanceName>) -> Self {
        self.instance_options = options.into_iter().collect();
        self
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }

    pub fn with_preview(mut self, markup: impl Into<String>) -> Self {
        self.preview_markup = markup.into();
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn ajax_loaded(mut self) -> Self {
        self.ajax_loaded = true;
        self.draggable = false;
        self
    }

    /// Controls belonging to one chunk type
    pub fn controls_for<'a>(
        &'a self,
        chunk_type: &'a ChunkTypeId,
    ) -> impl Iterator<Item = &'a Control> + 'a {
        self.controls
            .iter()
            .filter(move |c| &c.chunk_type == chunk_type)
    }

    pub fn control(&self, chunk_type: &ChunkTypeId, property: &str) -> Option<&Control> {
        self.controls
            .iter()
            .find(|c| &c.chunk_type == chunk_type && c.property == property)
    }

    pub fn control_mut(&mut self, chunk_type: &ChunkTypeId, property: &str) -> Option<&mut Control> {
        self.controls
            .iter_mut()
            .find(|c| &c.chunk_type == chunk_type && c.property == property)
    }

    /// Sets a control value, returning false if no such control exists
    pub fn set_control_value(
        &mut self,
        chunk_type: &ChunkTypeId,
        property: &str,
        value: impl Into<String>,
    ) -> bool {
        match self.control_mut(chunk_type, property) {
            Some(control) => {
                control.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Returns true if any configuration control carries an error marker
    pub fn has_errors(&self) -> bool {
        self.controls.iter().any(|c| c.error)
    }

    pub fn first_error_control(&self) -> Option<&Control> {
        self.controls.iter().find(|c| c.error)
    }

    /// First visible control of a chunk type; borrows only the row
    pub fn first_visible_control(&self, chunk_type: &ChunkTypeId) -> Option<&Control> {
        self.controls
            .iter()
            .find(|c| &c.chunk_type == chunk_type && c.visible)
    }

    pub fn has_option(&self, instance: &InstanceName) -> bool {
        self.instance_options.contains(instance)
    }

    /// Option following `instance` in display order
    pub fn next_option(&self, instance: &InstanceName) -> Option<&InstanceName> {
        let pos = self.instance_options.iter().position(|o| o == instance)?;
        self.instance_options.get(pos + 1)
    }

    /// Option preceding `instance` in display order
    pub fn previous_option(&self, instance: &InstanceName) -> Option<&InstanceName> {
        let pos = self.instance_options.iter().position(|o| o == instance)?;
        pos.checked_sub(1).and_then(|p| self.instance_options.get(p))
    }
}

//! User input aimed at widget controls

use chunk_types::{Activation, FieldName, InstanceName, NodeId};
use serde::{Deserialize, Serialize};
use services_chunks_field::{EditorKeyOutcome, KeyOutcome};
use widget_dom::Handler;

/// Control a gesture landed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiControl {
    /// Field-level "add at start"
    AddBefore,
    AddAfter,
    InstanceOption(InstanceName),
    Preview,
    Edit,
    Cancel,
    Remove,
    Reset,
    /// A rich-text editing surface
    Editor,
}

impl UiControl {
    /// Handler slot serving this control for `activation`
    pub fn handler(&self, activation: &Activation) -> Handler {
        match self {
            UiControl::AddBefore => Handler::AddBefore,
            UiControl::AddAfter => Handler::AddAfter,
            UiControl::InstanceOption(_) => match activation {
                Activation::Key(_) => Handler::InstanceNavigate,
                Activation::PointerDown(_) => Handler::InstanceSelect,
            },
            UiControl::Preview => Handler::Preview,
            UiControl::Edit => Handler::Edit,
            UiControl::Cancel => Handler::Cancel,
            UiControl::Remove => Handler::Remove,
            UiControl::Reset => Handler::Reset,
            UiControl::Editor => Handler::EditorKeys,
        }
    }
}

/// A gesture on a rendered node
///
/// `node` is the field container for `AddBefore` and the chunk row for
/// every other control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiEvent {
    pub field: FieldName,
    pub node: NodeId,
    pub control: UiControl,
    pub activation: Activation,
}

impl UiEvent {
    pub fn new(field: FieldName, node: NodeId, control: UiControl, activation: Activation) -> Self {
        Self {
            field,
            node,
            control,
            activation,
        }
    }

    pub fn click(field: FieldName, node: NodeId, control: UiControl) -> Self {
        Self::new(field, node, control, Activation::click())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    /// The gesture does not activate the control
    Ignored,
    Key(KeyOutcome),
    Editor(EditorKeyOutcome),
}

//! Rich-text editing contracts
//!
//! In-place editing is delegated to an external editor component. The
//! widget only attaches and detaches it, and decides what Enter does.

use chunk_types::{Delta, FieldName};
use serde::{Deserialize, Serialize};

/// What an Enter keypress inside the editing surface does
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnterBehavior {
    /// Let the editor handle it
    #[default]
    Default,
    /// Swallow the keypress
    Suppress,
    /// Insert this markup instead of a new block element
    InsertLineBreak(String),
}

/// How a chunk type's editing surface treats special keys
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditingContract {
    pub enter: EnterBehavior,
    /// Shift+Enter adds a chunk of the same instance after this one
    pub shift_enter_adds_chunk: bool,
}

impl EditingContract {
    pub fn new(enter: EnterBehavior) -> Self {
        Self {
            enter,
            shift_enter_adds_chunk: false,
        }
    }

    pub fn with_shift_enter_add(mut self) -> Self {
        self.shift_enter_adds_chunk = true;
        self
    }
}

/// The editing surface an editor is attached to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EditorTarget {
    pub field: FieldName,
    pub delta: Delta,
}

/// External rich-text editor component
pub trait RichTextEditor {
    fn attach(&mut self, target: &EditorTarget);
    fn detach(&mut self, target: &EditorTarget);
}

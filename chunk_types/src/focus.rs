//! Focusable controls

use crate::ids::{ChunkTypeId, Delta, FieldName, InstanceName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A control that can receive keyboard focus
///
/// Targets are addressed by field and live delta, so a target resolved
/// after a round trip refers to whatever row currently holds that delta.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusTarget {
    /// The field-level "add before all chunks" control
    AddBefore { field: FieldName },
    /// A chunk's "add after" control
    AddAfter { field: FieldName, delta: Delta },
    /// One option of a chunk's instance selection
    InstanceOption {
        field: FieldName,
        delta: Delta,
        instance: InstanceName,
    },
    /// A configuration control of a chunk
    ConfigControl {
        field: FieldName,
        delta: Delta,
        chunk_type: ChunkTypeId,
        property: String,
    },
    /// A chunk's rich-text editing surface
    Editor { field: FieldName, delta: Delta },
}

impl FocusTarget {
    pub fn field(&self) -> &FieldName {
        match self {
            FocusTarget::AddBefore { field }
            | FocusTarget::AddAfter { field, .. }
            | FocusTarget::InstanceOption { field, .. }
            | FocusTarget::ConfigControl { field, .. }
            | FocusTarget::Editor { field, .. } => field,
        }
    }

    /// Delta of the owning chunk, if the target belongs to one
    pub fn delta(&self) -> Option<Delta> {
        match self {
            FocusTarget::AddBefore { .. } => None,
            FocusTarget::AddAfter { delta, .. }
            | FocusTarget::InstanceOption { delta, .. }
            | FocusTarget::ConfigControl { delta, .. }
            | FocusTarget::Editor { delta, .. } => Some(*delta),
        }
    }
}

impl fmt::Display for FocusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocusTarget::AddBefore { field } => write!(f, "{}-add-before", field),
            FocusTarget::AddAfter { field, delta } => write!(f, "{}-{}-add-after", field, delta),
            FocusTarget::InstanceOption {
                field,
                delta,
                instance,
            } => write!(f, "{}[{}][instance]={}", field, delta, instance),
            FocusTarget::ConfigControl {
                field,
                delta,
                chunk_type,
                property,
            } => write!(
                f,
                "{}[{}][configuration][{}][{}]",
                field, delta, chunk_type, property
            ),
            FocusTarget::Editor { field, delta } => write!(f, "{}[{}][editor]", field, delta),
        }
    }
}

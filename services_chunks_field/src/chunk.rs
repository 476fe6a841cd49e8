//! Per-chunk state machine
//!
//! A `Chunk` is the client-side object behind one chunk row. Its view
//! changes only through [`transition`], which encodes every legal move:
//!
//! ```text
//! staged -> instance_selection -> configuration <-> preview
//!                       any visible -> removed
//! ```

use crate::error::ChunksError;
use chunk_plugins::ChunkInfo;
use chunk_types::{
    ChunkTypeId, ChunkView, Configuration, Delta, FieldName, FieldSettings, InstanceName,
    LangCode, NodeId, RowKey,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use widget_dom::ChunkRow;

/// Something the editor or the field does to a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkAction {
    /// Staged chunk promoted by an add
    Show,
    SelectInstance,
    Preview,
    Edit,
    Cancel,
    Remove,
    /// Roll back to instance selection without a round trip
    Reset,
    AddAfter,
}

impl fmt::Display for ChunkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChunkAction::Show => "show",
            ChunkAction::SelectInstance => "select an instance",
            ChunkAction::Preview => "preview",
            ChunkAction::Edit => "edit",
            ChunkAction::Cancel => "cancel",
            ChunkAction::Remove => "remove",
            ChunkAction::Reset => "reset",
            ChunkAction::AddAfter => "add after",
        };
        write!(f, "{}", label)
    }
}

/// The view an action leads to, or `None` if it is not allowed
pub fn transition(from: ChunkView, action: ChunkAction) -> Option<ChunkView> {
    use ChunkAction as A;
    use ChunkView as V;

    match (from, action) {
        (V::Staged, A::Show) => Some(V::InstanceSelection),
        (V::InstanceSelection, A::SelectInstance) => Some(V::Configuration),
        (V::Configuration, A::Preview) => Some(V::Preview),
        (V::Configuration, A::Cancel) => Some(V::Preview),
        (V::Preview, A::Edit) => Some(V::Configuration),
        (V::InstanceSelection | V::Configuration | V::Preview, A::Remove) => Some(V::Removed),
        (V::InstanceSelection | V::Configuration | V::Preview, A::Reset) => {
            Some(V::InstanceSelection)
        }
        (V::InstanceSelection | V::Configuration | V::Preview, A::AddAfter) => Some(from),
        _ => None,
    }
}

/// Client-side state of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    delta: Delta,
    key: RowKey,
    node: NodeId,
    instance: Option<InstanceName>,
    chunk_type: Option<ChunkTypeId>,
    view: ChunkView,
    /// Last committed configuration
    configuration: Configuration,
    active: bool,
    cancel_visible: bool,
    /// Row was replaced by a server render and awaits rebinding
    pending_reset: bool,
    /// A server-rendered preview is outstanding
    preview_loading: bool,
    /// Markup of the last client-rendered preview
    client_preview: Option<String>,
}

impl Chunk {
    /// Builds the client object for a freshly discovered row
    pub fn from_row(row: &ChunkRow, settings: &FieldSettings) -> Self {
        let chunk_type = row
            .instance
            .as_ref()
            .and_then(|name| settings.instance(name))
            .map(|instance| instance.chunk_type.clone());
        if row.instance.is_some() && chunk_type.is_none() {
            log::warn!("row {} names an instance missing from field settings", row.delta);
        }
        let configuration = chunk_type
            .as_ref()
            .map(|t| read_configuration(row, t))
            .unwrap_or_default();

        Self {
            delta: row.delta,
            key: row.key,
            node: row.node,
            instance: row.instance.clone(),
            chunk_type,
            view: row.view,
            configuration,
            active: row.active,
            cancel_visible: row.cancel_visible,
            pending_reset: false,
            preview_loading: false,
            client_preview: None,
        }
    }

    /// Applies an action, returning the new view
    pub fn apply(&mut self, action: ChunkAction) -> Result<ChunkView, ChunksError> {
        let to = transition(self.view, action).ok_or(ChunksError::InvalidTransition {
            delta: self.delta,
            from: self.view,
            action,
        })?;
        self.view = to;
        Ok(to)
    }

    /// Checks an action without applying it
    pub fn check(&self, action: ChunkAction) -> Result<(), ChunksError> {
        transition(self.view, action)
            .map(|_| ())
            .ok_or(ChunksError::InvalidTransition {
                delta: self.delta,
                from: self.view,
                action,
            })
    }

    /// Points the chunk at a row from a newer render
    pub fn rebind(&mut self, node: NodeId) -> NodeId {
        self.pending_reset = false;
        std::mem::replace(&mut self.node, node)
    }

    pub fn delta(&self) -> Delta {
        self.delta
    }

    /// Moves the chunk to the delta a render renumbered its row to
    pub fn renumber(&mut self, delta: Delta) {
        self.delta = delta;
    }

    pub fn key(&self) -> RowKey {
        self.key
    }

    /// Takes over the key of a row matched by position
    pub fn adopt_key(&mut self, key: RowKey) {
        self.key = key;
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn view(&self) -> ChunkView {
        self.view
    }

    /// Overrides the view, bypassing the transition table
    ///
    /// Only used when the server forces a view, e.g. on validation errors.
    pub fn force_view(&mut self, view: ChunkView) {
        self.view = view;
    }

    pub fn instance(&self) -> Option<&InstanceName> {
        self.instance.as_ref()
    }

    pub fn chunk_type(&self) -> Option<&ChunkTypeId> {
        self.chunk_type.as_ref()
    }

    pub fn set_instance(&mut self, instance: InstanceName, chunk_type: ChunkTypeId) {
        self.instance = Some(instance);
        self.chunk_type = Some(chunk_type);
    }

    pub fn clear_instance(&mut self) {
        self.instance = None;
        self.chunk_type = None;
        self.configuration = Configuration::new();
        self.client_preview = None;
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn commit_configuration(&mut self, configuration: Configuration) {
        self.configuration = configuration;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn cancel_visible(&self) -> bool {
        self.cancel_visible
    }

    pub fn set_cancel_visible(&mut self, visible: bool) {
        self.cancel_visible = visible;
    }

    pub fn is_pending_reset(&self) -> bool {
        self.pending_reset
    }

    pub fn mark_pending_reset(&mut self) {
        self.pending_reset = true;
    }

    pub fn is_preview_loading(&self) -> bool {
        self.preview_loading
    }

    pub fn set_preview_loading(&mut self, loading: bool) {
        self.preview_loading = loading;
    }

    pub fn client_preview(&self) -> Option<&str> {
        self.client_preview.as_deref()
    }

    pub fn set_client_preview(&mut self, markup: Option<String>) {
        self.client_preview = markup;
    }

    /// Description handed to lifecycle hooks
    pub fn info(&self, field: &FieldName, langcode: &LangCode, unlimited: bool) -> ChunkInfo {
        ChunkInfo {
            field: field.clone(),
            langcode: langcode.clone(),
            delta: self.delta,
            chunk_type: self.chunk_type.clone(),
            instance: self.instance.clone(),
            view: self.view,
            unlimited,
        }
    }
}

/// Reads a chunk type's configuration controls from a row
pub fn read_configuration(row: &ChunkRow, chunk_type: &ChunkTypeId) -> Configuration {
    row.controls_for(chunk_type)
        .map(|c| (c.property.clone(), c.value.clone()))
        .collect()
}

/// Writes configuration values back into a row's controls
///
/// Properties without a matching control are skipped.
pub fn write_configuration(row: &mut ChunkRow, chunk_type: &ChunkTypeId, configuration: &Configuration) {
    for (property, value) in configuration.iter() {
        if !row.set_control_value(chunk_type, property, value) {
            log::debug!("row {} has no {}[{}] control", row.delta, chunk_type, property);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_types::ChunkInstance;
    use widget_dom::Control;

    fn settings() -> FieldSettings {
        FieldSettings::new().with_instance("text", ChunkInstance::new("text"))
    }

    fn configured_row() -> ChunkRow {
        ChunkRow::new(Delta::new(3), ChunkView::Preview)
            .with_instance("text")
            .with_control(Control::new("text", "text", "Hello"))
            .with_control(Control::new("heading", "text", "ignored"))
    }

    #[test]
    fn test_transition_table() {
        use ChunkAction as A;
        use ChunkView as V;

        assert_eq!(transition(V::Staged, A::Show), Some(V::InstanceSelection));
        assert_eq!(
            transition(V::InstanceSelection, A::SelectInstance),
            Some(V::Configuration)
        );
        assert_eq!(transition(V::Configuration, A::Preview), Some(V::Preview));
        assert_eq!(transition(V::Preview, A::Edit), Some(V::Configuration));
        assert_eq!(transition(V::Configuration, A::Cancel), Some(V::Preview));
        assert_eq!(transition(V::Preview, A::Remove), Some(V::Removed));
        assert_eq!(transition(V::Preview, A::Reset), Some(V::InstanceSelection));

        assert_eq!(transition(V::Staged, A::AddAfter), None);
        assert_eq!(transition(V::Staged, A::Remove), None);
        assert_eq!(transition(V::Removed, A::Edit), None);
        assert_eq!(transition(V::Preview, A::Preview), None);
        assert_eq!(transition(V::InstanceSelection, A::Show), None);
    }

    #[test]
    fn test_from_row_derives_type_and_configuration() {
        let chunk = Chunk::from_row(&configured_row(), &settings());
        assert_eq!(chunk.chunk_type(), Some(&ChunkTypeId::new("text")));
        assert_eq!(chunk.configuration().get("text"), Some("Hello"));
        assert_eq!(chunk.configuration().len(), 1);
        assert!(!chunk.is_pending_reset());
    }

    #[test]
    fn test_unknown_instance_has_no_type() {
        let row = ChunkRow::new(Delta::new(0), ChunkView::Preview).with_instance("missing");
        let chunk = Chunk::from_row(&row, &settings());
        assert!(chunk.chunk_type().is_none());
        assert!(chunk.configuration().is_empty());
    }

    #[test]
    fn test_invalid_transition_error() {
        let mut chunk = Chunk::from_row(&configured_row(), &settings());
        let err = chunk.apply(ChunkAction::Cancel).unwrap_err();
        assert_eq!(
            err,
            ChunksError::InvalidTransition {
                delta: Delta::new(3),
                from: ChunkView::Preview,
                action: ChunkAction::Cancel,
            }
        );
        assert_eq!(err.to_string(), "Chunk 3 cannot cancel while in preview view");
        assert_eq!(chunk.view(), ChunkView::Preview);
    }

    #[test]
    fn test_renumber_keeps_row_key() {
        let row = configured_row();
        let mut chunk = Chunk::from_row(&row, &settings());
        assert_eq!(chunk.key(), row.key);

        chunk.renumber(Delta::new(1));
        assert_eq!(chunk.delta(), Delta::new(1));
        assert_eq!(chunk.key(), row.key);
        let err = chunk.apply(ChunkAction::Cancel).unwrap_err();
        assert_eq!(err.to_string(), "Chunk 1 cannot cancel while in preview view");
    }

    #[test]
    fn test_rebind_clears_pending_reset() {
        let mut chunk = Chunk::from_row(&configured_row(), &settings());
        let old = chunk.node();
        chunk.mark_pending_reset();
        let fresh = NodeId::new();
        assert_eq!(chunk.rebind(fresh), old);
        assert_eq!(chunk.node(), fresh);
        assert!(!chunk.is_pending_reset());
    }

    #[test]
    fn test_write_configuration_round_trip() {
        let mut row = configured_row();
        let text = ChunkTypeId::new("text");
        let saved = read_configuration(&row, &text);
        row.set_control_value(&text, "text", "Changed");
        write_configuration(&mut row, &text, &saved);
        assert_eq!(read_configuration(&row, &text), saved);
    }
}

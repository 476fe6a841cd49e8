//! Field containers
//!
//! A container is the DOM fragment the server renders for one chunks field:
//! the ordered table of chunk rows plus field-level controls and settings.

use crate::row::ChunkRow;
use chunk_types::{ChunkView, Delta, FieldName, FieldSettings, LangCode, NodeId};
use serde::{Deserialize, Serialize};

/// Where to place a row that is being moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowAnchor {
    /// Before every other row
    Start,
    /// Immediately after the row holding this delta
    After(Delta),
}

/// One chunks field as rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldContainer {
    pub node: NodeId,
    pub field_name: FieldName,
    pub langcode: LangCode,
    pub settings: FieldSettings,
    /// Rows in document order
    pub rows: Vec<ChunkRow>,
    /// Progress indicator next to the "add before" control
    pub add_before_progress: Option<String>,
}

impl FieldContainer {
    pub fn new(field_name: impl Into<FieldName>, langcode: LangCode, settings: FieldSettings) -> Self {
        Self {
            node: NodeId::new(),
            field_name: field_name.into(),
            langcode,
            settings,
            rows: Vec::new(),
            add_before_progress: None,
        }
    }

    pub fn with_row(mut self, row: ChunkRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn row(&self, delta: Delta) -> Option<&ChunkRow> {
        self.rows.iter().find(|r| r.delta == delta)
    }

    pub fn row_mut(&mut self, delta: Delta) -> Option<&mut ChunkRow> {
        self.rows.iter_mut().find(|r| r.delta == delta)
    }

    pub fn row_by_node(&self, node: NodeId) -> Option<&ChunkRow> {
        self.rows.iter().find(|r| r.node == node)
    }

    /// Document position of the row holding `delta`
    pub fn row_position(&self, delta: Delta) -> Option<usize> {
        self.rows.iter().position(|r| r.delta == delta)
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &ChunkRow> {
        self.rows.iter().filter(|r| r.visible)
    }

    pub fn visible_count(&self) -> usize {
        self.visible_rows().count()
    }

    /// Zero-based position of `delta` among visible rows
    pub fn visible_position(&self, delta: Delta) -> Option<usize> {
        self.visible_rows().position(|r| r.delta == delta)
    }

    /// Delta of the visible row preceding `delta`, if any
    pub fn previous_visible(&self, delta: Delta) -> Option<Delta> {
        let pos = self.visible_position(delta)?;
        pos.checked_sub(1)
            .and_then(|p| self.visible_rows().nth(p))
            .map(|r| r.delta)
    }

    /// Delta of the visible row at a visible position
    pub fn visible_delta_at(&self, visible_index: usize) -> Option<Delta> {
        self.visible_rows().nth(visible_index).map(|r| r.delta)
    }

    /// Delta of the row currently in staged view, if one is available
    pub fn staged_delta(&self) -> Option<Delta> {
        self.rows
            .iter()
            .find(|r| r.view == ChunkView::Staged)
            .map(|r| r.delta)
    }

    /// Number of rows in staged view
    pub fn staged_count(&self) -> usize {
        self.rows.iter().filter(|r| r.view == ChunkView::Staged).count()
    }

    /// Detaches the row holding `delta` and reinserts it at `anchor`
    ///
    /// Returns false if the row or the anchor row does not exist. Moving a
    /// row after itself leaves it in place.
    pub fn move_row(&mut self, delta: Delta, anchor: RowAnchor) -> bool {
        if let RowAnchor::After(anchor_delta) = anchor {
            if anchor_delta == delta {
                return self.row_position(delta).is_some();
            }
            if self.row_position(anchor_delta).is_none() {
                return false;
            }
        }

        let from = match self.row_position(delta) {
            Some(pos) => pos,
            None => return false,
        };
        let row = self.rows.remove(from);

        let to = match anchor {
            RowAnchor::Start => 0,
            RowAnchor::After(anchor_delta) => match self.row_position(anchor_delta) {
                Some(pos) => pos + 1,
                None => {
                    self.rows.insert(from, row);
                    return false;
                }
            },
        };
        self.rows.insert(to, row);
        true
    }

    /// Deltas in document order
    pub fn deltas(&self) -> Vec<Delta> {
        self.rows.iter().map(|r| r.delta).collect()
    }
}

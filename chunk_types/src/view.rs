//! Chunk view states and row striping

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display mode of a chunk
///
/// Mirrored into a hidden form value so the server renders the same mode
/// the client last showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkView {
    /// Hidden placeholder for the next chunk to be inserted
    Staged,
    /// Waiting for the editor to pick an instance
    InstanceSelection,
    /// Type-specific configuration form is showing
    Configuration,
    /// Rendered preview is showing
    Preview,
    /// Removed; row is hidden and will be dropped on save
    Removed,
}

impl ChunkView {
    /// Returns the value written to the hidden `view` input
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkView::Staged => "staged",
            ChunkView::InstanceSelection => "instance_selection",
            ChunkView::Configuration => "configuration",
            ChunkView::Preview => "preview",
            ChunkView::Removed => "removed",
        }
    }

    /// Returns true if a row in this view is shown to the editor
    pub fn is_visible(&self) -> bool {
        !matches!(self, ChunkView::Staged | ChunkView::Removed)
    }
}

impl fmt::Display for ChunkView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChunkView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staged" => Ok(ChunkView::Staged),
            // Older forms used "type_selection" for the same state.
            "instance_selection" | "type_selection" => Ok(ChunkView::InstanceSelection),
            "configuration" => Ok(ChunkView::Configuration),
            "preview" => Ok(ChunkView::Preview),
            "removed" => Ok(ChunkView::Removed),
            other => Err(format!("unknown chunk view: {}", other)),
        }
    }
}

/// Odd/even row class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stripe {
    Odd,
    Even,
}

impl Stripe {
    /// Stripe for a zero-based visible position (first row is odd)
    pub fn for_position(visible_index: usize) -> Self {
        if visible_index % 2 == 0 {
            Stripe::Odd
        } else {
            Stripe::Even
        }
    }
}

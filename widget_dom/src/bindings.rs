//! Delegated event bindings
//!
//! Handlers are keyed by the node they were bound to. Binding is
//! idempotent, and a node replaced by a server render simply has no
//! bindings until its owner rebinds to the new node.

use chunk_types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Handler slots a field or chunk can bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Handler {
    AddBefore,
    AddAfter,
    InstanceSelect,
    InstanceNavigate,
    Preview,
    Edit,
    Cancel,
    Remove,
    Reset,
    EditorKeys,
}

impl Handler {
    /// Every handler a chunk row binds
    pub const CHUNK_HANDLERS: [Handler; 9] = [
        Handler::AddAfter,
        Handler::InstanceSelect,
        Handler::InstanceNavigate,
        Handler::Preview,
        Handler::Edit,
        Handler::Cancel,
        Handler::Remove,
        Handler::Reset,
        Handler::EditorKeys,
    ];
}

#[derive(Debug, Default)]
pub struct EventBindings {
    bound: BTreeMap<NodeId, BTreeSet<Handler>>,
}

impl EventBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a handler; returns false if it was already bound
    pub fn bind(&mut self, node: NodeId, handler: Handler) -> bool {
        self.bound.entry(node).or_default().insert(handler)
    }

    pub fn bind_all(&mut self, node: NodeId, handlers: &[Handler]) -> usize {
        handlers.iter().filter(|h| self.bind(node, **h)).count()
    }

    /// Removes every handler bound to `node`, returning how many there were
    pub fn unbind_node(&mut self, node: NodeId) -> usize {
        self.bound.remove(&node).map(|set| set.len()).unwrap_or(0)
    }

    pub fn unbind(&mut self, node: NodeId, handler: Handler) -> bool {
        let Some(set) = self.bound.get_mut(&node) else {
            return false;
        };
        let removed = set.remove(&handler);
        if set.is_empty() {
            self.bound.remove(&node);
        }
        removed
    }

    pub fn is_bound(&self, node: NodeId, handler: Handler) -> bool {
        self.bound
            .get(&node)
            .map(|set| set.contains(&handler))
            .unwrap_or(false)
    }

    /// Total number of bound handlers across all nodes
    pub fn count(&self) -> usize {
        self.bound.values().map(|set| set.len()).sum()
    }

    pub fn node_count(&self) -> usize {
        self.bound.len()
    }
}

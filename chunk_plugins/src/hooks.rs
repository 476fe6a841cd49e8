//! Lifecycle hook slots
//!
//! Each chunk type may populate any subset of the slots. An empty slot is
//! an absent extension point, never an error.

use chunk_types::{
    ChunkTypeId, ChunkView, Configuration, Delta, FieldName, InstanceName, LangCode,
};
use serde::{Deserialize, Serialize};

/// Read-only description of a chunk handed to hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub field: FieldName,
    pub langcode: LangCode,
    pub delta: Delta,
    pub chunk_type: Option<ChunkTypeId>,
    pub instance: Option<InstanceName>,
    pub view: ChunkView,
    /// Parent field accepts an unlimited number of chunks
    pub unlimited: bool,
}

/// Arguments of the `save_config` and `restore_config` hooks
#[derive(Debug, Clone, Copy)]
pub struct ConfigEvent<'a> {
    pub field: &'a FieldName,
    pub langcode: &'a LangCode,
    pub delta: Delta,
    pub configuration: &'a Configuration,
}

/// Requests a hook makes of the widget
///
/// Hooks never mutate widget state directly; the widget applies these
/// after the hook returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookCommand {
    /// Select an instance on a chunk, as if the editor had clicked it
    SelectInstance { delta: Delta, instance: InstanceName },
    /// Overwrite a configuration control's value
    SetControlValue {
        delta: Delta,
        chunk_type: ChunkTypeId,
        property: String,
        value: String,
    },
    /// Hide a chunk's Cancel control
    HideCancel { delta: Delta },
}

pub type InitializeHook = Box<dyn FnMut(&ChunkInfo) -> Vec<HookCommand>>;
pub type SaveConfigHook = Box<dyn FnMut(&ConfigEvent<'_>)>;
pub type RestoreConfigHook = Box<dyn FnMut(&ConfigEvent<'_>) -> Vec<HookCommand>>;
pub type StagedChunkShownHook = Box<dyn FnMut(&ChunkInfo, Option<&ChunkInfo>) -> Vec<HookCommand>>;

/// Optional callbacks for one chunk type
#[derive(Default)]
pub struct LifecycleHooks {
    /// Once per chunk construction
    pub initialize: Option<InitializeHook>,
    /// After configuration is snapshotted
    pub save_config: Option<SaveConfigHook>,
    /// After configuration is restored from its snapshot
    pub restore_config: Option<RestoreConfigHook>,
    /// After a staged chunk is promoted; second argument is the requesting chunk
    pub staged_chunk_shown: Option<StagedChunkShownHook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_initialize(
        mut self,
        hook: impl FnMut(&ChunkInfo) -> Vec<HookCommand> + 'static,
    ) -> Self {
        self.initialize = Some(Box::new(hook));
        self
    }

    pub fn on_save_config(mut self, hook: impl FnMut(&ConfigEvent<'_>) + 'static) -> Self {
        self.save_config = Some(Box::new(hook));
        self
    }

    pub fn on_restore_config(
        mut self,
        hook: impl FnMut(&ConfigEvent<'_>) -> Vec<HookCommand> + 'static,
    ) -> Self {
        self.restore_config = Some(Box::new(hook));
        self
    }

    pub fn on_staged_chunk_shown(
        mut self,
        hook: impl FnMut(&ChunkInfo, Option<&ChunkInfo>) -> Vec<HookCommand> + 'static,
    ) -> Self {
        self.staged_chunk_shown = Some(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("initialize", &self.initialize.is_some())
            .field("save_config", &self.save_config.is_some())
            .field("restore_config", &self.restore_config.is_some())
            .field("staged_chunk_shown", &self.staged_chunk_shown.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_populates_slots_independently() {
        let hooks = LifecycleHooks::new().on_save_config(|_| {});
        assert!(hooks.save_config.is_some());
        assert!(hooks.initialize.is_none());
        assert!(hooks.restore_config.is_none());
        assert!(hooks.staged_chunk_shown.is_none());
    }

    #[test]
    fn test_debug_reports_populated_slots() {
        let hooks = LifecycleHooks::new().on_initialize(|_| Vec::new());
        let debug = format!("{:?}", hooks);
        assert!(debug.contains("initialize: true"));
        assert!(debug.contains("save_config: false"));
    }

    #[test]
    fn test_hook_command_serialization() {
        let command = HookCommand::SelectInstance {
            delta: Delta::new(2),
            instance: InstanceName::new("paragraph"),
        };
        let json = serde_json::to_string(&command).unwrap();
        let back: HookCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, command);
    }
}

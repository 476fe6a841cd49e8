//! # Chunk Plugins
//!
//! Typed registry of per-chunk-type extensions.
//!
//! ## Philosophy
//!
//! - **Typed dispatch**: renderers and hooks are looked up by `ChunkTypeId`, never by property presence
//! - **Optional capabilities**: every hook slot is independently nullable; a missing hook is a no-op
//! - **Pure renderers**: client previews are a function of configuration alone
//! - **Commands, not mutation**: hooks return `HookCommand`s for the widget to apply
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A template engine
//! - A rich-text editor; editors are external and only attached/detached here

pub mod builtin;
pub mod editor;
pub mod hooks;
pub mod renderer;

pub use builtin::register_builtin;
pub use editor::{EditingContract, EditorTarget, EnterBehavior, RichTextEditor};
pub use hooks::{ChunkInfo, ConfigEvent, HookCommand, LifecycleHooks};
pub use renderer::{check_plain, RenderRequest, RendererFn};

use chunk_types::ChunkTypeId;
use std::collections::{BTreeSet, HashMap};

/// Registry of renderers, hooks, editing contracts and editors
#[derive(Default)]
pub struct PluginRegistry {
    renderers: HashMap<ChunkTypeId, RendererFn>,
    hooks: HashMap<ChunkTypeId, LifecycleHooks>,
    contracts: HashMap<ChunkTypeId, EditingContract>,
    editors: HashMap<ChunkTypeId, Box<dyn RichTextEditor>>,
    attached: BTreeSet<(ChunkTypeId, EditorTarget)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in chunk types
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_builtin(&mut registry);
        registry
    }

    /// Registers a renderer, replacing any earlier one for the type
    pub fn register_renderer(
        &mut self,
        chunk_type: impl Into<ChunkTypeId>,
        renderer: impl Fn(&RenderRequest<'_>) -> String + 'static,
    ) {
        self.renderers.insert(chunk_type.into(), Box::new(renderer));
    }

    pub fn has_renderer(&self, chunk_type: &ChunkTypeId) -> bool {
        self.renderers.contains_key(chunk_type)
    }

    /// Renders a preview, or `None` if the type has no renderer
    pub fn render(&self, chunk_type: &ChunkTypeId, request: &RenderRequest<'_>) -> Option<String> {
        self.renderers.get(chunk_type).map(|render| render(request))
    }

    pub fn register_hooks(&mut self, chunk_type: impl Into<ChunkTypeId>, hooks: LifecycleHooks) {
        self.hooks.insert(chunk_type.into(), hooks);
    }

    pub fn hooks(&self, chunk_type: &ChunkTypeId) -> Option<&LifecycleHooks> {
        self.hooks.get(chunk_type)
    }

    pub fn run_initialize(&mut self, chunk_type: &ChunkTypeId, info: &ChunkInfo) -> Vec<HookCommand> {
        match self.hooks.get_mut(chunk_type).and_then(|h| h.initialize.as_mut()) {
            Some(hook) => hook(info),
            None => Vec::new(),
        }
    }

    pub fn run_save_config(&mut self, chunk_type: &ChunkTypeId, event: &ConfigEvent<'_>) {
        if let Some(hook) = self.hooks.get_mut(chunk_type).and_then(|h| h.save_config.as_mut()) {
            hook(event);
        }
    }

    pub fn run_restore_config(
        &mut self,
        chunk_type: &ChunkTypeId,
        event: &ConfigEvent<'_>,
    ) -> Vec<HookCommand> {
        match self.hooks.get_mut(chunk_type).and_then(|h| h.restore_config.as_mut()) {
            Some(hook) => hook(event),
            None => Vec::new(),
        }
    }

    /// Runs every registered `staged_chunk_shown` hook
    ///
    /// A promoted chunk has no type yet, so the hook is broadcast to all
    /// types in a stable order.
    pub fn run_staged_chunk_shown(
        &mut self,
        shown: &ChunkInfo,
        origin: Option<&ChunkInfo>,
    ) -> Vec<HookCommand> {
        let mut types: Vec<ChunkTypeId> = self.hooks.keys().cloned().collect();
        types.sort();

        let mut commands = Vec::new();
        for chunk_type in types {
            if let Some(hook) = self
                .hooks
                .get_mut(&chunk_type)
                .and_then(|h| h.staged_chunk_shown.as_mut())
            {
                commands.extend(hook(shown, origin));
            }
        }
        commands
    }

    pub fn register_contract(&mut self, chunk_type: impl Into<ChunkTypeId>, contract: EditingContract) {
        self.contracts.insert(chunk_type.into(), contract);
    }

    /// Editing contract of a type; types without one use default behavior
    pub fn contract(&self, chunk_type: &ChunkTypeId) -> EditingContract {
        self.contracts.get(chunk_type).cloned().unwrap_or_default()
    }

    pub fn register_editor(
        &mut self,
        chunk_type: impl Into<ChunkTypeId>,
        editor: impl RichTextEditor + 'static,
    ) {
        self.editors.insert(chunk_type.into(), Box::new(editor));
    }

    /// Attaches the type's editor to a surface
    ///
    /// Returns false if no editor is registered or it is already attached.
    pub fn attach_editor(&mut self, chunk_type: &ChunkTypeId, target: &EditorTarget) -> bool {
        let Some(editor) = self.editors.get_mut(chunk_type) else {
            return false;
        };
        if !self.attached.insert((chunk_type.clone(), target.clone())) {
            return false;
        }
        log::debug!("attaching {} editor to {} {}", chunk_type, target.field, target.delta);
        editor.attach(target);
        true
    }

    /// Detaches whichever editor is attached to `target`
    pub fn detach_editor(&mut self, target: &EditorTarget) -> bool {
        let Some(key) = self.attached.iter().find(|(_, t)| t == target).cloned() else {
            return false;
        };
        self.attached.remove(&key);
        log::debug!("detaching {} editor from {} {}", key.0, target.field, target.delta);
        if let Some(editor) = self.editors.get_mut(&key.0) {
            editor.detach(target);
        }
        true
    }

    pub fn is_editor_attached(&self, target: &EditorTarget) -> bool {
        self.attached.iter().any(|(_, t)| t == target)
    }

    pub fn attached_editor_count(&self) -> usize {
        self.attached.len()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut renderers: Vec<_> = self.renderers.keys().collect();
        renderers.sort();
        f.debug_struct("PluginRegistry")
            .field("renderers", &renderers)
            .field("hooks", &self.hooks)
            .field("contracts", &self.contracts)
            .field("editors", &self.editors.len())
            .field("attached", &self.attached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_types::{
        ChunkView, Configuration, Delta, FieldName, InstanceName, InstanceTypeSettings, LangCode,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn info() -> ChunkInfo {
        ChunkInfo {
            field: FieldName::new("body"),
            langcode: LangCode::undefined(),
            delta: Delta::new(0),
            chunk_type: Some(ChunkTypeId::new("text")),
            instance: Some(InstanceName::new("text")),
            view: ChunkView::Preview,
            unlimited: true,
        }
    }

    #[derive(Clone, Default)]
    struct RecordingEditor {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl RichTextEditor for RecordingEditor {
        fn attach(&mut self, target: &EditorTarget) {
            self.calls.borrow_mut().push(format!("attach {}", target.delta));
        }

        fn detach(&mut self, target: &EditorTarget) {
            self.calls.borrow_mut().push(format!("detach {}", target.delta));
        }
    }

    #[test]
    fn test_missing_hooks_are_noops() {
        let mut registry = PluginRegistry::new();
        let text = ChunkTypeId::new("text");
        assert!(registry.run_initialize(&text, &info()).is_empty());
        assert!(registry.run_staged_chunk_shown(&info(), None).is_empty());

        let configuration = Configuration::new();
        let field = FieldName::new("body");
        let langcode = LangCode::undefined();
        let event = ConfigEvent {
            field: &field,
            langcode: &langcode,
            delta: Delta::new(0),
            configuration: &configuration,
        };
        registry.run_save_config(&text, &event);
        assert!(registry.run_restore_config(&text, &event).is_empty());
    }

    #[test]
    fn test_hooks_are_dispatched_by_type() {
        let mut registry = PluginRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        registry.register_hooks(
            "text",
            LifecycleHooks::new().on_initialize(move |info| {
                sink.borrow_mut().push(info.delta);
                vec![HookCommand::HideCancel { delta: info.delta }]
            }),
        );

        let commands = registry.run_initialize(&ChunkTypeId::new("text"), &info());
        assert_eq!(commands, vec![HookCommand::HideCancel { delta: Delta::new(0) }]);
        assert!(registry
            .run_initialize(&ChunkTypeId::new("heading"), &info())
            .is_empty());
        assert_eq!(*seen.borrow(), vec![Delta::new(0)]);
    }

    #[test]
    fn test_staged_chunk_shown_is_broadcast() {
        let mut registry = PluginRegistry::new();
        registry.register_hooks(
            "quote",
            LifecycleHooks::new().on_staged_chunk_shown(|_, _| vec![HookCommand::HideCancel {
                delta: Delta::new(2),
            }]),
        );
        registry.register_hooks(
            "p",
            LifecycleHooks::new().on_staged_chunk_shown(|shown, origin| {
                assert!(origin.is_none());
                vec![HookCommand::SelectInstance {
                    delta: shown.delta,
                    instance: InstanceName::new("paragraph"),
                }]
            }),
        );

        let commands = registry.run_staged_chunk_shown(&info(), None);
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], HookCommand::SelectInstance { .. }));
        assert!(matches!(commands[1], HookCommand::HideCancel { .. }));
    }

    #[test]
    fn test_render_unknown_type() {
        let registry = PluginRegistry::with_builtin();
        let configuration = Configuration::new();
        let field = FieldName::new("body");
        let langcode = LangCode::undefined();
        let settings = InstanceTypeSettings::default();
        let request = RenderRequest {
            configuration: &configuration,
            field: &field,
            langcode: &langcode,
            delta: Delta::new(0),
            settings: &settings,
        };
        assert!(registry.render(&ChunkTypeId::new("image"), &request).is_none());
        assert!(registry.render(&ChunkTypeId::new("text"), &request).is_some());
    }

    #[test]
    fn test_editor_attach_detach_once() {
        let mut registry = PluginRegistry::new();
        let editor = RecordingEditor::default();
        let calls = editor.calls.clone();
        registry.register_editor("p", editor);

        let target = EditorTarget {
            field: FieldName::new("body"),
            delta: Delta::new(1),
        };
        let p = ChunkTypeId::new("p");
        assert!(registry.attach_editor(&p, &target));
        assert!(!registry.attach_editor(&p, &target));
        assert!(registry.is_editor_attached(&target));
        assert!(registry.detach_editor(&target));
        assert!(!registry.detach_editor(&target));
        assert_eq!(*calls.borrow(), vec!["attach 1", "detach 1"]);
    }

    #[test]
    fn test_attach_without_editor() {
        let mut registry = PluginRegistry::new();
        let target = EditorTarget {
            field: FieldName::new("body"),
            delta: Delta::new(0),
        };
        assert!(!registry.attach_editor(&ChunkTypeId::new("p"), &target));
        assert_eq!(registry.attached_editor_count(), 0);
    }
}

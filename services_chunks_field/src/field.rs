//! One chunks field
//!
//! `ChunksField` owns the chunks of a field together with everything that
//! must stay consistent across server round trips: the active chunk, the
//! staging claims, the request queue and the configuration snapshots.

use crate::action_queue::ActionQueue;
use crate::audit::WidgetEvent;
use crate::chunk::{read_configuration, write_configuration, Chunk, ChunkAction};
use crate::config_cache::ConfigCache;
use crate::env::FieldEnv;
use crate::error::ChunksError;
use crate::ordering;
use crate::server::{FieldFormState, ServerOperation};
use crate::staging::{AddOrigin, Claim, StagingQueue};
use chunk_plugins::{ConfigEvent, EditorTarget, EnterBehavior, HookCommand, RenderRequest};
use chunk_types::{
    ChunkView, Delta, FieldName, FieldSettings, FocusTarget, InstanceName, Key, KeyPhase,
    KeyPress, LangCode, NodeId, RequestId, RowKey, TicketId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use widget_dom::{ChunkRow, DeferredFocus, FieldContainer, Handler, RowAnchor};

/// Field-level operations that need a server round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldAction {
    ServerPreview { delta: Delta },
    RequestAdd { origin: AddOrigin },
}

impl FieldAction {
    pub fn label(&self) -> String {
        match self {
            FieldAction::ServerPreview { delta } => format!("preview {}", delta),
            FieldAction::RequestAdd { origin } => format!("add {}", origin),
        }
    }

    /// The same action against renumbered chunks
    pub fn renumbered(&self, map: impl Fn(Delta) -> Delta) -> Self {
        match *self {
            FieldAction::ServerPreview { delta } => FieldAction::ServerPreview { delta: map(delta) },
            FieldAction::RequestAdd { origin } => FieldAction::RequestAdd {
                origin: origin.renumbered(map),
            },
        }
    }
}

/// What happened to a key pressed on an instance option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The widget consumed the key
    Handled,
    /// The key falls through to default behavior
    Default,
}

/// What happened to a key pressed inside an editing surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorKeyOutcome {
    Default,
    Suppressed,
    /// The key was replaced by this markup
    InsertedMarkup(String),
    /// A chunk was requested after this one
    AddedChunk,
}

#[derive(Debug)]
pub struct ChunksField {
    name: FieldName,
    langcode: LangCode,
    settings: FieldSettings,
    container_node: Option<NodeId>,
    chunks: BTreeMap<Delta, Chunk>,
    active: Option<Delta>,
    staging: StagingQueue,
    /// Add to fire once the current response settles
    follow_up: Option<AddOrigin>,
    /// Instances to select on chunks shown for these claims
    auto_select: VecDeque<(TicketId, InstanceName)>,
    actions: ActionQueue<FieldAction>,
    config_cache: ConfigCache,
    /// Visible position of a freshly added chunk awaiting focus
    new_chunk_index: Option<usize>,
    /// Rows removed while a request was in flight, with the number of
    /// requests dispatched before the removal
    removed: BTreeMap<RowKey, u64>,
    /// Requests dispatched so far
    dispatches: u64,
    /// Dispatch number of the in-flight request
    in_flight_dispatch: Option<u64>,
}

impl ChunksField {
    pub fn new(container: &FieldContainer) -> Self {
        Self {
            name: container.field_name.clone(),
            langcode: container.langcode.clone(),
            settings: container.settings.clone(),
            container_node: None,
            chunks: BTreeMap::new(),
            active: None,
            staging: StagingQueue::new(),
            follow_up: None,
            auto_select: VecDeque::new(),
            actions: ActionQueue::new(),
            config_cache: ConfigCache::new(),
            new_chunk_index: None,
            removed: BTreeMap::new(),
            dispatches: 0,
            in_flight_dispatch: None,
        }
    }

    /// Creates the field for a mounted container and builds its chunks
    pub fn attach(name: &FieldName, env: &mut FieldEnv<'_>) -> Result<Self, ChunksError> {
        let container = env.document.require(name)?;
        let mut field = Self::new(container);
        field.retrieve_chunks(env)?;
        Ok(field)
    }

    /// Takes settings from a re-rendered container, follows renumbered
    /// rows and flags every chunk for rebinding
    pub fn refresh(&mut self, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let container = env.document.require(&self.name)?;
        self.langcode = container.langcode.clone();
        self.settings = container.settings.clone();
        self.match_rows(env)?;
        for chunk in self.chunks.values_mut() {
            chunk.mark_pending_reset();
        }
        Ok(())
    }

    pub fn name(&self) -> &FieldName {
        &self.name
    }

    pub fn langcode(&self) -> &LangCode {
        &self.langcode
    }

    pub fn settings(&self) -> &FieldSettings {
        &self.settings
    }

    pub fn get(&self, delta: Delta) -> Option<&Chunk> {
        self.chunks.get(&delta)
    }

    pub fn chunk(&self, delta: Delta) -> Result<&Chunk, ChunksError> {
        self.chunks.get(&delta).ok_or_else(|| ChunksError::ChunkNotFound {
            field: self.name.clone(),
            delta,
        })
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn active_chunk(&self) -> Option<Delta> {
        self.active
    }

    /// Delta of the chunk in staged view
    pub fn staged_delta(&self) -> Option<Delta> {
        self.chunks
            .values()
            .find(|c| c.view() == ChunkView::Staged)
            .map(|c| c.delta())
    }

    pub fn claims(&self) -> Vec<Claim> {
        self.staging.claims().copied().collect()
    }

    pub fn is_loading_staged(&self) -> bool {
        self.staging.is_loading()
    }

    pub fn follow_up(&self) -> Option<AddOrigin> {
        self.follow_up
    }

    pub fn is_busy(&self) -> bool {
        self.actions.is_busy()
    }

    /// Request this field is waiting on
    pub fn in_flight(&self) -> Option<RequestId> {
        self.actions.in_flight().map(|f| f.request)
    }

    pub fn queued_actions(&self) -> Vec<&str> {
        self.actions.pending_labels()
    }

    pub fn config_cache(&self) -> &ConfigCache {
        &self.config_cache
    }

    /// Delta of the chunk whose row is the rendered node `node`
    pub fn delta_for_node(&self, node: NodeId) -> Option<Delta> {
        self.chunks
            .values()
            .find(|c| c.node() == node)
            .map(|c| c.delta())
    }

    pub fn container_node(&self) -> Option<NodeId> {
        self.container_node
    }

    // ---- activation ----

    /// Makes `delta` the only active chunk
    pub fn set_active_chunk(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        if !self.chunks.contains_key(&delta) {
            return Err(self.not_found(delta));
        }
        for (d, chunk) in self.chunks.iter_mut() {
            chunk.set_active(*d == delta);
        }
        if let Some(container) = env.document.container_mut(&self.name) {
            for row in container.rows.iter_mut() {
                row.active = row.delta == delta;
            }
        }
        self.active = Some(delta);
        env.record(WidgetEvent::ChunkActivated {
            field: self.name.clone(),
            delta,
        });
        Ok(())
    }

    pub fn deactivate_chunks(&mut self, env: &mut FieldEnv<'_>) {
        for chunk in self.chunks.values_mut() {
            chunk.set_active(false);
        }
        if let Some(container) = env.document.container_mut(&self.name) {
            for row in container.rows.iter_mut() {
                row.active = false;
            }
        }
        self.active = None;
        env.record(WidgetEvent::ChunksDeactivated {
            field: self.name.clone(),
        });
    }

    // ---- adding ----

    pub fn add_after(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<Claim, ChunksError> {
        self.chunk(delta)?.check(ChunkAction::AddAfter)?;
        self.request_add(AddOrigin::After(delta), None, env)
    }

    pub fn add_before(&mut self, env: &mut FieldEnv<'_>) -> Result<Claim, ChunksError> {
        self.request_add(AddOrigin::Before, None, env)
    }

    fn request_add(
        &mut self,
        origin: AddOrigin,
        auto_select: Option<InstanceName>,
        env: &mut FieldEnv<'_>,
    ) -> Result<Claim, ChunksError> {
        let claim = self.staging.claim(origin);
        env.record(WidgetEvent::Claimed {
            field: self.name.clone(),
            ticket: claim.ticket,
            origin,
        });
        if let Some(instance) = auto_select {
            self.auto_select.push_back((claim.ticket, instance));
        }
        self.deactivate_chunks(env);
        self.try_redeem(env)?;
        Ok(claim)
    }

    /// Redeems the head-of-line claim if a staged chunk is available
    ///
    /// Nothing is promoted while any request is in flight: its response
    /// re-renders the rows in the order they had when it was issued.
    fn try_redeem(&mut self, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let Some(head) = self.staging.head().copied() else {
            self.refresh_indicators(env);
            return Ok(());
        };

        if self.staging.is_loading() || self.actions.is_busy() {
            self.record_follow_up(env);
        } else if let Some(staged) = self.staged_delta() {
            self.staging.redeem_head();
            self.show_staged_chunk(staged, head, env)?;
            // The add commits the shown chunk and stages the next one.
            self.staging.set_loading(true);
            self.submit(FieldAction::RequestAdd { origin: head.origin }, env);
            if !self.staging.is_empty() {
                self.record_follow_up(env);
            }
        } else {
            self.staging.set_loading(true);
            self.submit(FieldAction::RequestAdd { origin: head.origin }, env);
            self.record_follow_up(env);
        }

        self.refresh_indicators(env);
        Ok(())
    }

    fn record_follow_up(&mut self, env: &mut FieldEnv<'_>) {
        if self.follow_up.is_some() {
            return;
        }
        if let Some(head) = self.staging.head() {
            self.follow_up = Some(head.origin);
            env.record(WidgetEvent::FollowUpRecorded {
                field: self.name.clone(),
                origin: head.origin,
            });
        }
    }

    /// Fires the add recorded while a request was outstanding
    ///
    /// Returns false if nothing was recorded or the staged fetch is still
    /// in flight; the record then stays for the next settle.
    pub fn fire_follow_up(&mut self, env: &mut FieldEnv<'_>) -> Result<bool, ChunksError> {
        if self.staging.is_loading() {
            return Ok(false);
        }
        let Some(origin) = self.follow_up.take() else {
            return Ok(false);
        };
        env.record(WidgetEvent::FollowUpFired {
            field: self.name.clone(),
            origin,
        });
        self.clear_indicators(env);
        self.try_redeem(env)?;
        Ok(true)
    }

    /// Promotes the staged chunk for `claim`
    fn show_staged_chunk(
        &mut self,
        staged: Delta,
        claim: Claim,
        env: &mut FieldEnv<'_>,
    ) -> Result<(), ChunksError> {
        let anchor = self.resolve_anchor(claim.origin, env)?;
        self.change_view(staged, ChunkAction::Show, env)?;

        {
            let container = env.document.require_mut(&self.name)?;
            if let Some(row) = container.row_mut(staged) {
                row.staged_class = false;
            }
            container.move_row(staged, anchor);
            ordering::reset_weights(container);
            ordering::reset_stripes(container);
            self.new_chunk_index = container.visible_position(staged);
        }
        env.record(WidgetEvent::Redeemed {
            field: self.name.clone(),
            ticket: claim.ticket,
            origin: claim.origin,
            delta: staged,
        });

        self.set_active_chunk(staged, env)?;
        env.document.defer_focus(DeferredFocus::FirstInstanceOption {
            field: self.name.clone(),
            delta: staged,
        });

        let unlimited = self.settings.unlimited;
        let shown = self.chunk(staged)?.info(&self.name, &self.langcode, unlimited);
        let origin = match claim.origin {
            AddOrigin::After(delta) => self
                .chunks
                .get(&delta)
                .map(|c| c.info(&self.name, &self.langcode, unlimited)),
            AddOrigin::Before => None,
        };
        let commands = env.plugins.run_staged_chunk_shown(&shown, origin.as_ref());
        self.apply_commands(commands, env);

        if self.auto_select.front().map(|(t, _)| *t) == Some(claim.ticket) {
            if let Some((_, instance)) = self.auto_select.pop_front() {
                if let Err(err) = self.select_instance(staged, instance, env) {
                    log::warn!("auto-select on {} failed: {}", staged, err);
                }
            }
        }
        Ok(())
    }

    /// Where a chunk requested from `origin` is inserted
    ///
    /// An origin row that has disappeared falls back to the end of the
    /// visible rows.
    fn resolve_anchor(&self, origin: AddOrigin, env: &FieldEnv<'_>) -> Result<RowAnchor, ChunksError> {
        let container = env.document.require(&self.name)?;
        let delta = match origin {
            AddOrigin::Before => return Ok(RowAnchor::Start),
            AddOrigin::After(delta) => delta,
        };
        if container.row(delta).map(|r| r.visible).unwrap_or(false) {
            return Ok(RowAnchor::After(delta));
        }
        log::debug!("add origin {} is gone, appending instead", delta);
        Ok(match container.visible_rows().last() {
            Some(row) => RowAnchor::After(row.delta),
            None => RowAnchor::Start,
        })
    }

    fn clear_indicators(&self, env: &mut FieldEnv<'_>) {
        if let Some(container) = env.document.container_mut(&self.name) {
            container.add_before_progress = None;
            for row in container.rows.iter_mut() {
                row.progress = None;
            }
        }
    }

    /// Shows a progress indicator at the origin of every outstanding claim
    fn refresh_indicators(&self, env: &mut FieldEnv<'_>) {
        self.clear_indicators(env);
        let message = env.progress_message.to_string();
        let Some(container) = env.document.container_mut(&self.name) else {
            return;
        };
        for claim in self.staging.claims() {
            match claim.origin {
                AddOrigin::Before => container.add_before_progress = Some(message.clone()),
                AddOrigin::After(delta) => {
                    if let Some(row) = container.row_mut(delta) {
                        row.progress = Some(message.clone());
                    }
                }
            }
        }
    }

    // ---- chunk operations ----

    /// Selects an instance on a chunk in instance selection
    pub fn select_instance(
        &mut self,
        delta: Delta,
        instance: InstanceName,
        env: &mut FieldEnv<'_>,
    ) -> Result<(), ChunksError> {
        let config = self
            .settings
            .instance(&instance)
            .cloned()
            .ok_or_else(|| ChunksError::UnknownInstance(instance.clone()))?;
        self.chunk(delta)?.check(ChunkAction::SelectInstance)?;

        {
            let row = env.document.row_mut(&self.name, delta)?;
            row.instance = Some(instance.clone());
            if config.settings.preview_on_client {
                row.preview_submits = false;
                if config.module.is_some() {
                    row.module = config.module.clone();
                }
            }
        }
        let chunk_type = config.chunk_type.clone();
        if let Some(chunk) = self.chunks.get_mut(&delta) {
            chunk.set_instance(instance, chunk_type.clone());
        }

        self.change_view(delta, ChunkAction::SelectInstance, env)?;
        if self.new_chunk_index.is_some() {
            self.new_chunk_index = None;
        }
        self.set_active_chunk(delta, env)?;
        self.save_config(delta, env)?;
        self.attach_editor(delta, env);
        env.document.defer_focus(DeferredFocus::FirstVisibleControl {
            field: self.name.clone(),
            delta,
            chunk_type,
        });
        Ok(())
    }

    /// Leaves configuration for preview
    ///
    /// Client-rendered instances render immediately; all others go through
    /// the request queue.
    pub fn preview(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        self.chunk(delta)?.check(ChunkAction::Preview)?;
        self.save_config(delta, env)?;
        if let Some(snapshot) = self.config_cache.take(delta) {
            if let Some(chunk) = self.chunks.get_mut(&delta) {
                chunk.commit_configuration(snapshot);
            }
        }

        let chunk = self.chunk(delta)?;
        let client_rendered = chunk
            .instance()
            .map(|i| self.settings.previews_on_client(i))
            .unwrap_or(false);

        if client_rendered {
            let markup = self.render_client_preview(delta, env)?;
            env.document.row_mut(&self.name, delta)?.preview_markup = markup.clone();
            if let Some(chunk) = self.chunks.get_mut(&delta) {
                chunk.set_client_preview(Some(markup));
            }
            self.change_view(delta, ChunkAction::Preview, env)?;
            env.record(WidgetEvent::ClientPreviewRendered {
                field: self.name.clone(),
                delta,
            });
        } else {
            self.change_view(delta, ChunkAction::Preview, env)?;
            if let Some(chunk) = self.chunks.get_mut(&delta) {
                chunk.set_preview_loading(true);
            }
            self.submit(FieldAction::ServerPreview { delta }, env);
        }

        self.hide_cancel(delta, env);
        self.detach_editor(delta, env);
        self.set_active_chunk(delta, env)?;
        env.document.row_mut(&self.name, delta)?.pressed = None;
        env.document
            .defer_focus(DeferredFocus::Target(FocusTarget::AddAfter {
                field: self.name.clone(),
                delta,
            }));
        Ok(())
    }

    fn render_client_preview(&self, delta: Delta, env: &FieldEnv<'_>) -> Result<String, ChunksError> {
        let chunk = self.chunk(delta)?;
        let (Some(chunk_type), Some(instance)) = (chunk.chunk_type(), chunk.instance()) else {
            return Ok(String::new());
        };
        let settings = self
            .settings
            .instance(instance)
            .map(|i| i.settings.clone())
            .unwrap_or_default();
        let request = RenderRequest {
            configuration: chunk.configuration(),
            field: &self.name,
            langcode: &self.langcode,
            delta,
            settings: &settings,
        };
        Ok(env.plugins.render(chunk_type, &request).unwrap_or_else(|| {
            log::warn!("no client renderer registered for {}", chunk_type);
            String::new()
        }))
    }

    /// Re-enters configuration from preview and shows Cancel
    pub fn edit(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        self.change_view(delta, ChunkAction::Edit, env)?;
        if let Some(chunk) = self.chunks.get_mut(&delta) {
            chunk.set_cancel_visible(true);
        }
        env.document.row_mut(&self.name, delta)?.cancel_visible = true;

        self.save_config(delta, env)?;
        self.attach_editor(delta, env);
        self.set_active_chunk(delta, env)?;
        if let Some(chunk_type) = self.chunk(delta)?.chunk_type().cloned() {
            env.document.defer_focus(DeferredFocus::FirstVisibleControl {
                field: self.name.clone(),
                delta,
                chunk_type,
            });
        }
        Ok(())
    }

    /// Abandons edits and returns to the previous preview
    pub fn cancel(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let chunk = self.chunk(delta)?;
        if !chunk.cancel_visible() {
            return Err(ChunksError::InvalidTransition {
                delta,
                from: chunk.view(),
                action: ChunkAction::Cancel,
            });
        }
        chunk.check(ChunkAction::Cancel)?;

        self.restore_config(delta, env)?;
        self.config_cache.discard(delta);
        self.change_view(delta, ChunkAction::Cancel, env)?;
        self.hide_cancel(delta, env);
        self.detach_editor(delta, env);
        self.set_active_chunk(delta, env)?;
        env.document
            .defer_focus(DeferredFocus::Target(FocusTarget::AddAfter {
                field: self.name.clone(),
                delta,
            }));
        Ok(())
    }

    /// Hides a chunk and discards its client state
    pub fn remove(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        self.chunk(delta)?.check(ChunkAction::Remove)?;

        let focus = {
            let container = env.document.require(&self.name)?;
            match container.previous_visible(delta) {
                Some(previous) => FocusTarget::AddAfter {
                    field: self.name.clone(),
                    delta: previous,
                },
                None => FocusTarget::AddBefore {
                    field: self.name.clone(),
                },
            }
        };

        self.change_view(delta, ChunkAction::Remove, env)?;
        self.detach_editor(delta, env);
        self.config_cache.discard(delta);
        if let Some(chunk) = self.chunks.remove(&delta) {
            env.document.bindings_mut().unbind_node(chunk.node());
            if self.actions.is_busy() {
                // The in-flight request still carries this row unremoved.
                self.removed.insert(chunk.key(), self.dispatches);
            }
        }
        if self.active == Some(delta) {
            self.active = None;
        }
        self.new_chunk_index = None;

        {
            let container = env.document.require_mut(&self.name)?;
            if let Some(row) = container.row_mut(delta) {
                row.active = false;
                row.cancel_visible = false;
                row.progress = None;
            }
            ordering::reset_weights(container);
            ordering::reset_stripes(container);
        }
        env.record(WidgetEvent::ChunkDropped {
            field: self.name.clone(),
            delta,
        });
        env.document.defer_focus(DeferredFocus::Target(focus));
        Ok(())
    }

    /// Rolls a chunk back to instance selection without a round trip
    pub fn reset(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        self.chunk(delta)?.check(ChunkAction::Reset)?;

        self.detach_editor(delta, env);
        self.config_cache.discard(delta);
        if let Some(chunk) = self.chunks.get_mut(&delta) {
            chunk.clear_instance();
            chunk.set_cancel_visible(false);
            chunk.set_preview_loading(false);
        }
        {
            let row = env.document.row_mut(&self.name, delta)?;
            row.instance = None;
            row.module = None;
            row.preview_markup.clear();
            row.cancel_visible = false;
            row.preview_submits = true;
        }
        self.change_view(delta, ChunkAction::Reset, env)?;
        self.set_active_chunk(delta, env)?;
        env.document.defer_focus(DeferredFocus::FirstInstanceOption {
            field: self.name.clone(),
            delta,
        });
        Ok(())
    }

    /// Keyboard handling on an instance option
    ///
    /// Navigation keys move between sibling options; with no sibling the
    /// key falls through. Enter selects on key-up and never submits.
    pub fn handle_instance_key(
        &mut self,
        delta: Delta,
        instance: &InstanceName,
        key: KeyPress,
        env: &mut FieldEnv<'_>,
    ) -> Result<KeyOutcome, ChunksError> {
        self.chunk(delta)?;
        if key.key == Key::Enter {
            if key.phase == KeyPhase::Up {
                self.select_instance(delta, instance.clone(), env)?;
            }
            return Ok(KeyOutcome::Handled);
        }
        if key.phase != KeyPhase::Down {
            return Ok(KeyOutcome::Default);
        }

        let row = env
            .document
            .require(&self.name)?
            .row(delta)
            .ok_or_else(|| ChunksError::RowNotFound {
                field: self.name.clone(),
                delta,
            })?;
        let sibling = if key.is_navigate_next() {
            row.next_option(instance).cloned()
        } else if key.is_navigate_previous() {
            row.previous_option(instance).cloned()
        } else {
            None
        };

        match sibling {
            Some(sibling) => {
                env.document
                    .defer_focus(DeferredFocus::Target(FocusTarget::InstanceOption {
                        field: self.name.clone(),
                        delta,
                        instance: sibling,
                    }));
                Ok(KeyOutcome::Handled)
            }
            None => Ok(KeyOutcome::Default),
        }
    }

    /// Enter handling inside a chunk's editing surface
    pub fn handle_editor_key(
        &mut self,
        delta: Delta,
        key: KeyPress,
        env: &mut FieldEnv<'_>,
    ) -> Result<EditorKeyOutcome, ChunksError> {
        let chunk = self.chunk(delta)?;
        if key.key != Key::Enter || key.phase != KeyPhase::Down {
            return Ok(EditorKeyOutcome::Default);
        }
        let Some(chunk_type) = chunk.chunk_type() else {
            return Ok(EditorKeyOutcome::Default);
        };
        let contract = env.plugins.contract(chunk_type);

        if key.shift && contract.shift_enter_adds_chunk && self.settings.unlimited {
            if let Some(instance) = chunk.instance().cloned() {
                chunk.check(ChunkAction::AddAfter)?;
                self.request_add(AddOrigin::After(delta), Some(instance), env)?;
                return Ok(EditorKeyOutcome::AddedChunk);
            }
        }

        Ok(match contract.enter {
            EnterBehavior::Default => EditorKeyOutcome::Default,
            EnterBehavior::Suppress => EditorKeyOutcome::Suppressed,
            EnterBehavior::InsertLineBreak(markup) => EditorKeyOutcome::InsertedMarkup(markup),
        })
    }

    // ---- configuration cache ----

    /// Snapshots a chunk's configuration controls
    pub fn save_config(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let Some(chunk_type) = self.chunk(delta)?.chunk_type().cloned() else {
            return Ok(());
        };
        let snapshot = {
            let container = env.document.require(&self.name)?;
            let row = container.row(delta).ok_or_else(|| ChunksError::RowNotFound {
                field: self.name.clone(),
                delta,
            })?;
            read_configuration(row, &chunk_type)
        };
        env.plugins.run_save_config(
            &chunk_type,
            &ConfigEvent {
                field: &self.name,
                langcode: &self.langcode,
                delta,
                configuration: &snapshot,
            },
        );
        self.config_cache.save(delta, snapshot);
        env.record(WidgetEvent::ConfigSaved {
            field: self.name.clone(),
            delta,
        });
        Ok(())
    }

    /// Writes the snapshot back into the configuration controls
    ///
    /// Returns false if there is no snapshot. The snapshot is kept.
    pub fn restore_config(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<bool, ChunksError> {
        let Some(chunk_type) = self.chunk(delta)?.chunk_type().cloned() else {
            return Ok(false);
        };
        let Some(snapshot) = self.config_cache.get(delta).cloned() else {
            return Ok(false);
        };
        write_configuration(env.document.row_mut(&self.name, delta)?, &chunk_type, &snapshot);
        let commands = env.plugins.run_restore_config(
            &chunk_type,
            &ConfigEvent {
                field: &self.name,
                langcode: &self.langcode,
                delta,
                configuration: &snapshot,
            },
        );
        env.record(WidgetEvent::ConfigRestored {
            field: self.name.clone(),
            delta,
        });
        self.apply_commands(commands, env);
        Ok(true)
    }

    // ---- reconciliation ----

    /// Brings client chunks in line with the rendered rows
    ///
    /// New rows get a chunk. Chunks flagged for reset are rebound to their
    /// new row and resume their view, unless a server preview is still
    /// loading for them. Chunks whose rows vanished are dropped.
    pub fn retrieve_chunks(&mut self, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let container_node = env.document.require(&self.name)?.node;
        if self.container_node != Some(container_node) {
            if let Some(old) = self.container_node.replace(container_node) {
                env.document.bindings_mut().unbind_node(old);
            }
            env.document
                .bindings_mut()
                .bind(container_node, Handler::AddBefore);
        }

        self.match_rows(env)?;
        let rows = env.document.require(&self.name)?.rows.clone();
        let present: BTreeSet<Delta> = rows.iter().map(|r| r.delta).collect();
        self.config_cache.retain(|d| present.contains(&d));

        for row in &rows {
            self.prepare_row(row, env);
            let state = self
                .chunks
                .get(&row.delta)
                .map(|c| (c.is_pending_reset(), c.is_preview_loading()));
            match state {
                None if row.view == ChunkView::Removed => {}
                None if self.removed.contains_key(&row.key) => {
                    self.suppress_removed_row(row.delta, env)?
                }
                None => self.construct_chunk(row, env)?,
                Some((_, true)) => self.mirror_waiting_chunk(row.delta, env),
                Some((true, false)) => self.resume_chunk(row, env)?,
                Some((false, false)) => {}
            }
        }

        {
            let container = env.document.require_mut(&self.name)?;
            ordering::reset_weights(container);
            ordering::reset_stripes(container);
        }
        self.refresh_indicators(env);
        Ok(())
    }

    /// Matches chunks to the rows of the mounted container
    ///
    /// Rows are matched by key. A chunk whose key no row carries takes the
    /// row at its own delta when that row's key is new, as after a fresh
    /// page load. Chunks the server renumbered follow their rows, along
    /// with everything keyed by their delta. Chunks left without a row are
    /// dropped.
    fn match_rows(&mut self, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let rows: Vec<(RowKey, Delta)> = env
            .document
            .require(&self.name)?
            .rows
            .iter()
            .map(|r| (r.key, r.delta))
            .collect();
        let known: BTreeSet<RowKey> = self.chunks.values().map(|c| c.key()).collect();

        let removed = &self.removed;
        let mut moves: BTreeMap<Delta, Delta> = BTreeMap::new();
        let mut vanished = Vec::new();
        for chunk in self.chunks.values_mut() {
            let (own_key, at) = (chunk.key(), chunk.delta());
            let by_key = rows.iter().find(|(key, _)| *key == own_key).map(|r| r.1);
            let matched = by_key.or_else(|| {
                let (key, delta) = *rows.iter().find(|(key, delta)| {
                    *delta == at && !known.contains(key) && !removed.contains_key(key)
                })?;
                chunk.adopt_key(key);
                Some(delta)
            });
            match matched {
                Some(to) if to != at => {
                    moves.insert(at, to);
                }
                Some(_) => {}
                None => vanished.push(at),
            }
        }
        for delta in vanished {
            self.drop_chunk(delta, env);
        }
        if moves.is_empty() {
            return Ok(());
        }

        let remap = |delta: Delta| moves.get(&delta).copied().unwrap_or(delta);
        let mut reattach = Vec::new();
        for (&from, &to) in &moves {
            let target = self.editor_target(from);
            if env.plugins.is_editor_attached(&target) {
                env.plugins.detach_editor(&target);
                reattach.push(to);
            }
            log::debug!("{}: chunk {} renumbered to {}", self.name, from, to);
            env.record(WidgetEvent::ChunkRenumbered {
                field: self.name.clone(),
                from,
                to,
            });
        }

        self.chunks = std::mem::take(&mut self.chunks)
            .into_iter()
            .map(|(delta, mut chunk)| {
                let to = remap(delta);
                chunk.renumber(to);
                (to, chunk)
            })
            .collect();
        self.active = self.active.map(&remap);
        self.follow_up = self.follow_up.map(|origin| origin.renumbered(&remap));
        self.staging.renumber(&remap);
        self.config_cache.renumber(&remap);
        self.actions
            .map_actions(|action| action.renumbered(&remap), FieldAction::label);
        for delta in reattach {
            self.attach_editor(delta, env);
        }
        Ok(())
    }

    /// Keeps a row removed on the client hidden when a render issued
    /// before the removal brings it back
    fn suppress_removed_row(&self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let row = env.document.row_mut(&self.name, delta)?;
        row.view = ChunkView::Removed;
        row.visible = false;
        row.active = false;
        row.cancel_visible = false;
        row.progress = None;
        env.record(WidgetEvent::RemovedRowSuppressed {
            field: self.name.clone(),
            delta,
        });
        Ok(())
    }

    /// Makes server-loaded rows draggable once
    fn prepare_row(&self, row: &ChunkRow, env: &mut FieldEnv<'_>) {
        if !row.ajax_loaded || row.draggable {
            return;
        }
        if let Ok(row) = env.document.row_mut(&self.name, row.delta) {
            row.draggable = true;
        }
        env.record(WidgetEvent::RowPrepared {
            field: self.name.clone(),
            delta: row.delta,
        });
    }

    fn construct_chunk(&mut self, row: &ChunkRow, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let delta = row.delta;
        let chunk = Chunk::from_row(row, &self.settings);
        let view = chunk.view();
        let client_rendered = chunk
            .instance()
            .map(|i| self.settings.previews_on_client(i))
            .unwrap_or(false);
        env.document
            .bindings_mut()
            .bind_all(row.node, &Handler::CHUNK_HANDLERS);
        if chunk.is_active() {
            self.active = Some(delta);
        }
        self.chunks.insert(delta, chunk);
        env.record(WidgetEvent::ChunkCreated {
            field: self.name.clone(),
            delta,
            view,
        });

        {
            let row = env.document.row_mut(&self.name, delta)?;
            if view == ChunkView::Staged {
                row.visible = false;
            }
            if client_rendered {
                row.preview_submits = false;
            }
        }
        if view == ChunkView::Configuration {
            self.save_config(delta, env)?;
            self.attach_editor(delta, env);
        }

        let chunk = self.chunk(delta)?;
        if let Some(chunk_type) = chunk.chunk_type().cloned() {
            let info = chunk.info(&self.name, &self.langcode, self.settings.unlimited);
            let commands = env.plugins.run_initialize(&chunk_type, &info);
            self.apply_commands(commands, env);
        }

        self.restore_focus(delta, env);
        if row.has_errors() {
            self.force_configuration(delta, env)?;
        }
        Ok(())
    }

    fn resume_chunk(&mut self, row: &ChunkRow, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let delta = row.delta;
        let Some(chunk) = self.chunks.get_mut(&delta) else {
            return Ok(());
        };
        let old = chunk.rebind(row.node);
        let bindings = env.document.bindings_mut();
        bindings.unbind_node(old);
        bindings.bind_all(row.node, &Handler::CHUNK_HANDLERS);

        let client_rendered = chunk
            .instance()
            .map(|i| self.settings.previews_on_client(i))
            .unwrap_or(false);
        {
            let live = env.document.row_mut(&self.name, delta)?;
            live.view = chunk.view();
            live.visible = chunk.view().is_visible();
            live.active = chunk.is_active();
            live.cancel_visible = chunk.cancel_visible();
            live.instance = chunk.instance().cloned();
            if live.preview_markup.is_empty() {
                if let Some(markup) = chunk.client_preview() {
                    live.preview_markup = markup.to_string();
                }
            }
            if client_rendered {
                live.preview_submits = false;
            }
        }
        env.record(WidgetEvent::ChunkRebound {
            field: self.name.clone(),
            delta,
        });

        self.restore_focus(delta, env);
        if row.has_errors() {
            self.force_configuration(delta, env)?;
        }
        Ok(())
    }

    /// Keeps the submitted view of a chunk awaiting its preview in line
    /// without rebinding it
    fn mirror_waiting_chunk(&self, delta: Delta, env: &mut FieldEnv<'_>) {
        log::debug!("chunk {} awaits its preview, left untouched", delta);
        let Some(chunk) = self.chunks.get(&delta) else {
            return;
        };
        if let Ok(row) = env.document.row_mut(&self.name, delta) {
            row.view = chunk.view();
            row.visible = chunk.view().is_visible();
        }
    }

    fn drop_chunk(&mut self, delta: Delta, env: &mut FieldEnv<'_>) {
        let Some(chunk) = self.chunks.remove(&delta) else {
            return;
        };
        env.document.bindings_mut().unbind_node(chunk.node());
        self.detach_editor(delta, env);
        if self.active == Some(delta) {
            self.active = None;
        }
        env.record(WidgetEvent::ChunkDropped {
            field: self.name.clone(),
            delta,
        });
    }

    /// Moves focus back after a render: into a freshly added chunk, or to
    /// the active chunk's add-after control
    fn restore_focus(&mut self, delta: Delta, env: &mut FieldEnv<'_>) {
        let visible_position = env
            .document
            .container(&self.name)
            .and_then(|c| c.visible_position(delta));
        if self.new_chunk_index.is_some() && self.new_chunk_index == visible_position {
            self.new_chunk_index = None;
            env.document.defer_focus(DeferredFocus::FirstInstanceOption {
                field: self.name.clone(),
                delta,
            });
            return;
        }
        if self.chunks.get(&delta).map(|c| c.is_active()).unwrap_or(false) {
            env.document
                .defer_focus(DeferredFocus::Target(FocusTarget::AddAfter {
                    field: self.name.clone(),
                    delta,
                }));
        }
    }

    /// Shows a chunk with server validation errors in configuration
    fn force_configuration(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> Result<(), ChunksError> {
        let Some(chunk) = self.chunks.get_mut(&delta) else {
            return Ok(());
        };
        let from = chunk.view();
        if !from.is_visible() {
            return Ok(());
        }
        if from != ChunkView::Configuration {
            chunk.force_view(ChunkView::Configuration);
            env.record(WidgetEvent::ViewChanged {
                field: self.name.clone(),
                delta,
                from,
                to: ChunkView::Configuration,
            });
        }
        {
            let row = env.document.row_mut(&self.name, delta)?;
            row.view = ChunkView::Configuration;
            row.visible = true;
        }
        env.record(WidgetEvent::ValidationErrors {
            field: self.name.clone(),
            delta,
        });
        self.save_config(delta, env)?;
        env.document.defer_focus(DeferredFocus::FirstErrorControl {
            field: self.name.clone(),
            delta,
        });
        Ok(())
    }

    /// Clears the preview-loading flag of a chunk whose preview arrived
    ///
    /// A signal for a chunk that no longer waits on a preview is stale and
    /// discarded.
    pub fn on_preview_loaded(&mut self, delta: Delta, env: &mut FieldEnv<'_>) -> bool {
        match self.chunks.get_mut(&delta) {
            Some(chunk) if chunk.is_preview_loading() => {
                chunk.set_preview_loading(false);
                env.record(WidgetEvent::PreviewLoaded {
                    field: self.name.clone(),
                    delta,
                });
                true
            }
            _ => {
                env.record(WidgetEvent::StaleSignalDiscarded {
                    field: self.name.clone(),
                    delta,
                });
                false
            }
        }
    }

    // ---- request serialization ----

    /// Dispatches an action now, or queues it behind the in-flight request
    fn submit(&mut self, action: FieldAction, env: &mut FieldEnv<'_>) {
        if self.actions.is_busy() {
            let label = action.label();
            self.actions.enqueue(label.clone(), action);
            env.record(WidgetEvent::ActionQueued {
                field: self.name.clone(),
                label,
            });
            return;
        }
        if !self.dispatch(action, env) {
            log::debug!("{} had nothing to do", action.label());
        }
    }

    /// Issues the request for an action, re-resolving it against current state
    fn dispatch(&mut self, action: FieldAction, env: &mut FieldEnv<'_>) -> bool {
        let operation = match action {
            FieldAction::ServerPreview { delta } => match self.chunks.get(&delta) {
                Some(chunk) if chunk.is_preview_loading() => ServerOperation::PreviewRender(delta),
                _ => return false,
            },
            FieldAction::RequestAdd {
                origin: AddOrigin::Before,
            } => ServerOperation::AddBefore,
            FieldAction::RequestAdd {
                origin: AddOrigin::After(delta),
            } => ServerOperation::AddAfter(delta),
        };
        let Some(container) = env.document.container(&self.name) else {
            return false;
        };
        let form = FieldFormState::capture(container);
        let request = env
            .outbox
            .issue(self.name.clone(), self.langcode.clone(), operation, form);
        self.actions.begin(request, action, env.now);
        self.dispatches += 1;
        self.in_flight_dispatch = Some(self.dispatches);
        env.record(WidgetEvent::RequestDispatched {
            field: self.name.clone(),
            request,
            operation,
        });
        true
    }

    /// Runs the next queued action; stale ones are skipped
    fn drain_next(&mut self, env: &mut FieldEnv<'_>) {
        while let Some(queued) = self.actions.next_action() {
            if self.dispatch(queued.action, env) {
                env.record(WidgetEvent::ActionDrained {
                    field: self.name.clone(),
                    label: queued.label,
                });
                return;
            }
            env.record(WidgetEvent::ActionDiscarded {
                field: self.name.clone(),
                label: queued.label,
            });
        }
    }

    /// Settles `request` if it is this field's, then releases one queued action
    pub fn on_request_settled(&mut self, request: RequestId, env: &mut FieldEnv<'_>) -> bool {
        let Some(settled) = self.actions.settle(request) else {
            return false;
        };
        if let FieldAction::RequestAdd { .. } = settled.action {
            self.staging.set_loading(false);
        }
        if let Some(issued) = self.in_flight_dispatch.take() {
            // This render carried every removal made before it was issued.
            self.removed.retain(|_, before| *before >= issued);
        }
        env.record(WidgetEvent::ResponseSettled {
            field: self.name.clone(),
            request,
        });
        self.drain_next(env);
        true
    }

    /// Abandons the in-flight request if it has outlived `timeout` ticks
    pub fn check_timeout(
        &mut self,
        timeout: u64,
        env: &mut FieldEnv<'_>,
    ) -> Result<Option<RequestId>, ChunksError> {
        let Some(expired) = self.actions.expire(env.now, timeout) else {
            return Ok(None);
        };
        log::warn!("{}: request {} timed out", self.name, expired.request);
        self.in_flight_dispatch = None;
        env.record(WidgetEvent::RequestTimedOut {
            field: self.name.clone(),
            request: expired.request,
        });

        match expired.action {
            FieldAction::RequestAdd { .. } => {
                self.staging.set_loading(false);
                self.record_follow_up(env);
            }
            FieldAction::ServerPreview { delta } => {
                if let Some(chunk) = self.chunks.get_mut(&delta) {
                    chunk.set_preview_loading(false);
                }
            }
        }
        self.clear_indicators(env);
        self.drain_next(env);
        if self.chunks.values().any(|c| c.is_pending_reset()) {
            self.retrieve_chunks(env)?;
        }
        Ok(Some(expired.request))
    }

    /// Unbinds every handler and releases all client state
    ///
    /// Returns the number of handlers unbound.
    pub fn teardown(&mut self, env: &mut FieldEnv<'_>) -> usize {
        let mut unbound = 0;
        if let Some(node) = self.container_node.take() {
            unbound += env.document.bindings_mut().unbind_node(node);
        }
        for (delta, chunk) in std::mem::take(&mut self.chunks) {
            unbound += env.document.bindings_mut().unbind_node(chunk.node());
            self.detach_editor(delta, env);
        }
        self.actions.clear();
        self.staging.clear();
        self.config_cache.clear();
        self.auto_select.clear();
        self.follow_up = None;
        self.active = None;
        self.new_chunk_index = None;
        self.removed.clear();
        self.in_flight_dispatch = None;
        unbound
    }

    // ---- helpers ----

    fn not_found(&self, delta: Delta) -> ChunksError {
        ChunksError::ChunkNotFound {
            field: self.name.clone(),
            delta,
        }
    }

    /// Applies an action to a chunk and mirrors the view into its row
    fn change_view(
        &mut self,
        delta: Delta,
        action: ChunkAction,
        env: &mut FieldEnv<'_>,
    ) -> Result<ChunkView, ChunksError> {
        let chunk = self
            .chunks
            .get_mut(&delta)
            .ok_or_else(|| ChunksError::ChunkNotFound {
                field: self.name.clone(),
                delta,
            })?;
        chunk.check(action)?;
        let row = env.document.row_mut(&self.name, delta)?;
        let from = chunk.view();
        let to = chunk.apply(action)?;
        row.view = to;
        row.visible = to.is_visible();
        env.record(WidgetEvent::ViewChanged {
            field: self.name.clone(),
            delta,
            from,
            to,
        });
        Ok(to)
    }

    fn hide_cancel(&mut self, delta: Delta, env: &mut FieldEnv<'_>) {
        if let Some(chunk) = self.chunks.get_mut(&delta) {
            chunk.set_cancel_visible(false);
        }
        if let Ok(row) = env.document.row_mut(&self.name, delta) {
            row.cancel_visible = false;
        }
    }

    fn editor_target(&self, delta: Delta) -> EditorTarget {
        EditorTarget {
            field: self.name.clone(),
            delta,
        }
    }

    fn attach_editor(&self, delta: Delta, env: &mut FieldEnv<'_>) {
        let Some(chunk) = self.chunks.get(&delta) else {
            return;
        };
        let (Some(chunk_type), Some(instance)) = (chunk.chunk_type(), chunk.instance()) else {
            return;
        };
        let in_place = self
            .settings
            .instance(instance)
            .map(|i| i.settings.edit_in_place)
            .unwrap_or(false);
        if in_place {
            env.plugins.attach_editor(chunk_type, &self.editor_target(delta));
        }
    }

    fn detach_editor(&self, delta: Delta, env: &mut FieldEnv<'_>) {
        env.plugins.detach_editor(&self.editor_target(delta));
    }

    fn apply_commands(&mut self, commands: Vec<HookCommand>, env: &mut FieldEnv<'_>) {
        for command in commands {
            match command {
                HookCommand::SelectInstance { delta, instance } => {
                    if let Err(err) = self.select_instance(delta, instance, env) {
                        log::warn!("hook instance selection failed: {}", err);
                    }
                }
                HookCommand::SetControlValue {
                    delta,
                    chunk_type,
                    property,
                    value,
                } => {
                    let applied = env
                        .document
                        .row_mut(&self.name, delta)
                        .map(|row| row.set_control_value(&chunk_type, &property, value))
                        .unwrap_or(false);
                    if !applied {
                        log::debug!("hook set {}[{}] on {}: no such control", chunk_type, property, delta);
                    }
                }
                HookCommand::HideCancel { delta } => self.hide_cancel(delta, env),
            }
        }
    }
}

//! The chunks widget controller
//!
//! `ChunksWidget` owns the document, the plugin registry, the field
//! registry and the request outbox for one form page. Everything that
//! crosses the page boundary goes through it: mounted fragments, user
//! gestures, server responses and clock ticks.

use crate::config::WidgetConfig;
use crate::error::WidgetError;
use crate::events::{DispatchOutcome, UiControl, UiEvent};
use crate::registry::FieldRegistry;
use chunk_plugins::PluginRegistry;
use chunk_types::{Activation, ChunkTypeId, Delta, FieldName, FocusTarget, RequestId};
use services_chunks_field::{
    AuditLog, ChunksField, FieldEnv, Outbox, ServerRequest, ServerResponse, Signal, WidgetEvent,
};
use widget_dom::{Document, FieldContainer, RowButton};

#[derive(Debug)]
pub struct ChunksWidget {
    config: WidgetConfig,
    fields: FieldRegistry,
    document: Document,
    plugins: PluginRegistry,
    outbox: Outbox,
    audit: AuditLog,
    /// Logical clock advanced by `tick`
    clock: u64,
}

impl ChunksWidget {
    /// Creates a widget with the built-in renderers and editing contracts
    pub fn new(config: WidgetConfig) -> Self {
        Self::with_plugins(config, PluginRegistry::with_builtin())
    }

    pub fn with_plugins(config: WidgetConfig, plugins: PluginRegistry) -> Self {
        Self {
            config,
            fields: FieldRegistry::new(),
            document: Document::new(),
            plugins,
            outbox: Outbox::new(),
            audit: AuditLog::new(),
            clock: 0,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn field(&self, name: &FieldName) -> Option<&ChunksField> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn container(&self, name: &FieldName) -> Option<&FieldContainer> {
        self.document.container(name)
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn focused(&self) -> Option<&FocusTarget> {
        self.document.focused()
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Processes freshly mounted field containers
    ///
    /// A field seen for the first time is created; a known field is
    /// updated in place so its queues and cached configuration survive.
    pub fn attach(&mut self, containers: Vec<FieldContainer>) -> Result<Vec<FieldName>, WidgetError> {
        let mut attached = Vec::with_capacity(containers.len());
        for container in containers {
            let name = container.field_name.clone();
            self.document.mount(container);
            self.sync_field(&name, true)?;
            attached.push(name);
        }
        self.document.settle();
        Ok(attached)
    }

    /// Creates or refreshes the field for a mounted container
    fn sync_field(&mut self, name: &FieldName, refresh: bool) -> Result<(), WidgetError> {
        let (fields, mut env) = self.split();
        match fields.get_mut(name) {
            Some(field) => {
                if refresh {
                    field.refresh(&mut env)?;
                }
                field.retrieve_chunks(&mut env)?;
                env.record(WidgetEvent::FieldUpdated {
                    field: name.clone(),
                });
            }
            None => {
                let field = ChunksField::attach(name, &mut env)?;
                log::info!("attached chunks field {}", name);
                fields.insert(field);
                env.record(WidgetEvent::FieldAttached {
                    field: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Tears a field down and removes its container from the document
    ///
    /// Returns the number of handlers unbound.
    pub fn detach(&mut self, name: &FieldName) -> Result<usize, WidgetError> {
        let mut field = self
            .fields
            .remove(name)
            .ok_or_else(|| WidgetError::UnknownField(name.clone()))?;

        let (_, mut env) = self.split();
        let handlers_unbound = field.teardown(&mut env);
        env.record(WidgetEvent::FieldDetached {
            field: name.clone(),
            handlers_unbound,
        });
        self.document.unmount(name);
        log::info!("detached chunks field {} ({} handlers)", name, handlers_unbound);
        Ok(handlers_unbound)
    }

    /// Routes a gesture to the field owning the target node
    pub fn dispatch(&mut self, event: UiEvent) -> Result<DispatchOutcome, WidgetError> {
        let handler = event.control.handler(&event.activation);
        if !self.document.bindings().is_bound(event.node, handler) {
            return Err(WidgetError::UnboundTarget {
                field: event.field,
                node: event.node,
            });
        }

        let outcome = self.apply_event(&event)?;
        self.document.settle();
        Ok(outcome)
    }

    fn apply_event(&mut self, event: &UiEvent) -> Result<DispatchOutcome, WidgetError> {
        let (fields, mut env) = self.split();
        let field = fields
            .get_mut(&event.field)
            .ok_or_else(|| WidgetError::UnknownField(event.field.clone()))?;

        if event.control == UiControl::AddBefore {
            if !event.activation.activates() {
                return Ok(DispatchOutcome::Ignored);
            }
            if field.container_node() != Some(event.node) {
                return Err(WidgetError::UnboundTarget {
                    field: event.field.clone(),
                    node: event.node,
                });
            }
            field.add_before(&mut env)?;
            return Ok(DispatchOutcome::Applied);
        }

        let delta = field
            .delta_for_node(event.node)
            .ok_or_else(|| WidgetError::UnboundTarget {
                field: event.field.clone(),
                node: event.node,
            })?;

        match (&event.control, event.activation) {
            (UiControl::InstanceOption(instance), Activation::Key(key)) => Ok(DispatchOutcome::Key(
                field.handle_instance_key(delta, instance, key, &mut env)?,
            )),
            (UiControl::Editor, Activation::Key(key)) => Ok(DispatchOutcome::Editor(
                field.handle_editor_key(delta, key, &mut env)?,
            )),
            (UiControl::Editor, _) => Ok(DispatchOutcome::Ignored),
            (_, activation) if !activation.activates() => Ok(DispatchOutcome::Ignored),
            (control, activation) => {
                match control {
                    UiControl::AddAfter => {
                        field.add_after(delta, &mut env)?;
                    }
                    UiControl::InstanceOption(instance) => {
                        field.select_instance(delta, instance.clone(), &mut env)?;
                    }
                    UiControl::Preview => {
                        if let Activation::PointerDown(_) = activation {
                            env.document.row_mut(field.name(), delta)?.pressed =
                                Some(RowButton::Preview);
                        }
                        field.preview(delta, &mut env)?;
                    }
                    UiControl::Edit => field.edit(delta, &mut env)?,
                    UiControl::Cancel => field.cancel(delta, &mut env)?,
                    UiControl::Remove => field.remove(delta, &mut env)?,
                    UiControl::Reset => field.reset(delta, &mut env)?,
                    UiControl::AddBefore | UiControl::Editor => {
                        return Ok(DispatchOutcome::Ignored);
                    }
                }
                Ok(DispatchOutcome::Applied)
            }
        }
    }

    /// Types a value into a configuration control
    ///
    /// Returns false if the row has no such control.
    pub fn input(
        &mut self,
        field: &FieldName,
        delta: Delta,
        chunk_type: &ChunkTypeId,
        property: &str,
        value: impl Into<String>,
    ) -> Result<bool, WidgetError> {
        let row = self.document.row_mut(field, delta)?;
        Ok(row.set_control_value(chunk_type, property, value))
    }

    /// Hands every issued request to the transport
    pub fn take_requests(&mut self) -> Vec<ServerRequest> {
        self.outbox.take()
    }

    /// Applies a server response
    ///
    /// Returns false if the response was discarded because no field is
    /// waiting on it any more. A field forgets a request once it times out
    /// or the field is detached, so nothing is kept per stale request.
    pub fn deliver(&mut self, response: ServerResponse) -> Result<bool, WidgetError> {
        let request = response.request_id;
        let owner = match self.fields.owner_of(request) {
            Some(owner) => owner.clone(),
            None => {
                log::debug!("discarding response to request {}", request);
                self.audit
                    .record(WidgetEvent::ResponseDiscarded { request });
                return Ok(false);
            }
        };

        let mut rendered = Vec::with_capacity(response.containers.len());
        for container in response.containers {
            rendered.push(container.field_name.clone());
            self.document.mount(container);
        }

        {
            let (fields, mut env) = self.split();
            for name in &rendered {
                if let Some(field) = fields.get_mut(name) {
                    field.refresh(&mut env)?;
                }
            }
            for signal in &response.signals {
                match signal {
                    Signal::PreviewLoaded { field, delta } => match fields.get_mut(field) {
                        Some(target) => {
                            target.on_preview_loaded(*delta, &mut env);
                        }
                        None => log::debug!("preview signal for unattached field {}", field),
                    },
                }
            }
        }

        for name in &rendered {
            self.sync_field(name, false)?;
        }

        {
            let (fields, mut env) = self.split();
            if let Some(field) = fields.get_mut(&owner) {
                field.on_request_settled(request, &mut env);
            }
        }
        self.document.settle();
        self.fire_follow_ups()?;
        Ok(true)
    }

    /// Fires the recorded follow-up add of every field, once each
    fn fire_follow_ups(&mut self) -> Result<(), WidgetError> {
        let mut fired = false;
        for name in self.fields.names() {
            let (fields, mut env) = self.split();
            if let Some(field) = fields.get_mut(&name) {
                fired |= field.fire_follow_up(&mut env)?;
            }
        }
        if fired {
            self.document.settle();
        }
        Ok(())
    }

    /// Advances the clock one tick and abandons requests past the timeout
    ///
    /// Returns the abandoned requests.
    pub fn tick(&mut self) -> Result<Vec<RequestId>, WidgetError> {
        self.clock += 1;
        let Some(timeout) = self.config.request_timeout_ticks else {
            return Ok(Vec::new());
        };

        let mut expired = Vec::new();
        for name in self.fields.names() {
            let (fields, mut env) = self.split();
            if let Some(field) = fields.get_mut(&name) {
                if let Some(request) = field.check_timeout(timeout, &mut env)? {
                    expired.push(request);
                }
            }
        }
        if !expired.is_empty() {
            self.document.settle();
            self.fire_follow_ups()?;
        }
        Ok(expired)
    }

    /// Advances the clock by `ticks`
    pub fn advance(&mut self, ticks: u64) -> Result<Vec<RequestId>, WidgetError> {
        let mut expired = Vec::new();
        for _ in 0..ticks {
            expired.extend(self.tick()?);
        }
        Ok(expired)
    }

    fn split(&mut self) -> (&mut FieldRegistry, FieldEnv<'_>) {
        (
            &mut self.fields,
            FieldEnv {
                document: &mut self.document,
                plugins: &mut self.plugins,
                outbox: &mut self.outbox,
                audit: &mut self.audit,
                now: self.clock,
                progress_message: &self.config.progress_message,
            },
        )
    }
}

impl Default for ChunksWidget {
    fn default() -> Self {
        Self::new(WidgetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_types::{ChunkInstance, ChunkView, FieldSettings, InstanceName, LangCode, NodeId};
    use widget_dom::{ChunkRow, Control};

    fn body() -> FieldName {
        FieldName::new("body")
    }

    fn container() -> FieldContainer {
        let settings = FieldSettings::new()
            .unlimited()
            .with_instance("text", ChunkInstance::new("text").previewed_on_client());
        FieldContainer::new("body", LangCode::undefined(), settings)
            .with_row(
                ChunkRow::new(Delta::new(0), ChunkView::Preview)
                    .with_options(vec![InstanceName::new("text")])
                    .with_instance("text")
                    .with_control(Control::new("text", "text", "first")),
            )
            .with_row(
                ChunkRow::new(Delta::new(1), ChunkView::Staged)
                    .with_options(vec![InstanceName::new("text")])
                    .with_control(Control::new("text", "text", "")),
            )
    }

    fn row_node(widget: &ChunksWidget, delta: u32) -> NodeId {
        widget.container(&body()).unwrap().row(Delta::new(delta)).unwrap().node
    }

    #[test]
    fn test_attach_twice_updates_in_place() {
        let mut widget = ChunksWidget::default();
        widget.attach(vec![container()]).unwrap();
        widget.attach(vec![container()]).unwrap();

        assert_eq!(widget.fields().len(), 1);
        assert_eq!(
            widget
                .audit()
                .count(|e| matches!(e, WidgetEvent::FieldUpdated { .. })),
            1
        );
        let node = row_node(&widget, 0);
        assert_eq!(
            widget.field(&body()).unwrap().chunk(Delta::new(0)).unwrap().node(),
            node
        );
    }

    #[test]
    fn test_dispatch_to_unbound_node() {
        let mut widget = ChunksWidget::default();
        widget.attach(vec![container()]).unwrap();
        let stray = NodeId::new();
        let err = widget
            .dispatch(UiEvent::click(body(), stray, UiControl::Edit))
            .unwrap_err();
        assert_eq!(
            err,
            WidgetError::UnboundTarget {
                field: body(),
                node: stray
            }
        );
    }

    #[test]
    fn test_secondary_click_is_ignored() {
        let mut widget = ChunksWidget::default();
        widget.attach(vec![container()]).unwrap();
        let node = row_node(&widget, 0);
        let outcome = widget
            .dispatch(UiEvent::new(
                body(),
                node,
                UiControl::Edit,
                Activation::PointerDown(chunk_types::PointerButton::Secondary),
            ))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(
            widget.field(&body()).unwrap().chunk(Delta::new(0)).unwrap().view(),
            ChunkView::Preview
        );
    }

    #[test]
    fn test_detach_unbinds_and_unmounts() {
        let mut widget = ChunksWidget::default();
        widget.attach(vec![container()]).unwrap();
        let unbound = widget.detach(&body()).unwrap();
        assert_eq!(unbound, 2 * widget_dom::Handler::CHUNK_HANDLERS.len() + 1);
        assert_eq!(widget.document().bindings().count(), 0);
        assert!(widget.container(&body()).is_none());
        assert_eq!(
            widget.detach(&body()),
            Err(WidgetError::UnknownField(body()))
        );
    }

    #[test]
    fn test_response_without_owner_is_discarded() {
        let mut widget = ChunksWidget::default();
        widget.attach(vec![container()]).unwrap();
        let delivered = widget
            .deliver(ServerResponse::new(RequestId::new(99)))
            .unwrap();
        assert!(!delivered);
        assert!(matches!(
            widget.audit().last(),
            Some(WidgetEvent::ResponseDiscarded { .. })
        ));
    }

    #[test]
    fn test_timeout_disabled() {
        let mut widget = ChunksWidget::new(WidgetConfig::default().with_timeout(None));
        widget.attach(vec![container()]).unwrap();
        let node = row_node(&widget, 0);
        widget
            .dispatch(UiEvent::click(body(), node, UiControl::AddAfter))
            .unwrap();
        assert!(widget.advance(10_000).unwrap().is_empty());
        assert!(widget.field(&body()).unwrap().is_busy());
    }

    #[test]
    fn test_late_responses_after_timeouts_are_discarded() {
        let mut widget = ChunksWidget::new(WidgetConfig::default().with_timeout(Some(2)));
        let mut page = container();
        page.rows.truncate(1);
        widget.attach(vec![page]).unwrap();
        let node = row_node(&widget, 0);
        widget
            .dispatch(UiEvent::click(body(), node, UiControl::AddAfter))
            .unwrap();

        // Every expiry re-issues the add through the follow-up.
        let mut expired = Vec::new();
        for _ in 0..3 {
            expired.extend(widget.advance(2).unwrap());
        }
        assert_eq!(expired.len(), 3);
        let requests = widget.take_requests();
        assert_eq!(requests.len(), 4);

        let current = widget.field(&body()).unwrap().in_flight().unwrap();
        assert_eq!(current, requests[3].id);
        for stale in &expired {
            assert!(!widget.deliver(ServerResponse::new(*stale)).unwrap());
        }
        assert_eq!(
            widget
                .audit()
                .count(|e| matches!(e, WidgetEvent::ResponseDiscarded { .. })),
            3
        );
        assert_eq!(widget.field(&body()).unwrap().in_flight(), Some(current));
    }
}

use crate::audit::{AuditLog, WidgetEvent};
use crate::server::Outbox;
use chunk_plugins::PluginRegistry;
use widget_dom::Document;

/// Widget-wide collaborators a field operation works against
///
/// Fields own their private state; everything shared between fields is
/// borrowed through this for the duration of one operation.
pub struct FieldEnv<'a> {
    pub document: &'a mut Document,
    pub plugins: &'a mut PluginRegistry,
    pub outbox: &'a mut Outbox,
    pub audit: &'a mut AuditLog,
    /// Current logical tick
    pub now: u64,
    /// Text of progress indicators
    pub progress_message: &'a str,
}

impl FieldEnv<'_> {
    pub fn record(&mut self, event: WidgetEvent) {
        self.audit.record(event);
    }
}

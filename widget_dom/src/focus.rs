//! Keyboard focus tracking
//!
//! Focus is explicit: a target is granted focus only if it resolves against
//! the live document. Every change is recorded for audit.

use chunk_types::FocusTarget;
use serde::{Deserialize, Serialize};

/// Focus event for audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusEvent {
    /// Focus was granted while nothing was focused
    Granted {
        target: FocusTarget,
        timestamp_ns: u64,
    },
    /// Focus moved from one control to another
    Transferred {
        from: FocusTarget,
        to: FocusTarget,
        timestamp_ns: u64,
    },
    /// Focused control disappeared from the document
    Cleared {
        target: FocusTarget,
        timestamp_ns: u64,
    },
    /// A deferred focus request found nothing to focus
    Unresolved { request: String, timestamp_ns: u64 },
}

/// Tracks the single focused control of a document
#[derive(Debug, Default)]
pub struct FocusTracker {
    current: Option<FocusTarget>,
    audit_trail: Vec<FocusEvent>,
    next_timestamp: u64,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves focus to `target`
    ///
    /// Focusing the already focused control is a no-op.
    pub fn focus(&mut self, target: FocusTarget) {
        if self.current.as_ref() == Some(&target) {
            return;
        }

        let timestamp = self.next_timestamp();
        match self.current.take() {
            Some(from) => self.audit_trail.push(FocusEvent::Transferred {
                from,
                to: target.clone(),
                timestamp_ns: timestamp,
            }),
            None => self.audit_trail.push(FocusEvent::Granted {
                target: target.clone(),
                timestamp_ns: timestamp,
            }),
        }
        self.current = Some(target);
    }

    /// Drops focus, e.g. because the focused node was removed
    pub fn clear(&mut self) -> Option<FocusTarget> {
        let target = self.current.take()?;
        let timestamp = self.next_timestamp();
        self.audit_trail.push(FocusEvent::Cleared {
            target: target.clone(),
            timestamp_ns: timestamp,
        });
        Some(target)
    }

    /// Records that a focus request could not be resolved
    pub fn record_unresolved(&mut self, request: impl Into<String>) {
        let timestamp = self.next_timestamp();
        self.audit_trail.push(FocusEvent::Unresolved {
            request: request.into(),
            timestamp_ns: timestamp,
        });
    }

    pub fn current(&self) -> Option<&FocusTarget> {
        self.current.as_ref()
    }

    pub fn has_focus(&self, target: &FocusTarget) -> bool {
        self.current.as_ref() == Some(target)
    }

    pub fn audit_trail(&self) -> &[FocusEvent] {
        &self.audit_trail
    }

    fn next_timestamp(&mut self) -> u64 {
        let ts = self.next_timestamp;
        self.next_timestamp += 1;
        ts
    }
}

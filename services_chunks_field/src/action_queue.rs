//! Serialized field-level requests
//!
//! At most one request per field is in flight. Anything issued meanwhile
//! waits here, labelled, and is released one item per settle.

use chunk_types::RequestId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// An action waiting for the in-flight request to settle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction<A> {
    pub label: String,
    pub action: A,
}

/// The request currently outstanding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlight<A> {
    pub request: RequestId,
    pub action: A,
    /// Tick at which the request was issued
    pub issued_at: u64,
}

#[derive(Debug, Clone)]
pub struct ActionQueue<A> {
    pending: VecDeque<QueuedAction<A>>,
    in_flight: Option<InFlight<A>>,
}

impl<A> ActionQueue<A> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: None,
        }
    }

    /// Returns true while a request is outstanding
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&InFlight<A>> {
        self.in_flight.as_ref()
    }

    /// Appends an action to run after the in-flight request settles
    pub fn enqueue(&mut self, label: impl Into<String>, action: A) {
        self.pending.push_back(QueuedAction {
            label: label.into(),
            action,
        });
    }

    /// Records that `request` is now in flight
    pub fn begin(&mut self, request: RequestId, action: A, issued_at: u64) {
        if let Some(previous) = &self.in_flight {
            log::warn!(
                "request {} issued while {} still in flight",
                request,
                previous.request
            );
        }
        self.in_flight = Some(InFlight {
            request,
            action,
            issued_at,
        });
    }

    /// Settles the in-flight request if it is `request`
    pub fn settle(&mut self, request: RequestId) -> Option<InFlight<A>> {
        if self.in_flight.as_ref()?.request != request {
            return None;
        }
        self.in_flight.take()
    }

    /// Abandons the in-flight request if it is older than `timeout` ticks
    pub fn expire(&mut self, now: u64, timeout: u64) -> Option<InFlight<A>> {
        let issued_at = self.in_flight.as_ref()?.issued_at;
        if now.saturating_sub(issued_at) < timeout {
            return None;
        }
        self.in_flight.take()
    }

    /// Takes the next waiting action; an empty queue yields `None`
    pub fn next_action(&mut self) -> Option<QueuedAction<A>> {
        if self.is_busy() {
            return None;
        }
        self.pending.pop_front()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_labels(&self) -> Vec<&str> {
        self.pending.iter().map(|q| q.label.as_str()).collect()
    }

    /// Rewrites the in-flight and every waiting action, relabelling the
    /// waiting ones
    pub fn map_actions(&mut self, map: impl Fn(&A) -> A, label: impl Fn(&A) -> String) {
        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.action = map(&in_flight.action);
        }
        for queued in self.pending.iter_mut() {
            queued.action = map(&queued.action);
            queued.label = label(&queued.action);
        }
    }

    /// Drops every waiting action and forgets the in-flight request
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight = None;
    }
}

impl<A> Default for ActionQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

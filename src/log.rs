//! Blocked-event log — bounded, newest-first record of enforcement actions
//!
//! Observability only: the decision cascades never read it.

use crate::types::BlockedEvent;
use std::collections::VecDeque;

/// Ring buffer of blocked events, newest first
#[derive(Debug, Clone)]
pub struct BlockedEventLog {
    events: VecDeque<BlockedEvent>,
    max_events: usize,
}

impl BlockedEventLog {
    /// Create a log holding at most `max_events` entries
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Record an event, dropping the oldest entries past capacity
    pub fn push(&mut self, event: BlockedEvent) {
        tracing::info!(
            id = %event.id,
            kind = ?event.kind,
            tab_id = event.source_tab_id,
            target = %event.target_url,
            reason = %event.reason,
            "Blocked event recorded"
        );

        self.events.push_front(event);
        self.events.truncate(self.max_events);
    }

    /// Up to `limit` most recent events, newest first
    pub fn recent(&self, limit: usize) -> Vec<BlockedEvent> {
        self.events.iter().take(limit).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_events
    }
}

impl Default for BlockedEventLog {
    fn default() -> Self {
        Self::new(100)
    }
}

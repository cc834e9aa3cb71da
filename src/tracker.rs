//! Evidence trackers — most recent gesture and clicked link per tab
//!
//! Each tracker keeps at most one record per tab id; a new report
//! overwrites the previous one. Freshness is always evaluated against the
//! caller's `now`, so records never need to be expired by a timer.

use crate::config::GuardConfig;
use crate::types::{GestureKind, TabId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Most recent trusted input in a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureRecord {
    pub kind: GestureKind,
    pub occurred_at: u64,
}

/// Most recent trusted anchor click in a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    pub target_href: String,
    pub occurred_at: u64,
    pub page_url: String,
}

/// Per-tab gesture evidence with kind-specific validity windows
#[derive(Debug, Clone)]
pub struct GestureTracker {
    records: HashMap<TabId, GestureRecord>,
    window_ms: u64,
    context_menu_window_ms: u64,
}

impl GestureTracker {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            records: HashMap::new(),
            window_ms: config.gesture_window_ms,
            context_menu_window_ms: config.context_menu_window_ms,
        }
    }

    /// Overwrite the tab's gesture record
    pub fn record(&mut self, tab_id: TabId, kind: GestureKind, occurred_at: u64) {
        self.records.insert(tab_id, GestureRecord { kind, occurred_at });
    }

    pub fn get(&self, tab_id: TabId) -> Option<&GestureRecord> {
        self.records.get(&tab_id)
    }

    /// Validity window for a gesture kind
    pub fn window_for(&self, kind: GestureKind) -> u64 {
        if kind.is_context_menu() {
            self.context_menu_window_ms
        } else {
            self.window_ms
        }
    }

    /// Whether the tab has a gesture still inside its window (inclusive)
    pub fn has_recent(&self, tab_id: TabId, now: u64) -> bool {
        self.recent(tab_id, now).is_some()
    }

    /// Live context-menu gesture ("open link in new tab" pending)
    pub fn has_recent_context_menu(&self, tab_id: TabId, now: u64) -> bool {
        self.recent(tab_id, now)
            .is_some_and(|record| record.kind.is_context_menu())
    }

    /// Live pointer/key gesture, excluding context-menu opens
    pub fn has_recent_direct(&self, tab_id: TabId, now: u64) -> bool {
        self.recent(tab_id, now)
            .is_some_and(|record| !record.kind.is_context_menu())
    }

    fn recent(&self, tab_id: TabId, now: u64) -> Option<&GestureRecord> {
        self.records
            .get(&tab_id)
            .filter(|record| now.saturating_sub(record.occurred_at) <= self.window_for(record.kind))
    }

    pub fn remove(&mut self, tab_id: TabId) -> Option<GestureRecord> {
        self.records.remove(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Per-tab clicked-link evidence
#[derive(Debug, Clone)]
pub struct ClickTracker {
    records: HashMap<TabId, ClickRecord>,
    window_ms: u64,
}

impl ClickTracker {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            records: HashMap::new(),
            window_ms: config.click_match_window_ms,
        }
    }

    /// Overwrite the tab's click record
    pub fn record(
        &mut self,
        tab_id: TabId,
        href: impl Into<String>,
        occurred_at: u64,
        page_url: impl Into<String>,
    ) {
        self.records.insert(
            tab_id,
            ClickRecord {
                target_href: href.into(),
                occurred_at,
                page_url: page_url.into(),
            },
        );
    }

    pub fn get(&self, tab_id: TabId) -> Option<&ClickRecord> {
        self.records.get(&tab_id)
    }

    /// The click record, only while it is still usable as evidence
    pub fn fresh(&self, tab_id: TabId, now: u64) -> Option<&ClickRecord> {
        self.records
            .get(&tab_id)
            .filter(|record| now.saturating_sub(record.occurred_at) <= self.window_ms)
    }

    pub fn remove(&mut self, tab_id: TabId) -> Option<ClickRecord> {
        self.records.remove(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

//! Per-tab context tables
//!
//! `TabTables` owns every per-tab record the engine keeps: gesture and click
//! evidence, the last committed URL, pending restores and spawned-tab
//! contexts. All maps are keyed by tab id, hold at most one record per tab,
//! and are torn down together when the tab is removed.

use crate::config::GuardConfig;
use crate::tracker::{ClickTracker, GestureTracker};
use crate::types::TabId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the engine believes is a tab's current top-level location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabNavigationState {
    pub last_committed_url: String,
    pub observed_at: u64,
}

/// A restore navigation the engine issued and expects to see commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreInFlight {
    pub target_url: String,
    pub issued_at: u64,
}

/// Opener linkage for a tab spawned by another tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTabContext {
    pub opener_tab_id: TabId,
    pub opener_url: String,

    /// Href of the opener's fresh click when the tab was created
    pub expected_href: Option<String>,

    pub created_at: u64,

    /// The opener had a live context-menu gesture at creation time
    pub context_menu_intent: bool,
}

impl NewTabContext {
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }
}

/// Spawned-tab contexts with a bounded lifetime
#[derive(Debug, Clone)]
pub struct NewTabContextStore {
    contexts: HashMap<TabId, NewTabContext>,
    ttl_ms: u64,
}

impl NewTabContextStore {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            contexts: HashMap::new(),
            ttl_ms,
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn insert(&mut self, tab_id: TabId, context: NewTabContext) {
        self.contexts.insert(tab_id, context);
    }

    /// Stored context, expired or not
    pub fn get(&self, tab_id: TabId) -> Option<&NewTabContext> {
        self.contexts.get(&tab_id)
    }

    /// Stored context while it is within its TTL
    pub fn get_live(&self, tab_id: TabId, now: u64) -> Option<&NewTabContext> {
        self.contexts
            .get(&tab_id)
            .filter(|context| !self.is_expired(context, now))
    }

    pub fn is_expired(&self, context: &NewTabContext, now: u64) -> bool {
        context.age(now) > self.ttl_ms
    }

    pub fn remove(&mut self, tab_id: TabId) -> Option<NewTabContext> {
        self.contexts.remove(&tab_id)
    }

    /// Drop every expired context, returning how many were removed
    pub fn purge_expired(&mut self, now: u64) -> usize {
        let ttl_ms = self.ttl_ms;
        let before = self.contexts.len();
        self.contexts
            .retain(|_, context| context.age(now) <= ttl_ms);
        before - self.contexts.len()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// All per-tab state owned by the guard
#[derive(Debug, Clone)]
pub struct TabTables {
    pub gestures: GestureTracker,
    pub clicks: ClickTracker,
    pub new_tabs: NewTabContextStore,
    navigation: HashMap<TabId, TabNavigationState>,
    restores: HashMap<TabId, RestoreInFlight>,
    restore_window_ms: u64,
}

impl TabTables {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            gestures: GestureTracker::new(config),
            clicks: ClickTracker::new(config),
            new_tabs: NewTabContextStore::new(config.new_tab_context_ttl_ms),
            navigation: HashMap::new(),
            restores: HashMap::new(),
            restore_window_ms: config.restore_window_ms,
        }
    }

    /// Record a committed top-level URL as the tab's new baseline
    pub fn commit(&mut self, tab_id: TabId, url: impl Into<String>, now: u64) {
        self.navigation.insert(
            tab_id,
            TabNavigationState {
                last_committed_url: url.into(),
                observed_at: now,
            },
        );
    }

    pub fn navigation(&self, tab_id: TabId) -> Option<&TabNavigationState> {
        self.navigation.get(&tab_id)
    }

    /// Last committed URL, if the tab has one
    pub fn last_url(&self, tab_id: TabId) -> Option<&str> {
        self.navigation
            .get(&tab_id)
            .map(|state| state.last_committed_url.as_str())
            .filter(|url| !url.is_empty())
    }

    /// Expect the next commit in this tab to be a restore to `target_url`
    pub fn issue_restore(&mut self, tab_id: TabId, target_url: impl Into<String>, now: u64) {
        self.restores.insert(
            tab_id,
            RestoreInFlight {
                target_url: target_url.into(),
                issued_at: now,
            },
        );
    }

    pub fn pending_restore(&self, tab_id: TabId) -> Option<&RestoreInFlight> {
        self.restores.get(&tab_id)
    }

    pub fn cancel_restore(&mut self, tab_id: TabId) -> Option<RestoreInFlight> {
        self.restores.remove(&tab_id)
    }

    /// Consume the pending restore for a committed URL
    ///
    /// The entry is one-shot: it is removed whether or not it matches.
    /// Returns true when `url` is the restore target and arrived in time.
    pub fn take_restore(&mut self, tab_id: TabId, url: &str, now: u64) -> bool {
        match self.restores.remove(&tab_id) {
            Some(pending) => {
                pending.target_url == url
                    && now.saturating_sub(pending.issued_at) <= self.restore_window_ms
            }
            None => false,
        }
    }

    /// Remove every record held for a tab
    pub fn teardown(&mut self, tab_id: TabId) {
        self.gestures.remove(tab_id);
        self.clicks.remove(tab_id);
        self.new_tabs.remove(tab_id);
        self.navigation.remove(&tab_id);
        self.restores.remove(&tab_id);
    }

    /// Whether any table still holds a record for the tab
    pub fn is_tracked(&self, tab_id: TabId) -> bool {
        self.gestures.get(tab_id).is_some()
            || self.clicks.get(tab_id).is_some()
            || self.new_tabs.get(tab_id).is_some()
            || self.navigation.contains_key(&tab_id)
            || self.restores.contains_key(&tab_id)
    }
}

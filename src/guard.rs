//! Navigation guard — event handling, enforcement and restore control
//!
//! `NavigationGuard` owns the per-tab tables and the blocked-event log,
//! feeds inbound browser events through the decision cascades, and enforces
//! block verdicts through the [`Browser`] collaborator:
//!
//! - in-tab block → remember a pending restore, log `forced_redirect`,
//!   navigate the tab back to its previous URL
//! - spawned-tab block → log `popup_tab`, close the tab
//!
//! A commit that matches the pending restore is accepted without running the
//! cascade again, so a restore can never trigger another block.

use crate::browser::Browser;
use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use crate::context::{NewTabContext, RestoreInFlight, TabNavigationState, TabTables};
use crate::engine::{self, ContextDisposition};
use crate::error::{GuardError, Result};
use crate::log::BlockedEventLog;
use crate::policy::{Settings, SettingsCache, SettingsStore};
use crate::types::{
    timestamp_or_now, BlockedEvent, BlockedEventKind, BrowserEvent, ClickInfo,
    CommittedNavigation, CreatedTab, GestureKind, GuardState, InPageBlock, Reason, TabId,
    UserGesture, Verdict,
};
use crate::urls;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Reason recorded for in-page reports that carry none
const DEFAULT_IN_PAGE_REASON: &str = "blocked_in_content_script";

/// What handling one inbound event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Evidence, teardown or a log entry was recorded; nothing to decide
    Recorded,
    /// Outside policy scope (subframe, unprotected source, no opener)
    Skipped,
    /// Spawned tab is waiting for its first real navigation
    Pending,
    /// Commit matched the pending restore and was accepted as-is
    RestoreCompleted,
    /// A decision cascade ran
    Decided(Verdict),
}

/// Event-driven navigation guard
pub struct NavigationGuard {
    config: GuardConfig,
    browser: Arc<dyn Browser>,
    settings: SettingsCache,
    clock: Arc<dyn Clock>,
    tables: Mutex<TabTables>,
    log: RwLock<BlockedEventLog>,
}

impl NavigationGuard {
    /// Create a guard with the default config and the system clock
    pub fn new(browser: Arc<dyn Browser>, settings: Arc<dyn SettingsStore>) -> Self {
        let config = GuardConfig::default();
        Self {
            tables: Mutex::new(TabTables::new(&config)),
            log: RwLock::new(BlockedEventLog::new(config.max_log_entries)),
            config,
            browser,
            settings: SettingsCache::new(settings),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the config (validated); per-tab state starts empty
    pub fn with_config(mut self, config: GuardConfig) -> Result<Self> {
        config.validate()?;
        self.tables = Mutex::new(TabTables::new(&config));
        self.log = RwLock::new(BlockedEventLog::new(config.max_log_entries));
        self.config = config;
        Ok(self)
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Handle one inbound event
    ///
    /// Never fails: collaborator errors are swallowed and policy lookup
    /// failures disable protection for the affected URL.
    pub async fn handle(&self, event: BrowserEvent) -> Outcome {
        match event {
            BrowserEvent::UserGestureReported(gesture) => self.on_gesture(gesture).await,
            BrowserEvent::ClickReported(click) => self.on_click(click).await,
            BrowserEvent::InPageBlockReported(block) => self.on_in_page_block(block).await,
            BrowserEvent::NavigationCommitted(nav) => self.on_navigation_committed(nav).await,
            BrowserEvent::TabCreated(tab) => self.on_tab_created(tab).await,
            BrowserEvent::TabRemoved { tab_id } => self.on_tab_removed(tab_id).await,
        }
    }

    /// Record a trusted gesture
    pub async fn on_gesture(&self, gesture: UserGesture) -> Outcome {
        let occurred_at = timestamp_or_now(gesture.timestamp, self.clock.now_millis());
        let mut tables = self.tables.lock().await;
        tables.gestures.record(gesture.tab_id, gesture.kind, occurred_at);
        Outcome::Recorded
    }

    /// Record a trusted anchor click; it also counts as a `click` gesture
    pub async fn on_click(&self, click: ClickInfo) -> Outcome {
        let occurred_at = timestamp_or_now(click.timestamp, self.clock.now_millis());
        let mut tables = self.tables.lock().await;
        tables
            .gestures
            .record(click.tab_id, GestureKind::Click, occurred_at);
        tables
            .clicks
            .record(click.tab_id, click.href, occurred_at, click.page_url);
        Outcome::Recorded
    }

    /// Log a block the in-page guard already performed
    pub async fn on_in_page_block(&self, block: InPageBlock) -> Outcome {
        let source_url = match block.source_url.filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => {
                let tables = self.tables.lock().await;
                tables.last_url(block.tab_id).unwrap_or_default().to_string()
            }
        };

        let now = self.clock.now_millis();
        let mut event = BlockedEvent::new(
            BlockedEventKind::ContentBlock,
            block.target_url,
            block.tab_id,
            source_url,
            block
                .reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_IN_PAGE_REASON.to_string()),
        )
        .at_millis(now);
        if let Some(event_type) = block.event_type.filter(|t| !t.is_empty()) {
            event = event.with_detail(event_type);
        }

        self.log.write().await.push(event);
        Outcome::Recorded
    }

    /// Tear down every record held for a closed tab
    pub async fn on_tab_removed(&self, tab_id: TabId) -> Outcome {
        self.tables.lock().await.teardown(tab_id);
        tracing::debug!(tab_id, "Tab state torn down");
        Outcome::Recorded
    }

    /// Decide a committed navigation
    pub async fn on_navigation_committed(&self, nav: CommittedNavigation) -> Outcome {
        if !nav.is_top_level() {
            return Outcome::Skipped;
        }

        let now = self.clock.now_millis();
        let tab_id = nav.tab_id;

        let previous_url = {
            let mut tables = self.tables.lock().await;

            if tables.take_restore(tab_id, &nav.url, now) {
                tables.commit(tab_id, nav.url.as_str(), now);
                tracing::debug!(tab_id, url = %nav.url, "Restore completed");
                return Outcome::RestoreCompleted;
            }

            if let Some(context) = tables.new_tabs.get(tab_id).cloned() {
                let ttl_ms = tables.new_tabs.ttl_ms();
                let result = engine::evaluate_new_tab_navigation(&context, &nav, ttl_ms, now);

                if result.context == ContextDisposition::Discard {
                    tables.new_tabs.remove(tab_id);
                }
                if result.verdict.allow {
                    tables.commit(tab_id, nav.url.as_str(), now);
                }
                drop(tables);

                return self
                    .enforce_new_tab(tab_id, &context, &nav, result.verdict, now)
                    .await;
            }

            tables.last_url(tab_id).map(str::to_string)
        };

        let Some(previous_url) = previous_url else {
            self.tables.lock().await.commit(tab_id, nav.url.as_str(), now);
            return Outcome::Skipped;
        };

        if !self.is_protected(&previous_url).await {
            self.tables.lock().await.commit(tab_id, nav.url.as_str(), now);
            return Outcome::Skipped;
        }

        let verdict = {
            let mut tables = self.tables.lock().await;
            let verdict = engine::evaluate_navigation(&nav, &previous_url, &tables, now);
            if verdict.allow {
                tables.commit(tab_id, nav.url.as_str(), now);
            } else {
                tables.issue_restore(tab_id, previous_url.as_str(), now);
            }
            verdict
        };

        if verdict.allow {
            tracing::debug!(tab_id, url = %nav.url, reason = %verdict.reason, "Navigation allowed");
            return Outcome::Decided(verdict);
        }

        let event = BlockedEvent::new(
            BlockedEventKind::ForcedRedirect,
            nav.url.as_str(),
            tab_id,
            previous_url.as_str(),
            verdict.reason.as_str(),
        )
        .at_millis(now);
        self.log.write().await.push(event);

        if let Err(e) = self.browser.navigate(tab_id, &previous_url).await {
            tracing::debug!(tab_id, error = %e, "Restore navigation failed");
            self.tables.lock().await.cancel_restore(tab_id);
        }

        Outcome::Decided(verdict)
    }

    /// Track a spawned tab and decide it right away when its target is known
    pub async fn on_tab_created(&self, tab: CreatedTab) -> Outcome {
        let Some(opener_tab_id) = tab.opener_tab_id else {
            return Outcome::Skipped;
        };

        let cached_opener_url = {
            let tables = self.tables.lock().await;
            tables.last_url(opener_tab_id).map(str::to_string)
        };
        let opener_url = match cached_opener_url {
            Some(url) => Some(url),
            None => self.lookup_tab_url(opener_tab_id).await,
        };

        let Some(opener_url) = opener_url.filter(|u| !u.is_empty()) else {
            return Outcome::Skipped;
        };
        if !self.is_protected(&opener_url).await {
            return Outcome::Skipped;
        }

        let now = self.clock.now_millis();
        let (context, verdict) = {
            let mut tables = self.tables.lock().await;
            let purged = tables.new_tabs.purge_expired(now);
            if purged > 0 {
                tracing::debug!(purged, "Expired new-tab contexts dropped");
            }

            let context = engine::capture_new_tab_context(&tables, opener_tab_id, &opener_url, now);
            let verdict = tab
                .initial_url()
                .and_then(|url| engine::evaluate_tab_creation(&context, url));

            if verdict.is_none() {
                tables.new_tabs.insert(tab.tab_id, context.clone());
            }
            (context, verdict)
        };

        let Some(verdict) = verdict else {
            tracing::debug!(
                tab_id = tab.tab_id,
                opener_tab_id,
                "Spawned tab waiting for first navigation"
            );
            return Outcome::Pending;
        };

        if verdict.allow {
            tracing::debug!(tab_id = tab.tab_id, reason = %verdict.reason, "Spawned tab allowed");
            return Outcome::Decided(verdict);
        }

        let target_url = tab.initial_url().unwrap_or("about:blank").to_string();
        self.close_popup(tab.tab_id, &context, &target_url, verdict.reason, now)
            .await;
        Outcome::Decided(verdict)
    }

    async fn enforce_new_tab(
        &self,
        tab_id: TabId,
        context: &NewTabContext,
        nav: &CommittedNavigation,
        verdict: Verdict,
        now: u64,
    ) -> Outcome {
        if verdict.allow {
            tracing::debug!(tab_id, url = %nav.url, reason = %verdict.reason, "Spawned tab navigation allowed");
        } else {
            self.close_popup(tab_id, context, &nav.url, verdict.reason, now)
                .await;
        }
        Outcome::Decided(verdict)
    }

    /// Record a `popup_tab` event, then close the tab (best-effort)
    async fn close_popup(
        &self,
        tab_id: TabId,
        context: &NewTabContext,
        target_url: &str,
        reason: Reason,
        now: u64,
    ) {
        let event = BlockedEvent::new(
            BlockedEventKind::PopupTab,
            target_url,
            context.opener_tab_id,
            context.opener_url.as_str(),
            reason.as_str(),
        )
        .at_millis(now);
        self.log.write().await.push(event);

        if let Err(e) = self.browser.close_tab(tab_id).await {
            tracing::debug!(tab_id, error = %e, "Popup tab already gone");
        }
    }

    async fn lookup_tab_url(&self, tab_id: TabId) -> Option<String> {
        match self.browser.tab_url(tab_id).await {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(tab_id, error = %e, "Tab lookup failed");
                None
            }
        }
    }

    /// Effective protection for a URL; settings failures fail open
    async fn is_protected(&self, url: &str) -> bool {
        if !urls::is_web_url(url) {
            return false;
        }
        match self.settings.get().await {
            Ok(settings) => settings.protection_enabled_for_url(url),
            Err(e) => {
                tracing::debug!(error = %e, "Settings unavailable, protection off");
                false
            }
        }
    }

    /// Whether the in-page guard should be installed on a page
    pub async fn should_inject(&self, url: &str) -> bool {
        self.is_protected(url).await
    }

    // ─── Settings & queries ──────────────────────────────────────

    /// Seed default settings when none were persisted yet
    pub async fn ensure_default_settings(&self) -> Result<()> {
        self.settings.ensure_defaults().await.map(|_| ())
    }

    /// External settings change notification
    pub async fn settings_changed(&self) {
        self.settings.invalidate().await;
        tracing::debug!("Settings cache invalidated");
    }

    /// Current settings snapshot
    pub async fn settings(&self) -> Result<Arc<Settings>> {
        self.settings.get().await
    }

    /// Protection state for a host plus the most recent log entries
    pub async fn get_state(&self, host: &str) -> Result<GuardState> {
        let settings = self.settings.get().await?;
        let recent_logs = self.get_logs().await;

        let Some(host) = urls::normalize_host(host) else {
            return Ok(GuardState {
                host: String::new(),
                global_enabled: settings.global_enabled,
                site_enabled: false,
                effective_enabled: false,
                site_override: None,
                domain_listed: false,
                recent_logs,
            });
        };

        let site_override = settings.site_override(&host);
        let domain_listed = settings.domain_listed(&host);
        let site_enabled = site_override.unwrap_or(domain_listed);

        Ok(GuardState {
            global_enabled: settings.global_enabled,
            site_enabled,
            effective_enabled: settings.global_enabled && site_enabled,
            site_override,
            domain_listed,
            recent_logs,
            host,
        })
    }

    /// Most recent blocked events, newest first
    pub async fn get_logs(&self) -> Vec<BlockedEvent> {
        self.log.read().await.recent(self.config.log_query_limit)
    }

    pub async fn clear_logs(&self) {
        self.log.write().await.clear();
    }

    pub async fn set_global_enabled(&self, enabled: bool) -> Result<()> {
        let mut settings = (*self.settings.get().await?).clone();
        settings.global_enabled = enabled;
        self.settings.save(settings).await?;
        tracing::info!(enabled, "Global protection toggled");
        Ok(())
    }

    /// Override protection for one host; returns the refreshed state
    pub async fn set_site_override(&self, host: &str, enabled: bool) -> Result<GuardState> {
        let normalized =
            urls::normalize_host(host).ok_or_else(|| GuardError::InvalidHost(host.to_string()))?;

        let mut settings = (*self.settings.get().await?).clone();
        settings.site_overrides.insert(normalized.clone(), enabled);
        self.settings.save(settings).await?;
        tracing::info!(host = %normalized, enabled, "Site override set");

        self.get_state(&normalized).await
    }

    /// Add a protected domain; returns false if it was already listed
    pub async fn add_protected_domain(&self, input: &str) -> Result<bool> {
        let mut settings = (*self.settings.get().await?).clone();
        let added = settings.add_protected_domain(input)?;
        if added {
            self.settings.save(settings).await?;
            tracing::info!(domain = %input, "Protected domain added");
        }
        Ok(added)
    }

    /// Remove a protected domain; returns false if it was not listed
    pub async fn remove_protected_domain(&self, input: &str) -> Result<bool> {
        let mut settings = (*self.settings.get().await?).clone();
        let removed = settings.remove_protected_domain(input);
        if removed {
            self.settings.save(settings).await?;
            tracing::info!(domain = %input, "Protected domain removed");
        }
        Ok(removed)
    }

    // ─── Introspection ───────────────────────────────────────────

    pub async fn tab_state(&self, tab_id: TabId) -> Option<TabNavigationState> {
        self.tables.lock().await.navigation(tab_id).cloned()
    }

    pub async fn pending_restore(&self, tab_id: TabId) -> Option<RestoreInFlight> {
        self.tables.lock().await.pending_restore(tab_id).cloned()
    }

    /// Spawned-tab context, only while it is within its TTL
    pub async fn new_tab_context(&self, tab_id: TabId) -> Option<NewTabContext> {
        let now = self.clock.now_millis();
        self.tables
            .lock()
            .await
            .new_tabs
            .get_live(tab_id, now)
            .cloned()
    }

    /// Whether any per-tab record remains for the tab
    pub async fn is_tracked(&self, tab_id: TabId) -> bool {
        self.tables.lock().await.is_tracked(tab_id)
    }
}

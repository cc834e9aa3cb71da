//! Core types for the navigation guard
//!
//! Inbound browser events, verdicts and blocked-event log entries. All
//! wire-facing types use camelCase JSON field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Browser tab identifier
pub type TabId = i64;

/// Frame id of a tab's top-level document
pub const TOP_LEVEL_FRAME: i64 = 0;

/// Kind of trusted input that produced a gesture record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Pointerdown,
    Mousedown,
    Click,
    Keydown,
    Touchstart,
    Contextmenu,
    PageGesture,
    #[default]
    #[serde(other)]
    Unknown,
}

impl GestureKind {
    /// Parse a reported kind, falling back to `Unknown`
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pointerdown" => Self::Pointerdown,
            "mousedown" => Self::Mousedown,
            "click" => Self::Click,
            "keydown" => Self::Keydown,
            "touchstart" => Self::Touchstart,
            "contextmenu" => Self::Contextmenu,
            "page_gesture" => Self::PageGesture,
            _ => Self::Unknown,
        }
    }

    pub fn is_context_menu(self) -> bool {
        matches!(self, Self::Contextmenu)
    }
}

/// How the browser says a navigation was initiated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Link,
    Typed,
    AutoBookmark,
    AutoSubframe,
    ManualSubframe,
    Generated,
    StartPage,
    FormSubmit,
    Reload,
    Keyword,
    KeywordGenerated,
    #[default]
    #[serde(other)]
    Other,
}

impl TransitionType {
    /// Transitions that only the browser UI can produce
    pub fn is_browser_ui(self) -> bool {
        matches!(
            self,
            Self::Typed
                | Self::AutoBookmark
                | Self::Keyword
                | Self::KeywordGenerated
                | Self::Generated
                | Self::StartPage
                | Self::Reload
        )
    }
}

/// Extra qualifiers attached to a navigation transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionQualifier {
    ClientRedirect,
    ServerRedirect,
    ForwardBack,
    FromAddressBar,
    #[serde(other)]
    Other,
}

impl TransitionQualifier {
    pub fn is_browser_ui(self) -> bool {
        matches!(self, Self::ForwardBack | Self::FromAddressBar)
    }
}

/// Trusted input reported by the in-page observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGesture {
    pub tab_id: TabId,

    #[serde(default, deserialize_with = "lenient_kind")]
    pub kind: GestureKind,

    /// Unix milliseconds; absent or malformed values mean "now"
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<u64>,
}

/// Trusted anchor click reported by the in-page observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickInfo {
    pub tab_id: TabId,

    #[serde(default)]
    pub href: String,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<u64>,

    #[serde(default)]
    pub page_url: String,
}

/// A block already performed by the in-page guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InPageBlock {
    pub tab_id: TabId,

    /// In-page event name (e.g. `popup_window_open`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(default)]
    pub target_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// A navigation the browser has committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedNavigation {
    pub tab_id: TabId,

    #[serde(default)]
    pub frame_id: i64,

    pub url: String,

    #[serde(default)]
    pub transition_type: TransitionType,

    #[serde(default)]
    pub transition_qualifiers: Vec<TransitionQualifier>,
}

impl CommittedNavigation {
    /// Top-level link navigation, the common case in tests and replays
    pub fn link(tab_id: TabId, url: impl Into<String>) -> Self {
        Self {
            tab_id,
            frame_id: TOP_LEVEL_FRAME,
            url: url.into(),
            transition_type: TransitionType::Link,
            transition_qualifiers: Vec::new(),
        }
    }

    pub fn with_transition(mut self, transition: TransitionType) -> Self {
        self.transition_type = transition;
        self
    }

    pub fn with_qualifier(mut self, qualifier: TransitionQualifier) -> Self {
        self.transition_qualifiers.push(qualifier);
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.frame_id == TOP_LEVEL_FRAME && self.tab_id >= 0
    }

    /// Whether the browser marks this navigation as user-driven from its own UI
    pub fn is_browser_ui(&self) -> bool {
        self.transition_type.is_browser_ui()
            || self
                .transition_qualifiers
                .iter()
                .any(|q| q.is_browser_ui())
    }
}

/// A newly created tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTab {
    pub tab_id: TabId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opener_tab_id: Option<TabId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CreatedTab {
    /// Initial target: the pending URL if set, else the tab URL
    pub fn initial_url(&self) -> Option<&str> {
        self.pending_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
    }
}

/// Inbound events consumed by the guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserEvent {
    UserGestureReported(UserGesture),
    ClickReported(ClickInfo),
    InPageBlockReported(InPageBlock),
    NavigationCommitted(CommittedNavigation),
    TabCreated(CreatedTab),
    TabRemoved {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
}

impl BrowserEvent {
    /// Tab the event is about (used for per-tab ordering)
    pub fn tab_id(&self) -> TabId {
        match self {
            Self::UserGestureReported(e) => e.tab_id,
            Self::ClickReported(e) => e.tab_id,
            Self::InPageBlockReported(e) => e.tab_id,
            Self::NavigationCommitted(e) => e.tab_id,
            Self::TabCreated(e) => e.tab_id,
            Self::TabRemoved { tab_id } => *tab_id,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserGestureReported(_) => "user_gesture_reported",
            Self::ClickReported(_) => "click_reported",
            Self::InPageBlockReported(_) => "in_page_block_reported",
            Self::NavigationCommitted(_) => "navigation_committed",
            Self::TabCreated(_) => "tab_created",
            Self::TabRemoved { .. } => "tab_removed",
        }
    }
}

/// Why a decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NonWebNavigation,
    SameOrigin,
    BrowserUiNavigation,
    MatchesClickedLink,
    RecentFormSubmit,
    CrossOriginWithoutExplicitUserIntent,
    NewTabContextExpired,
    WaitingForInitialWebNavigation,
    SameOriginNewTabNavigation,
    NewTabMatchesClickedLink,
    ContextMenuNewTabOpen,
    NewTabWithoutClickedLinkMatch,
    NewTabWithoutRecentUserIntent,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonWebNavigation => "non_web_navigation",
            Self::SameOrigin => "same_origin",
            Self::BrowserUiNavigation => "browser_ui_navigation",
            Self::MatchesClickedLink => "matches_clicked_link",
            Self::RecentFormSubmit => "recent_form_submit",
            Self::CrossOriginWithoutExplicitUserIntent => {
                "cross_origin_without_explicit_user_intent"
            }
            Self::NewTabContextExpired => "new_tab_context_expired",
            Self::WaitingForInitialWebNavigation => "waiting_for_initial_web_navigation",
            Self::SameOriginNewTabNavigation => "same_origin_new_tab_navigation",
            Self::NewTabMatchesClickedLink => "new_tab_matches_clicked_link",
            Self::ContextMenuNewTabOpen => "context_menu_new_tab_open",
            Self::NewTabWithoutClickedLinkMatch => "new_tab_without_clicked_link_match",
            Self::NewTabWithoutRecentUserIntent => "new_tab_without_recent_user_intent",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allow/block outcome of a decision cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allow: bool,
    pub reason: Reason,
}

impl Verdict {
    pub fn allow(reason: Reason) -> Self {
        Self {
            allow: true,
            reason,
        }
    }

    pub fn block(reason: Reason) -> Self {
        Self {
            allow: false,
            reason,
        }
    }
}

/// Category of a blocked-event log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedEventKind {
    /// A hijacked tab was restored to its previous URL
    ForcedRedirect,
    /// A spawned tab was closed
    PopupTab,
    /// The in-page guard blocked something and reported it
    ContentBlock,
}

/// One enforcement action, as recorded in the blocked-event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedEvent {
    /// Unique identifier (blk-<uuid>)
    pub id: String,

    #[serde(rename = "type")]
    pub kind: BlockedEventKind,

    pub target_url: String,

    pub timestamp: DateTime<Utc>,

    pub source_tab_id: TabId,

    pub source_url: String,

    pub reason: String,

    /// In-page event name for `content_block` entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BlockedEvent {
    /// Create a log entry with generated id and timestamp
    pub fn new(
        kind: BlockedEventKind,
        target_url: impl Into<String>,
        source_tab_id: TabId,
        source_url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("blk-{}", uuid::Uuid::new_v4()),
            kind,
            target_url: target_url.into(),
            timestamp: Utc::now(),
            source_tab_id,
            source_url: source_url.into(),
            reason: reason.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Stamp the entry with a Unix-millisecond time from the guard's clock
    pub fn at_millis(mut self, millis: u64) -> Self {
        if let Some(timestamp) = i64::try_from(millis)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
        {
            self.timestamp = timestamp;
        }
        self
    }
}

/// Protection state for one host, with recent log entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardState {
    pub host: String,
    pub global_enabled: bool,
    pub site_enabled: bool,
    pub effective_enabled: bool,
    pub site_override: Option<bool>,
    pub domain_listed: bool,
    pub recent_logs: Vec<BlockedEvent>,
}

/// Resolve a reported timestamp, falling back to `now`
pub fn timestamp_or_now(reported: Option<u64>, now: u64) -> u64 {
    reported.unwrap_or(now)
}

fn lenient_kind<'de, D>(deserializer: D) -> std::result::Result<GestureKind, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_str())
        .map(GestureKind::parse)
        .unwrap_or_default())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_f64())
        .filter(|ts| ts.is_finite() && *ts >= 0.0)
        .map(|ts| ts as u64))
}

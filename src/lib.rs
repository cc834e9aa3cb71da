//! # a3s-navguard
//!
//! Navigation-intent decision engine that protects a browser tab from
//! script-driven cross-origin redirects and unsolicited popup tabs.
//!
//! ## Overview
//!
//! For every committed navigation and every newly created tab, the guard
//! decides from partial, racy signals (recent trusted gestures, the last
//! clicked link, browser transition types, opener linkage) whether a human
//! caused it. When not, it reverses the effect: a hijacked tab is navigated
//! back to its previous URL, a rogue tab is closed. Restores are one-shot
//! expectations, so a restore never re-triggers the cascade.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_navguard::{
//!     BrowserEvent, CommittedNavigation, MemoryBrowser, MemorySettingsStore,
//!     NavigationGuard, Outcome, Settings,
//! };
//!
//! # async fn example() -> a3s_navguard::Result<()> {
//! let browser = Arc::new(MemoryBrowser::new());
//! browser.open_tab(1, "https://news.example.com/");
//!
//! let settings = Settings {
//!     protected_domains: vec!["example.com".to_string()],
//!     ..Default::default()
//! };
//! let guard = NavigationGuard::new(
//!     browser.clone(),
//!     Arc::new(MemorySettingsStore::with_settings(settings)),
//! );
//!
//! guard
//!     .handle(BrowserEvent::NavigationCommitted(CommittedNavigation::link(
//!         1,
//!         "https://news.example.com/",
//!     )))
//!     .await;
//!
//! // A script redirect with no user gesture is reverted
//! let outcome = guard
//!     .handle(BrowserEvent::NavigationCommitted(CommittedNavigation::link(
//!         1,
//!         "https://ads.invalid/landing",
//!     )))
//!     .await;
//! assert!(matches!(outcome, Outcome::Decided(v) if !v.allow));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **tracker** — per-tab gesture and clicked-link evidence
//! - **context** — per-tab tables: baseline URL, pending restores, spawned-tab contexts
//! - **policy** — settings snapshot, protection resolver, settings storage and cache
//! - **engine** — pure decision cascades
//! - **guard** — `NavigationGuard`: enforcement, restore loop prevention, queries
//! - **dispatch** — `GuardDispatcher`: FIFO-per-tab event workers
//! - **log** — bounded blocked-event log

pub mod browser;
pub mod clock;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod guard;
pub mod log;
pub mod policy;
pub mod tracker;
pub mod types;
pub mod urls;

// Re-export core types
pub use browser::{Browser, BrowserCommand, MemoryBrowser};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GuardConfig;
pub use context::{NewTabContext, NewTabContextStore, RestoreInFlight, TabNavigationState, TabTables};
pub use dispatch::GuardDispatcher;
pub use engine::{
    evaluate_navigation, evaluate_new_tab_navigation, evaluate_tab_creation, ContextDisposition,
    NewTabVerdict,
};
pub use error::{GuardError, Result};
pub use guard::{NavigationGuard, Outcome};
pub use log::BlockedEventLog;
pub use policy::{FileSettingsStore, MemorySettingsStore, Settings, SettingsCache, SettingsStore};
pub use tracker::{ClickRecord, ClickTracker, GestureRecord, GestureTracker};
pub use types::{
    BlockedEvent, BlockedEventKind, BrowserEvent, ClickInfo, CommittedNavigation, CreatedTab,
    GestureKind, GuardState, InPageBlock, Reason, TabId, TransitionQualifier, TransitionType,
    UserGesture, Verdict,
};

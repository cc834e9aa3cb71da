//! Dispatcher integration tests
//!
//! Events for one tab are handled in delivery order; tabs are independent
//! and a tab's worker goes away once its removal has been handled.

use a3s_navguard::{
    BlockedEventKind, BrowserCommand, BrowserEvent, ClickInfo, CommittedNavigation, CreatedTab,
    GestureKind, GuardDispatcher, MemoryBrowser, MemorySettingsStore, NavigationGuard, Outcome,
    Reason, Settings, UserGesture, Verdict,
};
use std::sync::Arc;

fn dispatcher(browser: Arc<MemoryBrowser>) -> GuardDispatcher {
    let settings = Settings {
        protected_domains: vec!["a.com".to_string()],
        ..Default::default()
    };
    let guard = NavigationGuard::new(
        browser,
        Arc::new(MemorySettingsStore::with_settings(settings)),
    );
    GuardDispatcher::new(Arc::new(guard))
}

fn commit(tab_id: i64, url: &str) -> BrowserEvent {
    BrowserEvent::NavigationCommitted(CommittedNavigation::link(tab_id, url))
}

fn pointerdown(tab_id: i64) -> BrowserEvent {
    BrowserEvent::UserGestureReported(UserGesture {
        tab_id,
        kind: GestureKind::Pointerdown,
        timestamp: None,
    })
}

// ─── Ordering ────────────────────────────────────────────────────

#[tokio::test]
async fn test_events_for_one_tab_handled_in_order() {
    let browser = Arc::new(MemoryBrowser::new());
    browser.open_tab(1, "https://a.com/");
    let dispatcher = dispatcher(browser.clone());

    // The click must be recorded before the commit it explains
    dispatcher.dispatch(commit(1, "https://a.com/"));
    dispatcher.dispatch(BrowserEvent::ClickReported(ClickInfo {
        tab_id: 1,
        href: "https://b.com/article".to_string(),
        timestamp: None,
        page_url: "https://a.com/".to_string(),
    }));

    let outcome = dispatcher
        .dispatch_and_wait(commit(1, "https://b.com/article"))
        .await;
    assert_eq!(
        outcome,
        Some(Outcome::Decided(Verdict::allow(Reason::MatchesClickedLink)))
    );
    assert!(browser.commands().is_empty());
}

#[tokio::test]
async fn test_block_and_restore_through_dispatcher() {
    let browser = Arc::new(MemoryBrowser::new());
    browser.open_tab(1, "https://a.com/");
    let dispatcher = dispatcher(browser.clone());

    dispatcher.dispatch(commit(1, "https://a.com/"));
    dispatcher.dispatch(commit(1, "https://b.com/"));
    let outcome = dispatcher.dispatch_and_wait(commit(1, "https://a.com/")).await;

    assert_eq!(outcome, Some(Outcome::RestoreCompleted));
    assert_eq!(
        browser.commands(),
        vec![BrowserCommand::Navigate {
            tab_id: 1,
            url: "https://a.com/".to_string()
        }]
    );

    let logs = dispatcher.guard().get_logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, BlockedEventKind::ForcedRedirect);
}

#[tokio::test]
async fn test_spawned_tab_sees_opener_click_queued_before_it() {
    let browser = Arc::new(MemoryBrowser::new());
    browser.open_tab(1, "https://a.com/");
    browser.open_tab(2, "about:blank");
    let dispatcher = dispatcher(browser.clone());

    dispatcher.dispatch_and_wait(commit(1, "https://a.com/")).await;

    // Keep the opener's worker busy so its click is still queued
    for _ in 0..300 {
        dispatcher.dispatch(pointerdown(1));
    }
    dispatcher.dispatch(BrowserEvent::ClickReported(ClickInfo {
        tab_id: 1,
        href: "https://b.com/article".to_string(),
        timestamp: None,
        page_url: "https://a.com/".to_string(),
    }));

    let created = dispatcher
        .dispatch_and_wait(BrowserEvent::TabCreated(CreatedTab {
            tab_id: 2,
            opener_tab_id: Some(1),
            pending_url: None,
            url: Some("about:blank".to_string()),
        }))
        .await;
    assert_eq!(created, Some(Outcome::Pending));
    assert_eq!(
        dispatcher
            .guard()
            .new_tab_context(2)
            .await
            .unwrap()
            .expected_href
            .as_deref(),
        Some("https://b.com/article")
    );

    let first = dispatcher
        .dispatch_and_wait(commit(2, "https://b.com/article"))
        .await;
    assert_eq!(
        first,
        Some(Outcome::Decided(Verdict::allow(
            Reason::NewTabMatchesClickedLink
        )))
    );
    assert!(browser.commands().is_empty());
}

#[tokio::test]
async fn test_spawned_tab_with_closed_opener_not_blocked_on_it() {
    let browser = Arc::new(MemoryBrowser::new());
    let dispatcher = dispatcher(browser);

    dispatcher.dispatch_and_wait(commit(1, "https://a.com/")).await;
    dispatcher
        .dispatch_and_wait(BrowserEvent::TabRemoved { tab_id: 1 })
        .await;

    let created = dispatcher
        .dispatch_and_wait(BrowserEvent::TabCreated(CreatedTab {
            tab_id: 2,
            opener_tab_id: Some(1),
            pending_url: None,
            url: None,
        }))
        .await;
    assert_eq!(created, Some(Outcome::Skipped));
    assert_eq!(dispatcher.active_tabs(), 1);
}

// ─── Worker lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn test_worker_per_tab_and_shutdown_on_removal() {
    let browser = Arc::new(MemoryBrowser::new());
    let dispatcher = dispatcher(browser);

    dispatcher.dispatch_and_wait(commit(1, "https://a.com/")).await;
    dispatcher.dispatch_and_wait(commit(2, "https://other.com/")).await;
    assert_eq!(dispatcher.active_tabs(), 2);

    let outcome = dispatcher
        .dispatch_and_wait(BrowserEvent::TabRemoved { tab_id: 1 })
        .await;
    assert_eq!(outcome, Some(Outcome::Recorded));
    assert_eq!(dispatcher.active_tabs(), 1);
    assert!(!dispatcher.guard().is_tracked(1).await);
    assert!(dispatcher.guard().is_tracked(2).await);

    // A reused tab id gets a fresh worker
    let outcome = dispatcher.dispatch_and_wait(commit(1, "https://a.com/")).await;
    assert_eq!(outcome, Some(Outcome::Skipped));
    assert_eq!(dispatcher.active_tabs(), 2);
}

#[tokio::test]
async fn test_reused_tab_id_waits_for_pending_removal() {
    let browser = Arc::new(MemoryBrowser::new());
    browser.open_tab(1, "https://a.com/");
    let dispatcher = dispatcher(browser.clone());

    for _ in 0..500 {
        dispatcher.dispatch(pointerdown(1));
    }
    dispatcher.dispatch(BrowserEvent::TabRemoved { tab_id: 1 });

    // Queued behind the removal, so the new baseline survives the teardown
    let outcome = dispatcher.dispatch_and_wait(commit(1, "https://a.com/")).await;
    assert_eq!(outcome, Some(Outcome::Skipped));
    assert_eq!(
        dispatcher
            .guard()
            .tab_state(1)
            .await
            .unwrap()
            .last_committed_url,
        "https://a.com/"
    );
    assert_eq!(dispatcher.active_tabs(), 1);

    let hijack = dispatcher.dispatch_and_wait(commit(1, "https://b.com/")).await;
    assert_eq!(
        hijack,
        Some(Outcome::Decided(Verdict::block(
            Reason::CrossOriginWithoutExplicitUserIntent
        )))
    );
}

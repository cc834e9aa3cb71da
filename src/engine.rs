//! Navigation decision engine
//!
//! Ordered rule cascades that decide whether a human caused a navigation.
//! The functions here are pure: they read the per-tab tables and the
//! caller's `now` and return a verdict. Enforcing the verdict is the
//! guard's job.
//!
//! - [`evaluate_navigation`] — a committed top-level navigation in a tab
//!   with a known previous URL
//! - [`evaluate_new_tab_navigation`] — the first real navigation of a tab
//!   spawned by an opener
//! - [`evaluate_tab_creation`] — the fast path when a spawned tab's target
//!   is already known at creation time

use crate::context::{NewTabContext, TabTables};
use crate::types::{CommittedNavigation, Reason, TabId, TransitionType, Verdict};
use crate::urls;

/// What to do with a spawned tab's context after a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextDisposition {
    /// Still waiting for the tab's real destination
    Keep,
    /// Decision made (or context expired); drop the context
    Discard,
}

/// Verdict for a spawned tab's navigation plus the context's fate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewTabVerdict {
    pub verdict: Verdict,
    pub context: ContextDisposition,
}

impl NewTabVerdict {
    fn keep(verdict: Verdict) -> Self {
        Self {
            verdict,
            context: ContextDisposition::Keep,
        }
    }

    fn discard(verdict: Verdict) -> Self {
        Self {
            verdict,
            context: ContextDisposition::Discard,
        }
    }
}

/// Decide an in-tab navigation from `previous_url` to `nav.url`
///
/// First matching rule wins:
/// 1. either end is not http/https
/// 2. same origin as the previous URL
/// 3. browser UI transition or qualifier
/// 4. fresh clicked link matching the target
/// 5. recent direct gesture on a form submit
/// 6. otherwise block
pub fn evaluate_navigation(
    nav: &CommittedNavigation,
    previous_url: &str,
    tables: &TabTables,
    now: u64,
) -> Verdict {
    let target_url = nav.url.as_str();

    if !urls::is_web_url(previous_url) || !urls::is_web_url(target_url) {
        return Verdict::allow(Reason::NonWebNavigation);
    }

    if urls::same_origin(previous_url, target_url) {
        return Verdict::allow(Reason::SameOrigin);
    }

    if nav.is_browser_ui() {
        return Verdict::allow(Reason::BrowserUiNavigation);
    }

    let clicked = tables
        .clicks
        .fresh(nav.tab_id, now)
        .is_some_and(|click| urls::matches_clicked_link(target_url, &click.target_href));
    if clicked {
        return Verdict::allow(Reason::MatchesClickedLink);
    }

    if nav.transition_type == TransitionType::FormSubmit
        && tables.gestures.has_recent_direct(nav.tab_id, now)
    {
        return Verdict::allow(Reason::RecentFormSubmit);
    }

    Verdict::block(Reason::CrossOriginWithoutExplicitUserIntent)
}

/// Decide a navigation committed in a tab that still has an opener context
pub fn evaluate_new_tab_navigation(
    context: &NewTabContext,
    nav: &CommittedNavigation,
    ttl_ms: u64,
    now: u64,
) -> NewTabVerdict {
    let target_url = nav.url.as_str();

    if context.age(now) > ttl_ms {
        return NewTabVerdict::discard(Verdict::allow(Reason::NewTabContextExpired));
    }

    if urls::is_blank_like(target_url) || !urls::is_web_url(target_url) {
        return NewTabVerdict::keep(Verdict::allow(Reason::WaitingForInitialWebNavigation));
    }

    if urls::same_origin(target_url, &context.opener_url) {
        return NewTabVerdict::discard(Verdict::allow(Reason::SameOriginNewTabNavigation));
    }

    if matches_expected_href(context, target_url) {
        return NewTabVerdict::discard(Verdict::allow(Reason::NewTabMatchesClickedLink));
    }

    if context.context_menu_intent && nav.transition_type == TransitionType::Link {
        return NewTabVerdict::discard(Verdict::allow(Reason::ContextMenuNewTabOpen));
    }

    if nav.is_browser_ui() {
        return NewTabVerdict::discard(Verdict::allow(Reason::BrowserUiNavigation));
    }

    NewTabVerdict::discard(Verdict::block(Reason::NewTabWithoutClickedLinkMatch))
}

/// Decide a spawned tab whose initial URL is known at creation time
///
/// Returns `None` when the target is a placeholder (blank or new-tab page)
/// or not a web URL; the decision then waits for the first real commit.
pub fn evaluate_tab_creation(context: &NewTabContext, target_url: &str) -> Option<Verdict> {
    if urls::is_blank_like(target_url) || !urls::is_web_url(target_url) {
        return None;
    }

    let verdict = if urls::same_origin(target_url, &context.opener_url) {
        Verdict::allow(Reason::SameOriginNewTabNavigation)
    } else if matches_expected_href(context, target_url) {
        Verdict::allow(Reason::NewTabMatchesClickedLink)
    } else if context.context_menu_intent {
        Verdict::allow(Reason::ContextMenuNewTabOpen)
    } else {
        Verdict::block(Reason::NewTabWithoutRecentUserIntent)
    };

    Some(verdict)
}

/// Snapshot the opener's evidence for a tab it just spawned
pub fn capture_new_tab_context(
    tables: &TabTables,
    opener_tab_id: TabId,
    opener_url: &str,
    now: u64,
) -> NewTabContext {
    NewTabContext {
        opener_tab_id,
        opener_url: opener_url.to_string(),
        expected_href: tables
            .clicks
            .fresh(opener_tab_id, now)
            .map(|click| click.target_href.clone())
            .filter(|href| !href.is_empty()),
        created_at: now,
        context_menu_intent: tables.gestures.has_recent_context_menu(opener_tab_id, now),
    }
}

fn matches_expected_href(context: &NewTabContext, target_url: &str) -> bool {
    context
        .expected_href
        .as_deref()
        .is_some_and(|href| urls::matches_clicked_link(target_url, href))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardConfig;
    use crate::types::{GestureKind, TransitionQualifier};

    const TTL: u64 = 15_000;

    fn tables() -> TabTables {
        TabTables::new(&GuardConfig::default())
    }

    fn new_tab_context(expected_href: Option<&str>, context_menu_intent: bool) -> NewTabContext {
        NewTabContext {
            opener_tab_id: 1,
            opener_url: "https://a.com/list".to_string(),
            expected_href: expected_href.map(str::to_string),
            created_at: 1_000,
            context_menu_intent,
        }
    }

    #[test]
    fn test_same_origin_allowed_without_gesture() {
        let nav = CommittedNavigation::link(1, "https://a.com/y");
        let verdict = evaluate_navigation(&nav, "https://a.com/x", &tables(), 0);
        assert_eq!(verdict, Verdict::allow(Reason::SameOrigin));
    }

    #[test]
    fn test_cross_origin_without_evidence_blocked() {
        let nav = CommittedNavigation::link(1, "https://b.com");
        let verdict = evaluate_navigation(&nav, "https://a.com", &tables(), 0);
        assert_eq!(
            verdict,
            Verdict::block(Reason::CrossOriginWithoutExplicitUserIntent)
        );
    }

    #[test]
    fn test_non_web_endpoints_allowed() {
        let nav = CommittedNavigation::link(1, "chrome://settings");
        let verdict = evaluate_navigation(&nav, "https://a.com", &tables(), 0);
        assert_eq!(verdict.reason, Reason::NonWebNavigation);
        assert!(verdict.allow);

        let nav = CommittedNavigation::link(1, "https://b.com");
        let verdict = evaluate_navigation(&nav, "about:blank", &tables(), 0);
        assert_eq!(verdict.reason, Reason::NonWebNavigation);
    }

    #[test]
    fn test_browser_ui_navigation_allowed() {
        let typed = CommittedNavigation::link(1, "https://b.com").with_transition(TransitionType::Typed);
        assert_eq!(
            evaluate_navigation(&typed, "https://a.com", &tables(), 0),
            Verdict::allow(Reason::BrowserUiNavigation)
        );

        let back = CommittedNavigation::link(1, "https://b.com")
            .with_qualifier(TransitionQualifier::ForwardBack);
        assert_eq!(
            evaluate_navigation(&back, "https://a.com", &tables(), 0),
            Verdict::allow(Reason::BrowserUiNavigation)
        );
    }

    #[test]
    fn test_fresh_click_match_allowed() {
        let mut tables = tables();
        tables.clicks.record(1, "https://b.com/article", 10_000, "https://a.com/");

        let nav = CommittedNavigation::link(1, "https://b.com/article?utm=x");
        assert_eq!(
            evaluate_navigation(&nav, "https://a.com/", &tables, 13_000),
            Verdict::allow(Reason::MatchesClickedLink)
        );
        // Stale after 3 seconds
        assert_eq!(
            evaluate_navigation(&nav, "https://a.com/", &tables, 13_001),
            Verdict::block(Reason::CrossOriginWithoutExplicitUserIntent)
        );
    }

    #[test]
    fn test_click_on_other_link_does_not_count() {
        let mut tables = tables();
        tables.clicks.record(1, "https://b.com/article", 0, "https://a.com/");

        let nav = CommittedNavigation::link(1, "https://b.com/ads");
        assert!(!evaluate_navigation(&nav, "https://a.com/", &tables, 100).allow);
    }

    #[test]
    fn test_form_submit_with_recent_gesture() {
        let mut tables = tables();
        tables.gestures.record(1, GestureKind::Keydown, 0);

        let submit = CommittedNavigation::link(1, "https://pay.example.com/")
            .with_transition(TransitionType::FormSubmit);
        assert_eq!(
            evaluate_navigation(&submit, "https://shop.com/", &tables, 1_500),
            Verdict::allow(Reason::RecentFormSubmit)
        );

        // A plain link with the same gesture is not enough
        let link = CommittedNavigation::link(1, "https://pay.example.com/");
        assert!(!evaluate_navigation(&link, "https://shop.com/", &tables, 100).allow);
    }

    #[test]
    fn test_form_submit_ignores_context_menu_gesture() {
        let mut tables = tables();
        tables.gestures.record(1, GestureKind::Contextmenu, 0);

        let submit = CommittedNavigation::link(1, "https://pay.example.com/")
            .with_transition(TransitionType::FormSubmit);
        assert!(!evaluate_navigation(&submit, "https://shop.com/", &tables, 100).allow);
    }

    #[test]
    fn test_new_tab_expired_context() {
        let context = new_tab_context(None, false);
        let nav = CommittedNavigation::link(2, "https://evil.com");
        let result = evaluate_new_tab_navigation(&context, &nav, TTL, 16_001);
        assert_eq!(result.verdict, Verdict::allow(Reason::NewTabContextExpired));
        assert_eq!(result.context, ContextDisposition::Discard);
    }

    #[test]
    fn test_new_tab_waits_on_blank() {
        let context = new_tab_context(None, false);
        for url in ["about:blank", "chrome://newtab/", "data:text/html,hi"] {
            let nav = CommittedNavigation::link(2, url);
            let result = evaluate_new_tab_navigation(&context, &nav, TTL, 2_000);
            assert_eq!(
                result.verdict,
                Verdict::allow(Reason::WaitingForInitialWebNavigation)
            );
            assert_eq!(result.context, ContextDisposition::Keep);
        }
    }

    #[test]
    fn test_new_tab_same_origin_as_opener() {
        let context = new_tab_context(None, false);
        let nav = CommittedNavigation::link(2, "https://a.com/detail/1");
        let result = evaluate_new_tab_navigation(&context, &nav, TTL, 2_000);
        assert_eq!(result.verdict, Verdict::allow(Reason::SameOriginNewTabNavigation));
        assert_eq!(result.context, ContextDisposition::Discard);
    }

    #[test]
    fn test_new_tab_path_only_click_match() {
        let context = new_tab_context(Some("https://b.com/page?ref=1"), false);

        let nav = CommittedNavigation::link(2, "https://b.com/page?ref=2");
        let result = evaluate_new_tab_navigation(&context, &nav, TTL, 2_000);
        assert_eq!(result.verdict, Verdict::allow(Reason::NewTabMatchesClickedLink));

        let nav = CommittedNavigation::link(2, "https://b.com/other?ref=1");
        let result = evaluate_new_tab_navigation(&context, &nav, TTL, 2_000);
        assert_eq!(
            result.verdict,
            Verdict::block(Reason::NewTabWithoutClickedLinkMatch)
        );
    }

    #[test]
    fn test_new_tab_context_menu_requires_link_transition() {
        let context = new_tab_context(None, true);

        let link = CommittedNavigation::link(2, "https://b.com/");
        assert_eq!(
            evaluate_new_tab_navigation(&context, &link, TTL, 2_000).verdict,
            Verdict::allow(Reason::ContextMenuNewTabOpen)
        );

        let redirect = CommittedNavigation::link(2, "https://b.com/")
            .with_transition(TransitionType::Other);
        assert!(!evaluate_new_tab_navigation(&context, &redirect, TTL, 2_000).verdict.allow);
    }

    #[test]
    fn test_new_tab_browser_ui() {
        let context = new_tab_context(None, false);
        let nav = CommittedNavigation::link(2, "https://b.com/")
            .with_qualifier(TransitionQualifier::FromAddressBar);
        let result = evaluate_new_tab_navigation(&context, &nav, TTL, 2_000);
        assert_eq!(result.verdict, Verdict::allow(Reason::BrowserUiNavigation));
    }

    #[test]
    fn test_new_tab_without_evidence_blocked() {
        let context = new_tab_context(None, false);
        let nav = CommittedNavigation::link(2, "https://evil.com");
        let result = evaluate_new_tab_navigation(&context, &nav, TTL, 2_000);
        assert_eq!(
            result.verdict,
            Verdict::block(Reason::NewTabWithoutClickedLinkMatch)
        );
        assert_eq!(result.context, ContextDisposition::Discard);
    }

    #[test]
    fn test_tab_creation_fast_path() {
        let context = new_tab_context(Some("https://b.com/page"), false);

        assert_eq!(evaluate_tab_creation(&context, "about:blank"), None);
        assert_eq!(evaluate_tab_creation(&context, ""), None);
        assert_eq!(
            evaluate_tab_creation(&context, "https://a.com/next"),
            Some(Verdict::allow(Reason::SameOriginNewTabNavigation))
        );
        assert_eq!(
            evaluate_tab_creation(&context, "https://b.com/page?x=1"),
            Some(Verdict::allow(Reason::NewTabMatchesClickedLink))
        );
        assert_eq!(
            evaluate_tab_creation(&context, "https://evil.com"),
            Some(Verdict::block(Reason::NewTabWithoutRecentUserIntent))
        );

        let context_menu = new_tab_context(None, true);
        assert_eq!(
            evaluate_tab_creation(&context_menu, "https://evil.com"),
            Some(Verdict::allow(Reason::ContextMenuNewTabOpen))
        );
    }

    #[test]
    fn test_capture_new_tab_context() {
        let mut tables = tables();
        tables.clicks.record(1, "https://b.com/x", 1_000, "https://a.com");
        tables.gestures.record(1, GestureKind::Contextmenu, 1_000);

        let context = capture_new_tab_context(&tables, 1, "https://a.com", 3_500);
        assert_eq!(context.expected_href.as_deref(), Some("https://b.com/x"));
        assert!(context.context_menu_intent);
        assert_eq!(context.created_at, 3_500);

        // Click stale, context-menu gesture still live
        let context = capture_new_tab_context(&tables, 1, "https://a.com", 8_000);
        assert_eq!(context.expected_href, None);
        assert!(context.context_menu_intent);
    }
}

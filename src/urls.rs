//! URL helpers shared by the trackers, the policy resolver and the cascades
//!
//! Every helper treats an unparsable input as absent: comparisons return
//! `false` and lookups return `None`. Nothing here returns an error.

use url::Url;

/// URLs a freshly spawned tab shows before its real destination commits
const NEW_TAB_PAGES: &[&str] = &[
    "about:newtab",
    "about:home",
    "chrome://newtab",
    "chrome://new-tab-page",
    "chrome-search://local-ntp/local-ntp.html",
    "edge://newtab",
];

/// Parse any absolute URL
pub fn parse(input: &str) -> Option<Url> {
    Url::parse(input.trim()).ok()
}

/// Parse an http/https URL
pub fn parse_web(input: &str) -> Option<Url> {
    parse(input).filter(|u| matches!(u.scheme(), "http" | "https"))
}

pub fn is_web_url(input: &str) -> bool {
    parse_web(input).is_some()
}

/// Serialized origin, `"null"` for opaque origins
fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Whether two URLs share scheme, host and port
pub fn same_origin(a: &str, b: &str) -> bool {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => origin_key(&a) == origin_key(&b),
        _ => false,
    }
}

/// Whether `candidate` is the destination of the clicked link `clicked_href`
///
/// Requires the same origin and the same path. The query string may differ:
/// the destination of a real click often appends or rewrites parameters
/// (affiliate and tracking redirects).
pub fn matches_clicked_link(candidate: &str, clicked_href: &str) -> bool {
    let (Some(target), Some(clicked)) = (parse(candidate), parse(clicked_href)) else {
        return false;
    };

    if origin_key(&target) != origin_key(&clicked) {
        return false;
    }

    // An exact path+query match is a special case of this
    target.path() == clicked.path()
}

/// Placeholder URLs a new tab passes through before its real navigation
pub fn is_blank_like(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "about:blank" || trimmed.starts_with("about:blank#") {
        return true;
    }

    let without_slash = trimmed.trim_end_matches('/');
    NEW_TAB_PAGES.iter().any(|page| without_slash == *page)
}

/// Normalized host of a web URL
pub fn host_from_url(input: &str) -> Option<String> {
    parse_web(input)
        .and_then(|u| u.host_str().map(str::to_string))
        .and_then(|host| normalize_host(&host))
}

/// Normalize a host or URL input to a bare lower-case hostname
///
/// Full URLs are reduced to their hostname; leading and trailing dots are
/// stripped. Returns `None` when nothing usable remains.
pub fn normalize_host(input: &str) -> Option<String> {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.contains("://") {
        let host = parse(&trimmed)?.host_str()?.to_string();
        return normalize_host(&host);
    }

    let host = trimmed.trim_start_matches('.').trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Normalize a protected-domain entry typed by the user
///
/// Stricter than [`normalize_host`]: paths are dropped, only hostname
/// characters are accepted, and the domain must contain a dot.
pub fn normalize_domain_input(input: &str) -> Option<String> {
    let host = normalize_host(input)?;
    let host = host.split('/').next().unwrap_or_default();

    let valid_chars = host
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    if host.is_empty() || !valid_chars || !host.contains('.') {
        return None;
    }

    Some(host.to_string())
}

/// Whether `host` is `domain` or one of its subdomains
pub fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

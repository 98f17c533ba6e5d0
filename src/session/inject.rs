// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Client-hook injection
//!
//! Proxied HTML responses get a small script that reports the page's
//! location and title back to the hosting frame. Injection is idempotent:
//! the script carries a marker string, and a body already containing the
//! marker is passed through untouched, guaranteeing at most one injection
//! per response.

use std::borrow::Cow;

/// Marker checked before injecting; the script below must contain it
pub const CLIENT_HOOK_MARKER: &str = "__vela_client_hook__";

/// The injected script: flags the realm and posts page info to the host
pub const CLIENT_HOOK_SCRIPT: &str = concat!(
    "<script>(function(){",
    "if(window.__vela_client_hook__)return;",
    "window.__vela_client_hook__=1;",
    "try{parent.postMessage({source:\"__vela_client_hook__\",",
    "href:location.href,title:document.title},\"*\");}catch(e){}",
    "})();</script>"
);

/// Inject the client hook into an HTML body
///
/// The script goes immediately after the first of `<head>`, `<body>`, or
/// `<html>` opening tags, checked in that preference order. Bodies that
/// already carry the marker, and bodies with none of the three tags, come
/// back unchanged.
pub fn inject_client_hook(html: &str) -> Cow<'_, str> {
    if html.contains(CLIENT_HOOK_MARKER) {
        return Cow::Borrowed(html);
    }

    let insert_at = ["head", "body", "html"]
        .iter()
        .find_map(|tag| opening_tag_end(html, tag));

    match insert_at {
        Some(position) => {
            let mut injected = String::with_capacity(html.len() + CLIENT_HOOK_SCRIPT.len());
            injected.push_str(&html[..position]);
            injected.push_str(CLIENT_HOOK_SCRIPT);
            injected.push_str(&html[position..]);
            Cow::Owned(injected)
        }
        None => Cow::Borrowed(html),
    }
}

/// Byte offset just past the opening tag `<name ...>`, case-insensitive
///
/// Requires a real tag boundary after the name, so `<head>` matches but
/// `<header>` does not.
fn opening_tag_end(html: &str, name: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", name);
    let mut search_from = 0;

    while let Some(offset) = lower[search_from..].find(&open) {
        let tag_start = search_from + offset;
        let after_name = tag_start + open.len();
        match lower.as_bytes().get(after_name) {
            Some(b'>') => return Some(after_name + 1),
            Some(c) if c.is_ascii_whitespace() => {
                if let Some(end) = lower[after_name..].find('>') {
                    return Some(after_name + end + 1);
                }
                return None;
            }
            _ => search_from = after_name,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injects_after_head() {
        let html = "<html><head><title>t</title></head><body></body></html>";
        let injected = inject_client_hook(html);
        assert!(injected.starts_with("<html><head><script>"));
        assert!(injected.contains(CLIENT_HOOK_MARKER));
    }

    #[test]
    fn test_prefers_head_over_body_regardless_of_order() {
        // body appears first in the document; head still wins
        let html = "<body></body><head></head>";
        let injected = inject_client_hook(html);
        let head_at = injected.find("<head>").unwrap();
        assert!(injected[head_at..].starts_with("<head><script>"));
    }

    #[test]
    fn test_falls_back_to_body_then_html() {
        let injected = inject_client_hook("<body class=\"x\"><p>hi</p></body>");
        assert!(injected.starts_with("<body class=\"x\"><script>"));

        let injected = inject_client_hook("<html lang=\"en\"><p>hi</p></html>");
        assert!(injected.starts_with("<html lang=\"en\"><script>"));
    }

    #[test]
    fn test_fragment_without_tags_is_untouched() {
        let html = "<div>just a fragment</div>";
        assert_eq!(inject_client_hook(html), html);
    }

    #[test]
    fn test_header_element_is_not_head() {
        let html = "<header>nav</header>";
        assert_eq!(inject_client_hook(html), html);
    }

    #[test]
    fn test_injection_is_idempotent() {
        let html = "<html><head></head><body></body></html>";
        let once = inject_client_hook(html).into_owned();
        let twice = inject_client_hook(&once).into_owned();
        assert_eq!(once, twice);
        assert_eq!(once.matches(CLIENT_HOOK_MARKER).count(), twice.matches(CLIENT_HOOK_MARKER).count());
    }

    #[test]
    fn test_case_insensitive_tags() {
        let injected = inject_client_hook("<HTML><HEAD></HEAD></HTML>");
        assert!(injected.contains("<HEAD><script>"));
    }
}

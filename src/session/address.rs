// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Address-bar input normalization
//!
//! Turns whatever the user typed into a fetchable URL: explicit schemes
//! pass through, bare hostnames get `https://`, and everything else
//! becomes a search query against the configured engine.

use crate::session::config::SearchEngine;

/// Resolve free-form address input to a URL
///
/// Input with a scheme is taken as-is. Input that looks like a hostname
/// (contains a dot, no whitespace) gets `https://` prepended. Anything
/// else is handed to the search engine.
pub fn resolve_address(input: &str, search_engine: SearchEngine) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return search_engine.query_url(trimmed);
    }
    if has_scheme(trimmed) {
        return trimmed.to_string();
    }
    if looks_like_host(trimmed) {
        return format!("https://{trimmed}");
    }
    search_engine.query_url(trimmed)
}

/// True when the input starts with an explicit URL scheme
fn has_scheme(input: &str) -> bool {
    let Some(colon) = input.find("://") else {
        return false;
    };
    if colon == 0 {
        return false;
    }
    // RFC 3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
    let scheme = &input[..colon];
    let mut chars = scheme.chars();
    chars
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false)
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// True when the input reads as a hostname rather than a phrase
fn looks_like_host(input: &str) -> bool {
    input.contains('.') && !input.contains(char::is_whitespace)
}

// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Endpoint classification
//!
//! Maps every inbound request or upgrade attempt to one of a fixed set of
//! route kinds. Classification is a pure function of the path, the upgrade
//! flag, and the configured mount prefixes: same input, same output, no
//! filesystem or clock access. The query string never participates.

use lazy_static::lazy_static;
use regex::Regex;

use crate::gateway::config::GatewayConfig;

lazy_static! {
    /// Paths with a trailing dotted suffix of 1-10 alphanumeric chars look
    /// like file requests and never get the SPA fallback document
    static ref FILE_EXTENSION: Regex = Regex::new(r"(?i)\.[a-z0-9]{1,10}$").unwrap();
}

/// Where an inbound request or upgrade is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Bare-style tunnel: plain requests and upgrades under its mount prefix
    BareTunnel,
    /// Wisp-style tunnel: upgrade-only endpoints
    WispTunnel,
    /// Ultraviolet proxied-page route; served the application document
    UvApp,
    /// Scramjet proxied-page route; served the application document
    ScramApp,
    /// Path resolves to a file under the static root
    Static,
    /// No match; the application layer resolves this to the SPA document
    /// or a 404
    NotFound,
}

impl RouteDecision {
    /// Check if this route is one of the tunnel endpoints
    pub fn is_tunnel(&self) -> bool {
        matches!(self, RouteDecision::BareTunnel | RouteDecision::WispTunnel)
    }

    /// Check if this route is an engine bootstrap-page route
    pub fn is_engine_page(&self) -> bool {
        matches!(self, RouteDecision::UvApp | RouteDecision::ScramApp)
    }
}

/// Prefix-based classifier over the configured mount points
#[derive(Debug, Clone)]
pub struct EndpointMatcher {
    bare_prefix: String,
    wisp_paths: Vec<String>,
    uv_prefix: String,
    scram_prefix: String,
}

impl EndpointMatcher {
    /// Build a matcher from the gateway configuration
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            bare_prefix: config.bare_prefix.clone(),
            wisp_paths: config.wisp_paths.clone(),
            uv_prefix: config.uv_prefix.clone(),
            scram_prefix: config.scram_prefix.clone(),
        }
    }

    /// Classify a request path
    ///
    /// Evaluated in fixed precedence order: bare tunnel, wisp tunnel
    /// (upgrades only), engine page prefixes, then `NotFound` for the
    /// application layer to resolve. Use [`classify_with_files`] when a
    /// static-file probe is available.
    ///
    /// [`classify_with_files`]: EndpointMatcher::classify_with_files
    pub fn classify(&self, path: &str, is_upgrade: bool) -> RouteDecision {
        let path = strip_query(path);

        if path.starts_with(&self.bare_prefix) {
            return RouteDecision::BareTunnel;
        }

        if is_upgrade
            && self
                .wisp_paths
                .iter()
                .any(|mount| segment_match(path, mount))
        {
            return RouteDecision::WispTunnel;
        }

        if path.starts_with(&self.uv_prefix) {
            return RouteDecision::UvApp;
        }
        if path.starts_with(&self.scram_prefix) {
            return RouteDecision::ScramApp;
        }

        RouteDecision::NotFound
    }

    /// Classify with a static-file probe, refining `NotFound` into
    /// `Static` when the path names an existing file
    pub fn classify_with_files(
        &self,
        path: &str,
        is_upgrade: bool,
        file_exists: impl Fn(&str) -> bool,
    ) -> RouteDecision {
        match self.classify(path, is_upgrade) {
            RouteDecision::NotFound if file_exists(strip_query(path)) => RouteDecision::Static,
            decision => decision,
        }
    }
}

/// Drop the query string from a request target
pub fn strip_query(path: &str) -> &str {
    match path.split_once('?') {
        Some((before, _)) => before,
        None => path,
    }
}

/// Check if a path looks like a file request
pub fn looks_like_file(path: &str) -> bool {
    FILE_EXTENSION.is_match(strip_query(path))
}

/// Exact path or exact-segment prefix match
///
/// `/wisp` and `/wisp/anything` match a `/wisp` mount; `/wispx` and
/// `/a/wisp` do not. A mount configured with a trailing slash matches the
/// same set of paths.
fn segment_match(path: &str, mount: &str) -> bool {
    let mount = mount.trim_end_matches('/');
    if mount.is_empty() {
        return false;
    }
    match path.strip_prefix(mount) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

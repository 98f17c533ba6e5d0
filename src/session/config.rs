// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Proxy session configuration
//!
//! The flat record a browser session persists between visits: which
//! rewriting engine to use, which tunnel protocol and low-level transport
//! to reach it over, plus search and content-filter preferences. Every
//! dispatch site matches exhaustively on these enums, so adding or
//! removing an engine is a compile-time-checked change.
//!
//! Loading is deliberately forgiving: a stored record with unknown or
//! invalid fields keeps its valid fields and replaces only the bad ones
//! with defaults. A corrupted preference should never reset the whole
//! session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Interchangeable URL-rewriting engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Ultraviolet: service-worker interception with a codec-encoded prefix
    #[default]
    Ultraviolet,
    /// Scramjet: worker-side rewriting with percent-encoded frame URLs
    Scramjet,
}

impl EngineKind {
    /// Mount prefix for this engine's proxied-page routes
    pub fn prefix(&self) -> &'static str {
        match self {
            EngineKind::Ultraviolet => "/~/uv/",
            EngineKind::Scramjet => "/~/scram/",
        }
    }

    /// Canonical config-record spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Ultraviolet => "ultraviolet",
            EngineKind::Scramjet => "scramjet",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "ultraviolet" => Ok(EngineKind::Ultraviolet),
            "scramjet" => Ok(EngineKind::Scramjet),
            _ => Err(()),
        }
    }
}

/// Tunnel protocol terminating at the gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelMode {
    /// TCP-over-WebSocket multiplexing
    #[default]
    Wisp,
    /// TCP-over-HTTP relay
    Bare,
}

impl TunnelMode {
    /// Canonical config-record spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelMode::Wisp => "wisp",
            TunnelMode::Bare => "bare",
        }
    }
}

impl fmt::Display for TunnelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TunnelMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "wisp" => Ok(TunnelMode::Wisp),
            "bare" => Ok(TunnelMode::Bare),
            _ => Err(()),
        }
    }
}

/// Low-level transport module the multiplexer is bound to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LowLevelTransport {
    /// Rust/wasm TLS-in-browser transport
    #[default]
    Epoxy,
    /// curl-compiled-to-wasm transport
    Libcurl,
}

impl LowLevelTransport {
    /// Module path of the transport bundle
    pub fn module_path(&self) -> &'static str {
        match self {
            LowLevelTransport::Epoxy => "/epoxy/index.mjs",
            LowLevelTransport::Libcurl => "/libcurl/index.mjs",
        }
    }

    /// Canonical config-record spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            LowLevelTransport::Epoxy => "epoxy",
            LowLevelTransport::Libcurl => "libcurl",
        }
    }
}

impl fmt::Display for LowLevelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LowLevelTransport {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "epoxy" => Ok(LowLevelTransport::Epoxy),
            "libcurl" => Ok(LowLevelTransport::Libcurl),
            _ => Err(()),
        }
    }
}

/// Search engine used for non-URL address-bar input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    #[default]
    Google,
    DuckDuckGo,
    Bing,
    Yahoo,
    Brave,
}

impl SearchEngine {
    /// Build a search-results URL for a query
    pub fn query_url(&self, query: &str) -> String {
        let encoded = crate::session::engine::percent_encode_component(query);
        match self {
            SearchEngine::Google => format!("https://www.google.com/search?q={}", encoded),
            SearchEngine::DuckDuckGo => format!("https://duckduckgo.com/?q={}", encoded),
            SearchEngine::Bing => format!("https://www.bing.com/search?q={}", encoded),
            SearchEngine::Yahoo => format!("https://search.yahoo.com/search?p={}", encoded),
            SearchEngine::Brave => format!("https://search.brave.com/search?q={}", encoded),
        }
    }

    /// Canonical config-record spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchEngine::Google => "google",
            SearchEngine::DuckDuckGo => "duckduckgo",
            SearchEngine::Bing => "bing",
            SearchEngine::Yahoo => "yahoo",
            SearchEngine::Brave => "brave",
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchEngine {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "google" => Ok(SearchEngine::Google),
            "duckduckgo" => Ok(SearchEngine::DuckDuckGo),
            "bing" => Ok(SearchEngine::Bing),
            "yahoo" => Ok(SearchEngine::Yahoo),
            "brave" => Ok(SearchEngine::Brave),
            _ => Err(()),
        }
    }
}

/// The persisted session record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySessionConfig {
    /// Active rewriting engine
    pub engine: EngineKind,
    /// Tunnel protocol
    pub tunnel: TunnelMode,
    /// Low-level transport module
    pub transport: LowLevelTransport,
    /// Search engine for query input
    pub search_engine: SearchEngine,
    /// Custom rendezvous server; None uses the gateway's own endpoint
    pub rendezvous_url: Option<String>,
    /// Route through the content-filtering tunnel endpoint
    pub content_filter: bool,
}

impl ProxySessionConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize for the durable store
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Deserialize a stored record, replacing invalid fields individually
    ///
    /// An unparseable record behaves like a missing one. A parseable
    /// record never fails: each field is validated on its own and falls
    /// back to its default when absent or malformed.
    pub fn from_json_lossy(raw: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return Self::default();
        };
        Self::from_value_lossy(&value)
    }

    fn from_value_lossy(value: &Value) -> Self {
        let defaults = Self::default();
        Self {
            engine: parse_field(value, "engine").unwrap_or(defaults.engine),
            tunnel: parse_field(value, "tunnel").unwrap_or(defaults.tunnel),
            transport: parse_field(value, "transport").unwrap_or(defaults.transport),
            search_engine: parse_field(value, "search_engine").unwrap_or(defaults.search_engine),
            rendezvous_url: value
                .get("rendezvous_url")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            content_filter: value
                .get("content_filter")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.content_filter),
        }
    }
}

fn parse_field<T: FromStr>(value: &Value, key: &str) -> Option<T> {
    value.get(key)?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let config = ProxySessionConfig {
            engine: EngineKind::Scramjet,
            tunnel: TunnelMode::Bare,
            transport: LowLevelTransport::Libcurl,
            search_engine: SearchEngine::Brave,
            rendezvous_url: Some("wss://relay.example/wisp/".to_string()),
            content_filter: true,
        };

        let restored = ProxySessionConfig::from_json_lossy(&config.to_json());
        assert_eq!(restored, config);
    }

    #[test]
    fn test_invalid_fields_fall_back_individually() {
        let raw = r#"{
            "engine": "scramjet",
            "tunnel": "carrier-pigeon",
            "transport": 42,
            "search_engine": "brave",
            "content_filter": "yes"
        }"#;
        let config = ProxySessionConfig::from_json_lossy(raw);

        // Valid fields survive
        assert_eq!(config.engine, EngineKind::Scramjet);
        assert_eq!(config.search_engine, SearchEngine::Brave);
        // Invalid ones are defaulted, not fatal
        assert_eq!(config.tunnel, TunnelMode::Wisp);
        assert_eq!(config.transport, LowLevelTransport::Epoxy);
        assert!(!config.content_filter);
    }

    #[test]
    fn test_corrupt_record_behaves_like_missing() {
        let config = ProxySessionConfig::from_json_lossy("{not json");
        assert_eq!(config, ProxySessionConfig::default());
    }

    #[test]
    fn test_engine_prefixes() {
        assert_eq!(EngineKind::Ultraviolet.prefix(), "/~/uv/");
        assert_eq!(EngineKind::Scramjet.prefix(), "/~/scram/");
    }

    #[test]
    fn test_search_query_url() {
        let url = SearchEngine::Google.query_url("proxy sites");
        assert_eq!(url, "https://www.google.com/search?q=proxy%20sites");
    }

    #[test]
    fn test_transport_modules() {
        assert_eq!(LowLevelTransport::Epoxy.module_path(), "/epoxy/index.mjs");
        assert_eq!(
            LowLevelTransport::Libcurl.module_path(),
            "/libcurl/index.mjs"
        );
    }
}

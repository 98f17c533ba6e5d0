// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Rewriting engine boundary
//!
//! The engines' content transformation lives outside this crate; what is
//! pinned down here is everything the session layer needs from them: the
//! mount prefix, the URL codec for building frame URLs, config loading,
//! and the per-request accept/fetch surface the interception pipeline
//! dispatches into.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{Error, Result};
use crate::session::config::EngineKind;

/// Characters left verbatim by `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a string the way `encodeURIComponent` does
pub fn percent_encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// A request handed to an engine for proxied fetching
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Same-origin request path (the frame URL)
    pub path: String,
    /// HTTP method
    pub method: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Request body, if any
    pub body: Option<Bytes>,
}

impl EngineRequest {
    /// Create a GET request for a frame path
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// A response produced by an engine or by the direct-fetch fallback
#[derive(Debug, Clone)]
pub struct EngineResponse {
    /// HTTP status
    pub status: u16,
    /// Content type, if the origin sent one
    pub content_type: Option<String>,
    /// Response body
    pub body: Bytes,
}

impl EngineResponse {
    /// Create a response
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    /// Check whether the body is HTML
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }

    /// Body as lossy UTF-8 text
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// The fetch surface of a rewriting engine
#[async_trait]
pub trait RewriteEngine: Send + Sync {
    /// Which engine this is
    fn kind(&self) -> EngineKind;

    /// Load the engine's own configuration; memoized by the pipeline
    async fn load_config(&self) -> Result<()>;

    /// Whether the engine claims this request path
    fn accepts(&self, path: &str) -> bool {
        path.starts_with(self.kind().prefix())
    }

    /// Produce a proxied response for an accepted request
    async fn fetch(&self, request: &EngineRequest) -> Result<EngineResponse>;
}

impl EngineKind {
    /// Encode an origin URL into this engine's frame form
    pub fn encode_url(&self, url: &str) -> String {
        match self {
            EngineKind::Ultraviolet => BASE64.encode(url),
            EngineKind::Scramjet => percent_encode_component(url),
        }
    }

    /// Decode a frame-form URL back to the origin URL
    pub fn decode_url(&self, encoded: &str) -> Result<String> {
        match self {
            EngineKind::Ultraviolet => {
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|e| Error::pipeline(format!("Bad frame URL encoding: {}", e)))?;
                String::from_utf8(bytes)
                    .map_err(|e| Error::pipeline(format!("Frame URL is not UTF-8: {}", e)))
            }
            EngineKind::Scramjet => percent_decode_str(encoded)
                .decode_utf8()
                .map(|s| s.to_string())
                .map_err(|e| Error::pipeline(format!("Frame URL is not UTF-8: {}", e))),
        }
    }

    /// Build the same-origin frame URL for an origin URL
    pub fn frame_url(&self, url: &str) -> String {
        format!("{}{}", self.prefix(), self.encode_url(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ultraviolet_codec_round_trip() {
        let url = "https://example.com/path?q=1";
        let encoded = EngineKind::Ultraviolet.encode_url(url);
        assert_ne!(encoded, url);
        assert_eq!(EngineKind::Ultraviolet.decode_url(&encoded).unwrap(), url);
    }

    #[test]
    fn test_scramjet_codec_round_trip() {
        let url = "https://example.com/a b?q=1&r=2";
        let encoded = EngineKind::Scramjet.encode_url(url);
        assert!(!encoded.contains(' '));
        assert_eq!(EngineKind::Scramjet.decode_url(&encoded).unwrap(), url);
    }

    #[test]
    fn test_frame_url_uses_engine_prefix() {
        let frame = EngineKind::Ultraviolet.frame_url("https://example.com");
        assert!(frame.starts_with("/~/uv/"));

        let frame = EngineKind::Scramjet.frame_url("https://example.com");
        assert!(frame.starts_with("/~/scram/"));
    }

    #[test]
    fn test_bad_encoding_is_a_pipeline_error() {
        let err = EngineKind::Ultraviolet.decode_url("!!! not base64 !!!");
        assert!(err.is_err());
    }

    #[test]
    fn test_percent_encode_component() {
        assert_eq!(percent_encode_component("a b&c"), "a%20b%26c");
        assert_eq!(percent_encode_component("safe-chars_~.*"), "safe-chars_~.*");
    }

    #[test]
    fn test_html_detection() {
        let html = EngineResponse::new(200, Some("text/html; charset=utf-8".into()), "<html>");
        assert!(html.is_html());

        let json = EngineResponse::new(200, Some("application/json".into()), "{}");
        assert!(!json.is_html());

        let untyped = EngineResponse::new(200, None, "...");
        assert!(!untyped.is_html());
    }
}

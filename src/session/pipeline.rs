// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Fetch interception pipeline
//!
//! The per-request decision path of the interception agent: requests
//! outside every engine prefix pass straight through to the network;
//! engine-prefixed requests go through bootstrap and config-load (both
//! single-flight) and into the engine's own fetch, with HTML responses
//! picking up the client hook. Every failure degrades: engine trouble
//! falls back to a direct network fetch, and only when that also fails
//! does the caller see a generic error response. A request is never left
//! unresolved.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::bootstrap::AgentBootstrap;
use crate::session::config::EngineKind;
use crate::session::engine::{EngineRequest, EngineResponse, RewriteEngine};
use crate::session::inject::inject_client_hook;
use crate::session::state::PhaseCell;

/// The plain network fetch the pipeline falls back to
#[async_trait]
pub trait NetworkFallback: Send + Sync {
    /// Fetch a same-origin path directly, without any engine involvement
    async fn fetch(&self, request: &EngineRequest) -> Result<EngineResponse>;
}

/// Fallback fetcher over a real HTTP client
pub struct ReqwestFallback {
    client: reqwest::Client,
    origin: String,
}

impl ReqwestFallback {
    /// Create a fallback fetcher against an origin
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin: origin.into(),
        }
    }
}

#[async_trait]
impl NetworkFallback for ReqwestFallback {
    async fn fetch(&self, request: &EngineRequest) -> Result<EngineResponse> {
        let url = format!("{}{}", self.origin.trim_end_matches('/'), request.path);
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::pipeline(format!("invalid request method {:?}", request.method)))?;

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        Ok(EngineResponse::new(status, content_type, body))
    }
}

/// One engine wired into the pipeline
pub struct EngineSlot {
    engine: Arc<dyn RewriteEngine>,
    bootstrap: Arc<AgentBootstrap>,
    // Engine config is loaded once per realm; holding the lock across the
    // load is what makes concurrent callers share one attempt
    config_loaded: Mutex<bool>,
}

impl EngineSlot {
    /// Wire an engine together with its agent bootstrap
    pub fn new(engine: Arc<dyn RewriteEngine>, bootstrap: Arc<AgentBootstrap>) -> Self {
        Self {
            engine,
            bootstrap,
            config_loaded: Mutex::new(false),
        }
    }

    fn kind(&self) -> EngineKind {
        self.engine.kind()
    }

    /// Load the engine's config, memoized and single-flight
    ///
    /// A failed load is not cached; the next request retries it.
    async fn ensure_config(&self) -> Result<()> {
        let mut loaded = self.config_loaded.lock().await;
        if *loaded {
            return Ok(());
        }
        self.engine.load_config().await?;
        *loaded = true;
        Ok(())
    }
}

/// Request decision, response post-processing, and fallback
pub struct FetchPipeline {
    slots: Vec<EngineSlot>,
    fallback: Arc<dyn NetworkFallback>,
    phase: Option<Arc<PhaseCell>>,
}

impl FetchPipeline {
    /// Create a pipeline over the wired engines and a network fallback
    pub fn new(slots: Vec<EngineSlot>, fallback: Arc<dyn NetworkFallback>) -> Self {
        Self {
            slots,
            fallback,
            phase: None,
        }
    }

    /// Attach the session phase cell so content loads and total failures
    /// drive the UI state
    pub fn with_phase(mut self, phase: Arc<PhaseCell>) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Produce a response for an intercepted request
    ///
    /// Infallible by contract: the worst outcome is a generic error
    /// response.
    pub async fn handle(&self, request: &EngineRequest) -> EngineResponse {
        // Cheap prefilter: anything outside the engine mounts skips all
        // engine work
        let Some(slot) = self.slot_for(&request.path) else {
            return self.direct_or_error(request).await;
        };

        match self.proxied_fetch(slot, request).await {
            Ok(response) => {
                if let Some(phase) = &self.phase {
                    phase.mark_active();
                }
                response
            }
            Err(e) => {
                warn!(
                    "{} pipeline failed for {}, falling back to direct fetch: {}",
                    slot.kind(),
                    request.path,
                    e
                );
                self.direct_or_error(request).await
            }
        }
    }

    /// The engine path: bootstrap, config, accept check, fetch, inject
    async fn proxied_fetch(
        &self,
        slot: &EngineSlot,
        request: &EngineRequest,
    ) -> Result<EngineResponse> {
        slot.bootstrap.ensure_ready().await?;
        slot.ensure_config().await?;

        if !slot.engine.accepts(&request.path) {
            debug!("{} declined {}", slot.kind(), request.path);
            return self.fallback.fetch(request).await;
        }

        let response = slot.engine.fetch(request).await?;
        Ok(post_process(response))
    }

    /// Direct network fetch; total failure yields the generic error
    /// response instead of propagating
    async fn direct_or_error(&self, request: &EngineRequest) -> EngineResponse {
        match self.fallback.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Direct fetch failed for {}: {}", request.path, e);
                if let Some(phase) = &self.phase {
                    phase.mark_error(format!("Failed to load {}: {}", request.path, e));
                }
                generic_error_response()
            }
        }
    }

    fn slot_for(&self, path: &str) -> Option<&EngineSlot> {
        self.slots
            .iter()
            .find(|slot| path.starts_with(slot.kind().prefix()))
    }
}

/// Inject the client hook into HTML responses; the marker check keeps
/// this at-most-once per body
fn post_process(response: EngineResponse) -> EngineResponse {
    if !response.is_html() {
        return response;
    }
    let html = response.text_lossy();
    let injected = inject_client_hook(&html);
    EngineResponse {
        body: Bytes::from(injected.into_owned()),
        ..response
    }
}

/// The response shown when both the engine and the direct fetch fail
fn generic_error_response() -> EngineResponse {
    EngineResponse::new(
        502,
        Some("text/html; charset=utf-8".to_string()),
        "<html><body><h1>Proxy error</h1><p>The page could not be loaded.</p></body></html>",
    )
}

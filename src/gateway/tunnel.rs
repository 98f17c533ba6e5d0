// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Tunnel endpoint boundary
//!
//! The wire-level multiplexing protocols (bare-style TCP-over-HTTP and
//! wisp-style TCP-over-WebSocket) are external collaborators. This module
//! pins down the interface the routers dispatch into: once a connection is
//! handed to an endpoint, the endpoint owns the socket for the life of the
//! connection and the router never touches it again.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::upgrade::Upgraded;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;

/// Response body type used throughout the gateway
pub type GatewayBody = Full<Bytes>;

/// Raw socket handed to a tunnel after a completed upgrade handshake
pub type TunnelIo = TokioIo<Upgraded>;

/// Bare-style tunnel: terminates its protocol over plain HTTP requests
/// and over WebSocket upgrades under one mount prefix
#[async_trait]
pub trait BareEndpoint: Send + Sync {
    /// Handle a plain HTTP request under the tunnel mount
    ///
    /// The endpoint performs its own protocol decoding, including any
    /// internal admission it applies to plain requests.
    async fn handle_request(&self, req: Request<Incoming>) -> Result<Response<GatewayBody>>;

    /// Take ownership of an upgraded connection
    async fn handle_upgrade(&self, path: String, io: TunnelIo) -> Result<()>;
}

/// Wisp-style tunnel: upgrade-only multiplexed relay
#[async_trait]
pub trait WispEndpoint: Send + Sync {
    /// Take ownership of an upgraded connection
    ///
    /// `path` distinguishes the primary endpoint from the
    /// content-filtering one.
    async fn handle_upgrade(&self, path: String, io: TunnelIo) -> Result<()>;
}

/// The tunnel handlers the routers dispatch into
#[derive(Clone)]
pub struct TunnelRegistry {
    /// Bare-style endpoint (plain requests and upgrades)
    pub bare: Arc<dyn BareEndpoint>,
    /// Wisp-style endpoint (upgrades only)
    pub wisp: Arc<dyn WispEndpoint>,
}

impl TunnelRegistry {
    /// Create a registry from concrete endpoints
    pub fn new(bare: Arc<dyn BareEndpoint>, wisp: Arc<dyn WispEndpoint>) -> Self {
        Self { bare, wisp }
    }

    /// Registry that accepts and immediately closes every tunnel
    /// connection, for running the gateway without protocol backends
    pub fn disconnected() -> Self {
        let endpoint = Arc::new(DisconnectedTunnel);
        Self {
            bare: endpoint.clone(),
            wisp: endpoint,
        }
    }
}

/// Placeholder endpoint used when no protocol backend is wired in
///
/// Plain requests get a 502; upgraded sockets are logged and dropped,
/// which closes them cleanly.
pub struct DisconnectedTunnel;

#[async_trait]
impl BareEndpoint for DisconnectedTunnel {
    async fn handle_request(&self, req: Request<Incoming>) -> Result<Response<GatewayBody>> {
        info!("No bare backend configured, refusing {}", req.uri().path());
        let response = Response::builder()
            .status(StatusCode::BAD_GATEWAY)
            .header("content-type", "text/plain")
            .body(Full::new(Bytes::from_static(b"Tunnel backend unavailable")))
            .map_err(|e| crate::error::Error::tunnel("bare", e.to_string()))?;
        Ok(response)
    }

    async fn handle_upgrade(&self, path: String, io: TunnelIo) -> Result<()> {
        info!("No bare backend configured, closing upgraded socket on {}", path);
        drop(io);
        Ok(())
    }
}

#[async_trait]
impl WispEndpoint for DisconnectedTunnel {
    async fn handle_upgrade(&self, path: String, io: TunnelIo) -> Result<()> {
        info!("No wisp backend configured, closing upgraded socket on {}", path);
        drop(io);
        Ok(())
    }
}

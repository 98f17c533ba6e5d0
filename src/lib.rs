// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! # Vela - Web Proxy Traffic Dispatch
//!
//! The admission and dispatch layer of a web proxy deployment: a gateway
//! that routes plain and WebSocket-upgrade traffic to tunnel endpoints,
//! rewrite-engine app shells, and static assets, plus the client-side
//! session plumbing that drives those endpoints.
//!
//! ## Features
//!
//! - Path-based routing for bare, wisp, engine, and static traffic
//! - Sliding-window per-client admission control with block penalties
//! - WebSocket upgrade handling with RFC 6455 accept-key derivation
//! - SPA fallback serving with file-extension heuristics
//! - Durable session config with field-wise validation
//! - Single-flight interception-agent bootstrap with a bounded
//!   activation wait
//! - Transport negotiation over a multiplexed wisp connection
//! - Fetch pipeline with direct-fetch fallback and client-hook injection
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vela::{Gateway, GatewayConfig, TunnelRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::from_env();
//!     let gateway = Arc::new(Gateway::new(config, TunnelRegistry::disconnected()));
//!     gateway.run().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod gateway;
pub mod session;

// Gateway
pub use gateway::{Gateway, GatewayConfig};
pub use gateway::{Admission, AdmissionController};
pub use gateway::{EndpointMatcher, RouteDecision, StaticApp};
pub use gateway::{BareEndpoint, DisconnectedTunnel, TunnelRegistry, WispEndpoint};

// Session
pub use session::{EngineKind, LowLevelTransport, ProxySessionConfig, SearchEngine, TunnelMode};
pub use session::{AgentBootstrap, BootstrapPhase, InterceptionAgent};
pub use session::{ConfigStore, FileStore, MemoryStore};
pub use session::{EngineRequest, EngineResponse, RewriteEngine};
pub use session::{EngineSlot, FetchPipeline, NetworkFallback};
pub use session::{MuxFactory, Rendezvous, TransportNegotiator};
pub use session::{PhaseCell, ProxySession, SessionPhase};

// Errors
pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
